//! Dispatch engine, offers and tracker sweeps against a real database.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{
    customer, lock_all, online_provider, provider, quote, ITEM_END_OF_TENANCY, ITEM_TAP_WASHER,
};
use sqlx::PgPool;
use tradeflow_api::background::dispatch_tracker::{activate_booked_jobs, ensure_dispatch_progress};
use tradeflow_api::config::DispatchConfig;
use tradeflow_api::engine::dispatcher::{
    advance_after_decline, dispatch_job, find_eligible_providers,
};
use tradeflow_api::error::AppError;
use tradeflow_api::workflows::booking::{self, LockScope};
use tradeflow_api::workflows::offers;
use tradeflow_core::error::CoreError;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::pricing::ScopeAnswers;
use tradeflow_db::models::job::CreateJob;
use tradeflow_db::repositories::{JobRepo, ProviderRepo};

fn config() -> DispatchConfig {
    DispatchConfig::default()
}

fn past_timeout() -> Duration {
    Duration::seconds(config().offer_timeout_secs + 1)
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_generalists_are_preferred(pool: PgPool) {
    let specialist = online_provider(&pool, "Spec", "specialist", &["plumbing"]).await;
    let generalist = online_provider(&pool, "Gen", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;

    let eligible = find_eligible_providers(&pool, &quote.job).await.unwrap();

    assert_eq!(eligible, vec![generalist]);
    assert!(!eligible.contains(&specialist));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cleaning_only_goes_to_specialists(pool: PgPool) {
    online_provider(&pool, "Gen", "generalist", &["cleaning"]).await;
    let specialist = online_provider(&pool, "Spec", "specialist", &["cleaning"]).await;
    let quote = quote(&pool, &[ITEM_END_OF_TENANCY]).await;

    let eligible = find_eligible_providers(&pool, &quote.job).await.unwrap();

    assert_eq!(eligible, vec![specialist]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_offline_and_inactive_providers_drop_out(pool: PgPool) {
    let offline = online_provider(&pool, "Off", "generalist", &["plumbing"]).await;
    let suspended = online_provider(&pool, "Sus", "generalist", &["plumbing"]).await;
    let available = online_provider(&pool, "On", "generalist", &["plumbing"]).await;
    ProviderRepo::set_online(&pool, offline, false).await.unwrap();
    ProviderRepo::set_active(&pool, suspended, false).await.unwrap();
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;

    let eligible = find_eligible_providers(&pool, &quote.job).await.unwrap();

    assert_eq!(eligible, vec![available]);
}

// ---------------------------------------------------------------------------
// Offer cursor
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_live_offer_is_kept(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;
    assert_eq!(job.offered_to_id, Some(first));

    let held = dispatch_job(&pool, job.id, now + Duration::seconds(5), &config())
        .await
        .unwrap();

    assert_eq!(held, Some(first));
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.offered_at.map(|t| t.timestamp()), Some(now.timestamp()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expired_offer_moves_on_and_wraps(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    let t1 = now + past_timeout();
    let next = dispatch_job(&pool, job.id, t1, &config()).await.unwrap();
    assert_eq!(next, Some(second));

    let t2 = t1 + past_timeout();
    let wrapped = dispatch_job(&pool, job.id, t2, &config()).await.unwrap();
    assert_eq!(wrapped, Some(first));

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Assigning);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_no_eligible_provider_clears_the_offer(pool: PgPool) {
    let only = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;
    assert_eq!(job.offered_to_id, Some(only));

    ProviderRepo::set_online(&pool, only, false).await.unwrap();
    let result = dispatch_job(&pool, job.id, now + past_timeout(), &config())
        .await
        .unwrap();

    assert_eq!(result, None);
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.offered_to_id, None);
    assert_eq!(job.offered_at, None);
    assert_eq!(job.status().unwrap(), JobStatus::Assigning);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_dispatch_ignores_jobs_not_taking_offers(pool: PgPool) {
    online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;

    let result = dispatch_job(&pool, quote.job.id, Utc::now(), &config())
        .await
        .unwrap();

    assert_eq!(result, None);
    let job = JobRepo::find_by_id(&pool, quote.job.id).await.unwrap().unwrap();
    assert_eq!(job.offered_to_id, None);
}

// ---------------------------------------------------------------------------
// Accept / decline
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_decline_moves_offer_immediately(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    let next = offers::decline_job(&pool, &config(), &provider(first), job.id, now)
        .await
        .unwrap();

    assert_eq!(next, Some(second));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_late_decline_does_not_skip_the_next_offeree(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    online_provider(&pool, "C", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;
    assert_eq!(job.offered_to_id, Some(first));

    // The sweep moves the lapsed offer on before A's decline is applied.
    let later = now + past_timeout();
    let moved = dispatch_job(&pool, job.id, later, &config()).await.unwrap();
    assert_eq!(moved, Some(second));

    let after = advance_after_decline(&pool, job.id, first, later, &config())
        .await
        .unwrap();

    assert_eq!(after, Some(second));
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.offered_to_id, Some(second));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_the_offeree_may_decline(pool: PgPool) {
    online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    let result = offers::decline_job(&pool, &config(), &provider(second), job.id, now).await;

    assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_live_offer_blocks_other_providers(pool: PgPool) {
    online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    let result = offers::accept_job(&pool, &config(), &provider(second), job.id, now).await;

    assert_matches!(result, Err(AppError::Core(CoreError::Conflict(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_accept_assigns_and_clears_offer(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    let job = offers::accept_job(&pool, &config(), &provider(first), job.id, now)
        .await
        .unwrap();

    assert_eq!(job.status().unwrap(), JobStatus::Assigned);
    assert_eq!(job.provider_id, Some(first));
    assert_eq!(job.offered_to_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_accepts_have_one_winner(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    // Once the offer has lapsed either provider may try to take the job.
    let later = now + past_timeout();
    let cfg = config();
    let actor_a = provider(first);
    let actor_b = provider(second);
    let (a, b) = tokio::join!(
        offers::accept_job(&pool, &cfg, &actor_a, job.id, later),
        offers::accept_job(&pool, &cfg, &actor_b, job.id, later),
    );

    let results = [a, b];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one accept must succeed");
    for result in &results {
        if let Err(err) = result {
            assert_matches!(err, AppError::Core(CoreError::Conflict(_)));
        }
    }

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Assigned);
    assert!(job.provider_id == Some(first) || job.provider_id == Some(second));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ineligible_provider_cannot_take_a_lapsed_offer(pool: PgPool) {
    online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let electrician = online_provider(&pool, "Sparks", "generalist", &["electrical"]).await;
    let offline_plumber = online_provider(&pool, "Off", "generalist", &["plumbing"]).await;
    ProviderRepo::set_online(&pool, offline_plumber, false).await.unwrap();
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;
    let later = now + past_timeout();

    for outsider in [electrician, offline_plumber] {
        let result =
            offers::accept_job(&pool, &config(), &provider(outsider), job.id, later).await;
        assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
    }

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Assigning);
    assert_eq!(job.provider_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_suspended_provider_cannot_accept(pool: PgPool) {
    let first = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;
    ProviderRepo::set_active(&pool, first, false).await.unwrap();

    let result = offers::accept_job(&pool, &config(), &provider(first), job.id, now).await;

    assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
}

// ---------------------------------------------------------------------------
// Tracker sweeps
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_sweep_advances_only_expired_offers(pool: PgPool) {
    online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let second = online_provider(&pool, "B", "generalist", &["plumbing"]).await;
    let quote = quote(&pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(&pool, &quote, ScopeAnswers::new(), now).await;

    let idle = ensure_dispatch_progress(&pool, &config(), now + Duration::seconds(3))
        .await
        .unwrap();
    assert_eq!(idle, 0);

    let stepped = ensure_dispatch_progress(&pool, &config(), now + past_timeout())
        .await
        .unwrap();
    assert_eq!(stepped, 1);
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.offered_to_id, Some(second));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_activation_sweep_waits_for_the_window(pool: PgPool) {
    let plumber = online_provider(&pool, "A", "generalist", &["plumbing"]).await;
    let now = Utc::now();
    let scheduled_at = now + Duration::hours(5);
    let quote = booking::create_job(
        &pool,
        &customer(),
        &CreateJob {
            description: "Afternoon visit".to_string(),
            location: "1 High Street".to_string(),
            item_ids: vec![ITEM_TAP_WASHER],
            is_asap: false,
            scheduled_at: Some(scheduled_at),
        },
        now,
    )
    .await
    .unwrap();
    booking::lock_scope(
        &pool,
        &config(),
        &customer(),
        quote.visits[0].id,
        &LockScope::default(),
        now,
    )
    .await
    .unwrap();

    let early = activate_booked_jobs(&pool, &config(), now).await.unwrap();
    assert_eq!(early, 0);
    let job = JobRepo::find_by_id(&pool, quote.job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Booked);

    // Inside the activation lead.
    let due = scheduled_at - Duration::minutes(config().activation_lead_mins - 1);
    let activated = activate_booked_jobs(&pool, &config(), due).await.unwrap();
    assert_eq!(activated, 1);

    let job = JobRepo::find_by_id(&pool, quote.job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Assigning);
    assert_eq!(job.offered_to_id, Some(plumber));

    // Idempotent.
    let again = activate_booked_jobs(&pool, &config(), due).await.unwrap();
    assert_eq!(again, 0);
}
