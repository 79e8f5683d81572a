//! Parts, disputes, scope mismatches and flags.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{
    admin, assigned_job, completed_job, customer, drive, job_in_progress, provider,
};
use sqlx::PgPool;
use tradeflow_api::error::AppError;
use tradeflow_api::workflows::execution::{self, ChangeStatus};
use tradeflow_api::workflows::flags::{self, FlagJob, ResolveFlag};
use tradeflow_api::workflows::issues::{self, IssueNote, RaiseIssue, ResolveIssue};
use tradeflow_api::workflows::mismatch::{self, ReportMismatch, ResolveMismatch};
use tradeflow_api::workflows::parts::{self, DecideParts, RequestParts};
use tradeflow_api::workflows::settlement;
use tradeflow_core::error::CoreError;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::types::DbId;
use tradeflow_db::models::evidence::PhotoRef;
use tradeflow_db::repositories::{EvidenceRepo, JobRepo, TransactionRepo, VisitRepo};

fn photo(job_id: DbId, name: &str) -> PhotoRef {
    PhotoRef {
        storage_key: format!("jobs/{job_id}/{name}"),
    }
}

fn parts_request(job_id: DbId) -> RequestParts {
    RequestParts {
        note: "Needs a 15mm compression valve".to_string(),
        cost_pence: Some(850),
        photos: vec![photo(job_id, "valve.jpg")],
    }
}

fn decision(value: &str) -> DecideParts {
    DecideParts {
        decision: value.to_string(),
        note: None,
    }
}

fn resolution(value: &str) -> ResolveIssue {
    ResolveIssue {
        resolution: value.to_string(),
        note: Some("Reviewed evidence".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_parts_approval_then_resume(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let worker = provider(provider_id);
    let now = Utc::now();

    let job = parts::request_parts(&pool, &worker, job.id, &parts_request(job.id), now)
        .await
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::PartsRequired);
    assert!(job.timer_paused_at.is_some());
    assert!(job.timer_paused_for_parts);

    let later = now + Duration::minutes(30);
    let job = parts::decide_parts(&pool, &customer(), job.id, &decision("APPROVE"), later)
        .await
        .unwrap();
    // Approval resumes the clock but the provider still has to resume work.
    assert_eq!(job.status().unwrap(), JobStatus::PartsRequired);
    assert!(job.timer_paused_at.is_none());
    assert!(!job.timer_paused_for_parts);
    assert!(job.timer_paused_total_secs >= 30 * 60 - 1);

    let job = parts::resume_work(&pool, &worker, job.id, later).await.unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::InProgress);

    let evidence = EvidenceRepo::list_for_job(&pool, job.id).await.unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].photo_type, "parts");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_parts_rejection_reports_an_issue(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    parts::request_parts(&pool, &provider(provider_id), job.id, &parts_request(job.id), Utc::now())
        .await
        .unwrap();

    let job = parts::decide_parts(&pool, &customer(), job.id, &decision("REJECT"), Utc::now())
        .await
        .unwrap();

    assert_eq!(job.status().unwrap(), JobStatus::IssueReported);
    let mut conn = pool.acquire().await.unwrap();
    let visits = VisitRepo::list_for_job(&mut conn, job.id).await.unwrap();
    assert_eq!(visits[0].status, "ISSUE_PENDING");
    assert_eq!(visits[0].parts_status.as_deref(), Some("REJECTED"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resume_needs_approved_parts(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let worker = provider(provider_id);
    parts::request_parts(&pool, &worker, job.id, &parts_request(job.id), Utc::now())
        .await
        .unwrap();

    let result = parts::resume_work(&pool, &worker, job.id, Utc::now()).await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
}

fn change_to(status: JobStatus) -> ChangeStatus {
    ChangeStatus {
        status: status.as_str().to_string(),
        reason: None,
        photos: Vec::new(),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_pending_parts_cannot_be_skipped_with_change_status(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let worker = provider(provider_id);
    parts::request_parts(&pool, &worker, job.id, &parts_request(job.id), Utc::now())
        .await
        .unwrap();

    let result = execution::change_status(
        &pool,
        &worker,
        job.id,
        &change_to(JobStatus::InProgress),
        Utc::now(),
    )
    .await;

    assert_matches!(
        result,
        Err(AppError::Core(CoreError::Validation(msg))) if msg.contains("resume-work")
    );
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::PartsRequired);
    assert!(job.timer_paused_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mismatch_cannot_be_skipped_with_change_status(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let worker = provider(provider_id);
    mismatch::report_mismatch(
        &pool,
        &worker,
        job.id,
        &ReportMismatch {
            note: "Valve seized as well".to_string(),
            additional_minutes: 30,
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await
    .unwrap();

    let result = execution::change_status(
        &pool,
        &worker,
        job.id,
        &change_to(JobStatus::InProgress),
        Utc::now(),
    )
    .await;

    assert_matches!(
        result,
        Err(AppError::Core(CoreError::Validation(msg))) if msg.contains("mismatch-resolution")
    );
    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::MismatchPending);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_parts_note_is_required(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;

    let result = parts::request_parts(
        &pool,
        &provider(provider_id),
        job.id,
        &RequestParts {
            note: "   ".to_string(),
            cost_pence: None,
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_photo_keys_must_belong_to_the_job(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let before = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();

    let result = parts::request_parts(
        &pool,
        &provider(provider_id),
        job.id,
        &RequestParts {
            note: "Valve".to_string(),
            cost_pence: None,
            photos: vec![photo(job.id + 1, "elsewhere.jpg")],
        },
        Utc::now(),
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
    // Rolled back: still in progress, clock still running.
    let after = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(after.status().unwrap(), JobStatus::InProgress);
    assert_eq!(after.timer_paused_at, before.timer_paused_at);
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_provider_issue_freezes_timer_until_resumed(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let now = Utc::now();

    let job = issues::raise_issue(
        &pool,
        &provider(provider_id),
        job.id,
        &RaiseIssue {
            note: Some("Customer's dog is loose".to_string()),
            photos: Vec::new(),
        },
        now,
    )
    .await
    .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::IssueRaisedByProvider);
    assert_eq!(job.issue_raised_by.as_deref(), Some("provider"));
    assert!(job.timer_frozen_for_issue);
    assert!(job.timer_paused_at.is_some());

    let job = issues::take_up_issue(&pool, &admin(), job.id, &IssueNote::default())
        .await
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::ResolutionPending);

    let job = issues::resolve_issue(&pool, &admin(), job.id, &resolution("RESUME_WORK"), now)
        .await
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::InProgress);
    assert!(!job.timer_frozen_for_issue);
    assert!(job.timer_paused_at.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_customer_issue_blocks_payout_until_released(pool: PgPool) {
    let (job, _) = completed_job(&pool).await;

    let job = issues::raise_issue(
        &pool,
        &customer(),
        job.id,
        &RaiseIssue {
            note: Some("Tap still drips".to_string()),
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::IssueRaisedByCustomer);
    assert!(job.payout_frozen);

    // A disputed job cannot be captured.
    let capture = settlement::capture(&pool, &admin(), job.id).await;
    assert_matches!(capture, Err(AppError::Core(CoreError::InvalidTransition { .. })));

    issues::take_up_issue(&pool, &admin(), job.id, &IssueNote::default())
        .await
        .unwrap();
    let job = issues::resolve_issue(&pool, &admin(), job.id, &resolution("RELEASE"), Utc::now())
        .await
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Completed);
    assert!(!job.payout_frozen);

    let job = settlement::capture(&pool, &admin(), job.id).await.unwrap();
    let job = settlement::payout(&pool, &admin(), job.id).await.unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::PaidOut);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_issue_cancel_charged_records_fee(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    issues::raise_issue(&pool, &provider(provider_id), job.id, &RaiseIssue::default(), Utc::now())
        .await
        .unwrap();
    issues::take_up_issue(&pool, &admin(), job.id, &IssueNote::default())
        .await
        .unwrap();

    let job = issues::resolve_issue(&pool, &admin(), job.id, &resolution("CANCEL_CHARGED"), Utc::now())
        .await
        .unwrap();

    assert_eq!(job.status().unwrap(), JobStatus::CancelledCharged);
    assert_eq!(job.cancelled_by_role.as_deref(), Some("admin"));
    let ledger = TransactionRepo::list_for_job(&pool, job.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, "FEE");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_parties_raise_issues(pool: PgPool) {
    let (job, _) = completed_job(&pool).await;

    let result = issues::raise_issue(&pool, &provider(9_999), job.id, &RaiseIssue::default(), Utc::now()).await;

    assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resolution_pending_is_not_left_by_change_status(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    issues::raise_issue(&pool, &provider(provider_id), job.id, &RaiseIssue::default(), Utc::now())
        .await
        .unwrap();
    issues::take_up_issue(&pool, &admin(), job.id, &IssueNote::default())
        .await
        .unwrap();

    let result = execution::change_status(
        &pool,
        &admin(),
        job.id,
        &change_to(JobStatus::InProgress),
        Utc::now(),
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
}

// ---------------------------------------------------------------------------
// Scope mismatch
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mismatch_upgrade_reprices_and_resumes(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let worker = provider(provider_id);
    let now = Utc::now();

    let job = mismatch::report_mismatch(
        &pool,
        &worker,
        job.id,
        &ReportMismatch {
            note: "Valve seized as well".to_string(),
            additional_minutes: 30,
            photos: Vec::new(),
        },
        now,
    )
    .await
    .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::MismatchPending);
    assert!(job.timer_paused_at.is_some());

    let outcome = mismatch::resolve_mismatch(
        &pool,
        &customer(),
        job.id,
        &ResolveMismatch {
            resolution: "UPGRADE".to_string(),
            note: None,
        },
        now,
    )
    .await
    .unwrap();

    // 30 locked minutes + 30 more = 60 -> H2.
    assert_eq!(outcome.job.status().unwrap(), JobStatus::InProgress);
    assert_eq!(outcome.visit.tier_code, "H2");
    assert_eq!(outcome.visit.price_pence, 6_900);
    assert_eq!(outcome.job.fixed_price_pence, 6_900);

    let ledger = TransactionRepo::list_for_job(&pool, job.id).await.unwrap();
    let charge = ledger.iter().find(|t| t.kind == "CHARGE").unwrap();
    assert_eq!(charge.status, "PENDING");
    assert_eq!(charge.amount_pence, 6_900);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mismatch_rebook_replaces_the_visit(pool: PgPool) {
    let (job, provider_id) = assigned_job(&pool).await;
    let worker = provider(provider_id);
    drive(&pool, &customer(), job.id, JobStatus::Preauthorised).await;
    drive(&pool, &worker, job.id, JobStatus::Arriving).await;
    drive(&pool, &worker, job.id, JobStatus::OnSite).await;

    let job = mismatch::report_mismatch(
        &pool,
        &worker,
        job.id,
        &ReportMismatch {
            note: "Whole run needs replacing".to_string(),
            additional_minutes: 90,
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::ScopeMismatch);

    let outcome = mismatch::resolve_mismatch(
        &pool,
        &customer(),
        job.id,
        &ResolveMismatch {
            resolution: "REBOOK".to_string(),
            note: None,
        },
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.job.status().unwrap(), JobStatus::RebookRequired);
    assert_eq!(outcome.job.provider_id, None);
    assert_eq!(outcome.visit.status, "DRAFT");
    assert_eq!(outcome.visit.base_minutes, 120);
    assert!(TransactionRepo::list_for_job(&pool, job.id).await.unwrap().is_empty());

    let mut conn = pool.acquire().await.unwrap();
    let visits = VisitRepo::list_for_job(&mut conn, job.id).await.unwrap();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].status, "CANCELLED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_provider_cannot_resolve_own_mismatch(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;
    let worker = provider(provider_id);
    mismatch::report_mismatch(
        &pool,
        &worker,
        job.id,
        &ReportMismatch {
            note: "More work".to_string(),
            additional_minutes: 15,
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await
    .unwrap();

    let result = mismatch::resolve_mismatch(
        &pool,
        &worker,
        job.id,
        &ResolveMismatch {
            resolution: "UPGRADE".to_string(),
            note: None,
        },
        Utc::now(),
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_mismatch_minutes_are_bounded(pool: PgPool) {
    let (job, provider_id) = job_in_progress(&pool).await;

    let result = mismatch::report_mismatch(
        &pool,
        &provider(provider_id),
        job.id,
        &ReportMismatch {
            note: "Huge".to_string(),
            additional_minutes: 0,
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_flag_and_return_to_dispatch(pool: PgPool) {
    let (job, provider_id) = assigned_job(&pool).await;

    let job = flags::flag_job(
        &pool,
        &provider(provider_id),
        job.id,
        &FlagJob {
            reason: "wrong_capability".to_string(),
            note: Some("Needs a gas engineer".to_string()),
            photos: Vec::new(),
        },
    )
    .await
    .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::FlaggedReview);
    assert_eq!(job.flag_reason.as_deref(), Some("wrong_capability"));

    let job = flags::resolve_flag(
        &pool,
        &admin(),
        job.id,
        &ResolveFlag {
            resolution: "RETURN_TO_DISPATCH".to_string(),
            note: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::WaitingForDispatch);
    assert_eq!(job.provider_id, None);
    assert_eq!(job.flag_reason, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_flag_reason_must_be_known(pool: PgPool) {
    let (job, _) = assigned_job(&pool).await;

    let result = flags::flag_job(
        &pool,
        &customer(),
        job.id,
        &FlagJob {
            reason: "bad_vibes".to_string(),
            note: None,
            photos: Vec::new(),
        },
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Validation(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_admins_resolve_flags(pool: PgPool) {
    let (job, _) = assigned_job(&pool).await;
    flags::flag_job(
        &pool,
        &customer(),
        job.id,
        &FlagJob {
            reason: "safety".to_string(),
            note: None,
            photos: Vec::new(),
        },
    )
    .await
    .unwrap();

    let result = flags::resolve_flag(
        &pool,
        &customer(),
        job.id,
        &ResolveFlag {
            resolution: "CANCEL_FREE".to_string(),
            note: None,
        },
    )
    .await;

    assert_matches!(result, Err(AppError::Core(CoreError::Forbidden(_))));
}
