#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use tradeflow_api::auth::jwt::{issue_token, JwtConfig};
use tradeflow_api::config::{DispatchConfig, EvidenceConfig, ServerConfig};
use tradeflow_api::router::build_app_router;
use tradeflow_api::state::AppState;
use tradeflow_api::workflows::booking::{self, JobQuote, LockScope};
use tradeflow_api::workflows::execution::{self, ChangeStatus};
use tradeflow_api::workflows::offers;
use tradeflow_core::job_status::JobStatus;
use tradeflow_core::pricing::ScopeAnswers;
use tradeflow_core::roles::{Actor, ROLE_ADMIN, ROLE_CUSTOMER, ROLE_PROVIDER};
use tradeflow_core::types::{DbId, Timestamp};
use tradeflow_db::models::job::{CreateJob, Job};
use tradeflow_db::models::provider::CreateProvider;
use tradeflow_db::repositories::ProviderRepo;

// ---------------------------------------------------------------------------
// Seeded catalogue items (db/migrations/20260101000003_catalogue.sql)
// ---------------------------------------------------------------------------

/// 30 min plumbing, IGNORE. Prices at standard H1 (4400).
pub const ITEM_TAP_WASHER: DbId = 1;
/// 45 min plumbing, BUFFER +30.
pub const ITEM_INVESTIGATE_LEAK: DbId = 2;
/// 30 min electrical, IGNORE.
pub const ITEM_REPLACE_SOCKET: DbId = 4;
/// 45 min electrical, FORCE_H3.
pub const ITEM_TRACE_FAULT: DbId = 5;
/// 120 min cleaning.
pub const ITEM_END_OF_TENANCY: DbId = 9;

pub const CUSTOMER_ID: DbId = 100;
pub const ADMIN_ID: DbId = 1;

// ---------------------------------------------------------------------------
// Configuration and router
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with fixed secrets and default dispatch
/// timing.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        evidence: EvidenceConfig {
            signing_secret: "test-evidence-signing-secret".to_string(),
            base_url: "http://localhost:9000/evidence".to_string(),
            url_ttl_secs: 900,
        },
        dispatch: DispatchConfig::default(),
    }
}

/// Build the full application router over `pool`, with the same middleware
/// stack production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Bearer token for `subject` acting as `role`.
pub fn token_for(subject: DbId, role: &str) -> String {
    issue_token(subject, role, &test_config().jwt).expect("token generation")
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST with no body at all.
pub async fn post_empty_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

pub fn customer() -> Actor {
    Actor::new(CUSTOMER_ID, ROLE_CUSTOMER)
}

pub fn admin() -> Actor {
    Actor::new(ADMIN_ID, ROLE_ADMIN)
}

pub fn provider(id: DbId) -> Actor {
    Actor::new(id, ROLE_PROVIDER)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Register an active, online provider and return its id.
pub async fn online_provider(
    pool: &PgPool,
    name: &str,
    provider_type: &str,
    capabilities: &[&str],
) -> DbId {
    let created = ProviderRepo::create(
        pool,
        &CreateProvider {
            display_name: name.to_string(),
            provider_type: provider_type.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            categories: Vec::new(),
            latitude: None,
            longitude: None,
        },
    )
    .await
    .expect("provider creation should succeed");
    ProviderRepo::set_online(pool, created.id, true)
        .await
        .expect("set_online should succeed")
        .expect("provider exists");
    created.id
}

/// Quote an ASAP job for the test customer.
pub async fn quote(pool: &PgPool, item_ids: &[DbId]) -> JobQuote {
    booking::create_job(
        pool,
        &customer(),
        &CreateJob {
            description: "Kitchen tap drips".to_string(),
            location: "1 High Street".to_string(),
            item_ids: item_ids.to_vec(),
            is_asap: true,
            scheduled_at: None,
        },
        Utc::now(),
    )
    .await
    .expect("job creation should succeed")
}

/// Lock every visit of a quote with the given answers. Returns the job
/// after the final lock (and its initial dispatch step).
pub async fn lock_all(pool: &PgPool, quote: &JobQuote, answers: ScopeAnswers, now: Timestamp) -> Job {
    let config = DispatchConfig::default();
    let mut last = quote.job.clone();
    for visit in &quote.visits {
        let result = booking::lock_scope(
            pool,
            &config,
            &customer(),
            visit.id,
            &LockScope {
                answers: answers.clone(),
                photos: Vec::new(),
            },
            now,
        )
        .await
        .expect("scope lock should succeed");
        last = result.job;
    }
    last
}

/// A plumbing job taken by a freshly registered provider.
pub async fn assigned_job(pool: &PgPool) -> (Job, DbId) {
    let provider_id = online_provider(pool, "Pat Plumber", "generalist", &["plumbing"]).await;
    let quote = quote(pool, &[ITEM_TAP_WASHER]).await;
    let now = Utc::now();
    let job = lock_all(pool, &quote, ScopeAnswers::new(), now).await;
    assert_eq!(job.status().unwrap(), JobStatus::Assigning);
    assert_eq!(job.offered_to_id, Some(provider_id));

    let job = offers::accept_job(
        pool,
        &DispatchConfig::default(),
        &provider(provider_id),
        job.id,
        now,
    )
    .await
    .expect("offer holder should be able to accept");
    (job, provider_id)
}

/// Move a job through the generic change-status operation.
pub async fn drive(pool: &PgPool, actor: &Actor, job_id: DbId, to: JobStatus) -> Job {
    execution::change_status(
        pool,
        actor,
        job_id,
        &ChangeStatus {
            status: to.as_str().to_string(),
            reason: None,
            photos: Vec::new(),
        },
        Utc::now(),
    )
    .await
    .unwrap_or_else(|e| panic!("move to {to} should succeed: {e}"))
}

/// An assigned job driven to IN_PROGRESS.
pub async fn job_in_progress(pool: &PgPool) -> (Job, DbId) {
    let (job, provider_id) = assigned_job(pool).await;
    drive(pool, &customer(), job.id, JobStatus::Preauthorised).await;
    let worker = provider(provider_id);
    drive(pool, &worker, job.id, JobStatus::Arriving).await;
    drive(pool, &worker, job.id, JobStatus::OnSite).await;
    let job = drive(pool, &worker, job.id, JobStatus::InProgress).await;
    (job, provider_id)
}

/// An assigned job driven to COMPLETED.
pub async fn completed_job(pool: &PgPool) -> (Job, DbId) {
    let (job, provider_id) = job_in_progress(pool).await;
    let job = drive(pool, &provider(provider_id), job.id, JobStatus::Completed).await;
    (job, provider_id)
}
