//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods over
//! `&PgPool` or, for writes that share a workflow transaction,
//! `&mut PgConnection`.

pub mod catalogue_repo;
pub mod evidence_repo;
pub mod job_repo;
pub mod job_state_change_repo;
pub mod provider_repo;
pub mod review_repo;
pub mod scope_summary_repo;
pub mod transaction_repo;
pub mod visit_repo;

pub use catalogue_repo::{CatalogueError, CatalogueRepo};
pub use evidence_repo::EvidenceRepo;
pub use job_repo::JobRepo;
pub use job_state_change_repo::JobStateChangeRepo;
pub use provider_repo::ProviderRepo;
pub use review_repo::ReviewRepo;
pub use scope_summary_repo::ScopeSummaryRepo;
pub use transaction_repo::TransactionRepo;
pub use visit_repo::VisitRepo;
