//! Repository for write-once evidence photo references.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::evidence::PhotoType;
use tradeflow_core::roles::Actor;
use tradeflow_core::types::DbId;

use crate::models::evidence::EvidencePhoto;

/// Column list for `evidence_photos` queries.
const COLUMNS: &str = "\
    id, job_id, visit_id, photo_type, storage_key, uploaded_by, uploaded_by_role, created_at";

/// Provides insert and listing for evidence photos.
pub struct EvidenceRepo;

impl EvidenceRepo {
    /// Record photo references. Keys already on file are skipped, so a
    /// retried request never rewrites an existing row.
    ///
    /// Returns the rows actually inserted.
    pub async fn record(
        conn: &mut PgConnection,
        job_id: DbId,
        visit_id: Option<DbId>,
        photo_type: PhotoType,
        storage_keys: &[String],
        actor: &Actor,
    ) -> Result<Vec<EvidencePhoto>, sqlx::Error> {
        let query = format!(
            "INSERT INTO evidence_photos \
                 (job_id, visit_id, photo_type, storage_key, uploaded_by, uploaded_by_role) \
             SELECT $1, $2, $3, key, $5, $6 FROM UNNEST($4::TEXT[]) AS key \
             ON CONFLICT ON CONSTRAINT uq_evidence_photos_storage_key DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EvidencePhoto>(&query)
            .bind(job_id)
            .bind(visit_id)
            .bind(photo_type.as_str())
            .bind(storage_keys)
            .bind(actor.id)
            .bind(&actor.role)
            .fetch_all(conn)
            .await
    }

    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<EvidencePhoto>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM evidence_photos WHERE job_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, EvidencePhoto>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
