//! Repository for the `reviews` table.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::types::DbId;

use crate::models::review::Review;

/// Column list for `reviews` queries.
const COLUMNS: &str =
    "id, job_id, author_role, author_id, rating, comment, created_at, updated_at";

/// Provides review upsert and lookup.
pub struct ReviewRepo;

impl ReviewRepo {
    /// Insert or replace the review `author_role` left on a job.
    pub async fn upsert(
        pool: &PgPool,
        job_id: DbId,
        author_role: &str,
        author_id: DbId,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, sqlx::Error> {
        let query = format!(
            "INSERT INTO reviews (job_id, author_role, author_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_reviews_job_role DO UPDATE \
             SET author_id = EXCLUDED.author_id, rating = EXCLUDED.rating, \
                 comment = EXCLUDED.comment \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&query)
            .bind(job_id)
            .bind(author_role)
            .bind(author_id)
            .bind(rating)
            .bind(comment)
            .fetch_one(pool)
            .await
    }

    /// Author roles that have reviewed a job.
    pub async fn author_roles(
        conn: &mut PgConnection,
        job_id: DbId,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT author_role FROM reviews WHERE job_id = $1")
                .bind(job_id)
                .fetch_all(conn)
                .await?;
        Ok(rows.into_iter().map(|(role,)| role).collect())
    }

    pub async fn list_for_job(pool: &PgPool, job_id: DbId) -> Result<Vec<Review>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM reviews WHERE job_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, Review>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
