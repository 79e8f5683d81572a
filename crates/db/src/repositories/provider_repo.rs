//! Repository for the `providers` table.

use sqlx::{PgConnection, PgPool};
use tradeflow_core::types::DbId;

use crate::models::provider::{CreateProvider, Provider};

/// Column list for `providers` queries.
const COLUMNS: &str = "\
    id, display_name, provider_type, capabilities, categories, is_active, is_online, \
    latitude, longitude, created_at, updated_at";

/// Provides roster reads and the few writes providers and admins make.
pub struct ProviderRepo;

impl ProviderRepo {
    pub async fn create(pool: &PgPool, input: &CreateProvider) -> Result<Provider, sqlx::Error> {
        let query = format!(
            "INSERT INTO providers \
                 (display_name, provider_type, capabilities, categories, latitude, longitude) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Provider>(&query)
            .bind(&input.display_name)
            .bind(&input.provider_type)
            .bind(&input.capabilities)
            .bind(&input.categories)
            .bind(input.latitude)
            .bind(input.longitude)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Provider>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM providers WHERE id = $1");
        sqlx::query_as::<_, Provider>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_in(conn: &mut PgConnection, id: DbId) -> Result<Option<Provider>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM providers WHERE id = $1");
        sqlx::query_as::<_, Provider>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Active, online providers. Dispatch narrows these further in memory.
    pub async fn list_available(pool: &PgPool) -> Result<Vec<Provider>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM providers WHERE is_active AND is_online ORDER BY id ASC"
        );
        sqlx::query_as::<_, Provider>(&query).fetch_all(pool).await
    }

    /// Toggle availability. Returns the updated row, or `None` if unknown.
    pub async fn set_online(
        pool: &PgPool,
        id: DbId,
        is_online: bool,
    ) -> Result<Option<Provider>, sqlx::Error> {
        let query = format!(
            "UPDATE providers SET is_online = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Provider>(&query)
            .bind(id)
            .bind(is_online)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_active(
        pool: &PgPool,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<Provider>, sqlx::Error> {
        let query = format!(
            "UPDATE providers SET is_active = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Provider>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }
}
