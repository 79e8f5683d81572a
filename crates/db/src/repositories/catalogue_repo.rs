//! Read-only catalogue lookups.

use std::collections::HashMap;

use sqlx::PgConnection;
use tradeflow_core::catalogue::{sort_ladder, CatalogueItem, PricingTier};
use tradeflow_core::error::CoreError;
use tradeflow_core::types::DbId;

use crate::models::catalogue::{JobItemRow, PricingTierRow};

const ITEM_COLUMNS: &str = "\
    id, display_name, category, capability_tag, base_minutes, ladder_code, \
    uncertainty_prone, uncertainty_policy, risk_buffer_minutes";

const TIER_COLUMNS: &str = "ladder_code, code, max_minutes, price_pence";

/// Errors from catalogue lookups.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Provides item and ladder lookups.
pub struct CatalogueRepo;

impl CatalogueRepo {
    /// Resolve item ids, keeping the caller's order. Duplicates are kept.
    ///
    /// Unknown ids are a validation error naming them.
    pub async fn find_items(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<CatalogueItem>, CatalogueError> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM job_items WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, JobItemRow>(&query)
            .bind(ids)
            .fetch_all(conn)
            .await?;

        let mut by_id: HashMap<DbId, CatalogueItem> = HashMap::with_capacity(rows.len());
        for row in rows {
            by_id.insert(row.id, CatalogueItem::try_from(row)?);
        }

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !by_id.contains_key(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "Unknown job item ids: {}",
                missing.join(", ")
            ))
            .into());
        }

        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    /// Tiers of one ladder, ascending by `max_minutes` with the unbounded
    /// tier last.
    pub async fn ladder_tiers(
        conn: &mut PgConnection,
        ladder_code: &str,
    ) -> Result<Vec<PricingTier>, sqlx::Error> {
        let query = format!("SELECT {TIER_COLUMNS} FROM pricing_tiers WHERE ladder_code = $1");
        let rows = sqlx::query_as::<_, PricingTierRow>(&query)
            .bind(ladder_code)
            .fetch_all(conn)
            .await?;
        let mut tiers: Vec<PricingTier> = rows.into_iter().map(PricingTier::from).collect();
        sort_ladder(&mut tiers);
        Ok(tiers)
    }

    /// Tiers of several ladders keyed by ladder code.
    pub async fn ladders(
        conn: &mut PgConnection,
        ladder_codes: &[String],
    ) -> Result<HashMap<String, Vec<PricingTier>>, sqlx::Error> {
        let query = format!("SELECT {TIER_COLUMNS} FROM pricing_tiers WHERE ladder_code = ANY($1)");
        let rows = sqlx::query_as::<_, PricingTierRow>(&query)
            .bind(ladder_codes)
            .fetch_all(conn)
            .await?;

        let mut ladders: HashMap<String, Vec<PricingTier>> = HashMap::new();
        for row in rows {
            ladders
                .entry(row.ladder_code.clone())
                .or_default()
                .push(PricingTier::from(row));
        }
        for tiers in ladders.values_mut() {
            sort_ladder(tiers);
        }
        Ok(ladders)
    }
}
