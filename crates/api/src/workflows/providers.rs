//! Provider roster management.

use serde::Deserialize;
use sqlx::PgPool;
use tradeflow_core::dispatch::ProviderType;
use tradeflow_core::error::CoreError;
use tradeflow_core::roles::Actor;
use tradeflow_core::types::DbId;
use tradeflow_db::models::provider::{CreateProvider, Provider};
use tradeflow_db::repositories::ProviderRepo;
use validator::Validate;

use crate::error::AppResult;

fn provider_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Provider",
        id,
    }
}

/// Register a provider. New providers start active and offline.
pub async fn create_provider(pool: &PgPool, input: &CreateProvider) -> AppResult<Provider> {
    input.validate()?;
    if ProviderType::parse(&input.provider_type).is_none() {
        return Err(CoreError::Validation(format!(
            "Unknown provider type '{}'",
            input.provider_type
        ))
        .into());
    }
    if input.capabilities.iter().any(|c| c.trim().is_empty()) {
        return Err(CoreError::Validation("Capability tags cannot be blank".into()).into());
    }

    let provider = ProviderRepo::create(pool, input).await?;
    tracing::info!(
        provider_id = provider.id,
        provider_type = %provider.provider_type,
        "Provider registered",
    );
    Ok(provider)
}

/// Request body for `POST /api/v1/providers/me/online`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetOnline {
    pub is_online: bool,
}

/// Request body for `POST /api/v1/admin/providers/{id}/active`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetActive {
    pub is_active: bool,
}

/// The calling provider goes online or offline.
pub async fn set_online(pool: &PgPool, actor: &Actor, is_online: bool) -> AppResult<Provider> {
    let provider = ProviderRepo::set_online(pool, actor.id, is_online)
        .await?
        .ok_or_else(|| provider_not_found(actor.id))?;
    tracing::info!(provider_id = provider.id, is_online, "Provider availability changed");
    Ok(provider)
}

/// An administrator activates or suspends a provider. Suspended providers
/// are never offered jobs and cannot accept them.
pub async fn set_active(pool: &PgPool, provider_id: DbId, is_active: bool) -> AppResult<Provider> {
    let provider = ProviderRepo::set_active(pool, provider_id, is_active)
        .await?
        .ok_or_else(|| provider_not_found(provider_id))?;
    tracing::info!(provider_id, is_active, "Provider activation changed");
    Ok(provider)
}
