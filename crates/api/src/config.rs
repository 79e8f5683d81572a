use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// secrets. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after the server does (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Evidence read-URL signing.
    pub evidence: EvidenceConfig,
    /// Offer window and sweep timing.
    pub dispatch: DispatchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    ///
    /// JWT, evidence and dispatch settings are documented on their own
    /// `from_env` functions.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            evidence: EvidenceConfig::from_env(),
            dispatch: DispatchConfig::from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Settings for signed evidence read URLs.
#[derive(Debug, Clone)]
pub struct EvidenceConfig {
    /// HMAC-SHA256 key shared with the storage gateway.
    pub signing_secret: String,
    /// Public base URL of the evidence store.
    pub base_url: String,
    /// Lifetime of a signed read URL in seconds.
    pub url_ttl_secs: i64,
}

const DEFAULT_EVIDENCE_TTL_SECS: i64 = 900;

impl EvidenceConfig {
    /// | Env Var                   | Required | Default                    |
    /// |---------------------------|----------|----------------------------|
    /// | `EVIDENCE_SIGNING_SECRET` | **yes**  | --                         |
    /// | `EVIDENCE_BASE_URL`       | no       | `http://localhost:9000/evidence` |
    /// | `EVIDENCE_URL_TTL_SECS`   | no       | `900`                      |
    ///
    /// # Panics
    ///
    /// Panics if `EVIDENCE_SIGNING_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let signing_secret = std::env::var("EVIDENCE_SIGNING_SECRET")
            .expect("EVIDENCE_SIGNING_SECRET must be set in the environment");
        assert!(
            !signing_secret.is_empty(),
            "EVIDENCE_SIGNING_SECRET must not be empty"
        );

        let base_url = std::env::var("EVIDENCE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9000/evidence".into());

        let url_ttl_secs: i64 = std::env::var("EVIDENCE_URL_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_EVIDENCE_TTL_SECS.to_string())
            .parse()
            .expect("EVIDENCE_URL_TTL_SECS must be a valid i64");

        Self {
            signing_secret,
            base_url,
            url_ttl_secs,
        }
    }

    pub fn url_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.url_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Offer window and dispatch sweep timing.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long one provider holds an exclusive offer.
    pub offer_timeout_secs: i64,
    /// How long before a scheduled start a booked job enters dispatch.
    pub activation_lead_mins: i64,
    /// Interval of the dispatch tracker sweeps. Must be below the offer
    /// timeout so expiry is noticed within one window.
    pub sweep_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            offer_timeout_secs: tradeflow_core::dispatch::DEFAULT_OFFER_TIMEOUT_SECS,
            activation_lead_mins: tradeflow_core::dispatch::DEFAULT_ACTIVATION_LEAD_MINS,
            sweep_interval_secs: 3,
        }
    }
}

impl DispatchConfig {
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `DISPATCH_OFFER_TIMEOUT_SECS`    | `10`    |
    /// | `DISPATCH_ACTIVATION_LEAD_MINS`  | `120`   |
    /// | `DISPATCH_SWEEP_INTERVAL_SECS`   | `3`     |
    ///
    /// # Panics
    ///
    /// Panics if the sweep interval is not shorter than the offer timeout.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let offer_timeout_secs: i64 = std::env::var("DISPATCH_OFFER_TIMEOUT_SECS")
            .map(|v| v.parse().expect("DISPATCH_OFFER_TIMEOUT_SECS must be a valid i64"))
            .unwrap_or(defaults.offer_timeout_secs);

        let activation_lead_mins: i64 = std::env::var("DISPATCH_ACTIVATION_LEAD_MINS")
            .map(|v| v.parse().expect("DISPATCH_ACTIVATION_LEAD_MINS must be a valid i64"))
            .unwrap_or(defaults.activation_lead_mins);

        let sweep_interval_secs: u64 = std::env::var("DISPATCH_SWEEP_INTERVAL_SECS")
            .map(|v| v.parse().expect("DISPATCH_SWEEP_INTERVAL_SECS must be a valid u64"))
            .unwrap_or(defaults.sweep_interval_secs);

        assert!(
            offer_timeout_secs > 0 && (sweep_interval_secs as i64) < offer_timeout_secs,
            "DISPATCH_SWEEP_INTERVAL_SECS must be shorter than DISPATCH_OFFER_TIMEOUT_SECS"
        );

        Self {
            offer_timeout_secs,
            activation_lead_mins,
            sweep_interval_secs,
        }
    }

    pub fn offer_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.offer_timeout_secs)
    }

    pub fn activation_lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.activation_lead_mins)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}
