//! Startup configuration for the billing service.
//!
//! Everything here is resolved once, before the first subscription is
//! created, and handed to the components that need it.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use url::Url;

use crate::errors::{BillingError, Result};

pub const DEFAULT_ID_COLUMN: &str = "iugu_id";
pub const DEFAULT_PLAN_COLUMN: &str = "iugu_plan";
pub const DEFAULT_IUGU_API_URL: &str = "https://api.iugu.com/v1/";
pub const DEFAULT_PORT: u16 = 3011;

const ID_COLUMN_ENV: &str = "IUGU_SUBSCRIPTION_MODEL_ID_COLUMN";
const PLAN_COLUMN_ENV: &str = "IUGU_SUBSCRIPTION_MODEL_PLAN_COLUMN";
const ID_COLUMN_KEY: &str = "iugu.subscription_model_id_column";
const PLAN_COLUMN_KEY: &str = "iugu.subscription_model_plan_column";

/// Application-level service configuration, read from a JSON document.
///
/// Keys are addressed with dotted paths, e.g. `iugu.subscription_model_id_column`.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServicesConfig {
    #[serde(flatten)]
    pub entries: HashMap<String, Value>,
}

impl ServicesConfig {
    // Load from a provided path or env var BILLING_SERVICES_CONFIG, defaulting to ./services.json
    pub fn from_path(path: Option<String>) -> Self {
        let default_path = env::var("BILLING_SERVICES_CONFIG")
            .unwrap_or_else(|_| "services.json".to_string());
        let path = path.unwrap_or(default_path);

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path, "Ignoring malformed services config: {}", e);
                ServicesConfig::default()
            }),
            Err(_) => ServicesConfig::default(),
        }
    }

    pub fn from_env_path() -> Self {
        Self::from_path(None)
    }

    /// Looks up a non-empty string under a dotted key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        let mut parts = key.split('.');
        let mut current = self.entries.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        current.as_str().filter(|s| !s.trim().is_empty())
    }
}

/// Storage column names for the gateway-linked fields of a local subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionColumns {
    pub id_column: String,
    pub plan_column: String,
}

impl Default for SubscriptionColumns {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            plan_column: DEFAULT_PLAN_COLUMN.to_string(),
        }
    }
}

impl SubscriptionColumns {
    /// Resolves each column from the process environment, then the services
    /// config, then the built-in default.
    pub fn resolve(services: &ServicesConfig) -> Self {
        Self::resolve_from(|key| env::var(key).ok(), services)
    }

    pub fn resolve_from<F>(lookup: F, services: &ServicesConfig) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |env_key: &str, config_key: &str, default: &str| {
            lookup(env_key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| services.get_str(config_key).map(str::to_string))
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            id_column: pick(ID_COLUMN_ENV, ID_COLUMN_KEY, DEFAULT_ID_COLUMN),
            plan_column: pick(PLAN_COLUMN_ENV, PLAN_COLUMN_KEY, DEFAULT_PLAN_COLUMN),
        }
    }
}

/// Everything the `billing-service` binary needs to start.
#[derive(Clone, Debug)]
pub struct BillingConfig {
    pub port: u16,
    pub database_url: String,
    pub iugu_api_token: String,
    pub iugu_api_url: Url,
    pub columns: SubscriptionColumns,
    pub run_migrations: bool,
}

impl BillingConfig {
    pub fn from_env() -> Result<Self> {
        let port = env::var("BILLING_SERVICE_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let database_url = non_empty_var("DATABASE_URL")
            .ok_or_else(|| BillingError::Config("DATABASE_URL must be set".to_string()))?;

        let iugu_api_token = non_empty_var("IUGU_API_TOKEN")
            .ok_or_else(|| BillingError::Config("IUGU_API_TOKEN must be set".to_string()))?;

        let raw_url =
            non_empty_var("IUGU_API_URL").unwrap_or_else(|| DEFAULT_IUGU_API_URL.to_string());
        let iugu_api_url = parse_base_url(&raw_url)?;

        let run_migrations = env::var("BILLING_RUN_MIGRATIONS")
            .map(|v| v == "true")
            .unwrap_or(false);

        let services = ServicesConfig::from_env_path();

        Ok(Self {
            port,
            database_url,
            iugu_api_token,
            iugu_api_url,
            columns: SubscriptionColumns::resolve(&services),
            run_migrations,
        })
    }
}

/// Parses a gateway base URL, forcing a trailing slash so relative joins keep the path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized)
        .map_err(|e| BillingError::Config(format!("Invalid Iugu API URL '{}': {}", raw, e)))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
