// Configuration loaded from environment variables (and `.env` via dotenv).
//
// `from_env` is the only place that touches the process environment; the
// parsing itself goes through `from_lookup` so tests can feed a HashMap.

use crate::core::moderation::{ClassifierPolicy, MalformedPolicy};
use crate::infra::geocoding::nominatim_client::DEFAULT_NOMINATIM_URL;
use crate::infra::moderation::openai_client::DEFAULT_OPENAI_BASE_URL;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/reviews.db";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "VetExternshipMap/1.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Where reviews and clinics are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Sqlite {
        database_url: String,
    },
    Supabase {
        url: String,
        anon_key: String,
        service_role_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub classifier_policy: ClassifierPolicy,
    pub storage: StorageConfig,
    pub nominatim_url: String,
    pub geocoder_user_agent: String,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let defaults = ClassifierPolicy::default();
        let classifier_policy = ClassifierPolicy {
            timeout: get("MODERATION_TIMEOUT_MS")
                .map(|v| parse::<u64>("MODERATION_TIMEOUT_MS", &v).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.timeout),
            max_retries: get("MODERATION_MAX_RETRIES")
                .map(|v| parse::<u32>("MODERATION_MAX_RETRIES", &v))
                .transpose()?
                .unwrap_or(defaults.max_retries),
            initial_backoff: get("MODERATION_BACKOFF_MS")
                .map(|v| parse::<u64>("MODERATION_BACKOFF_MS", &v).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.initial_backoff),
            malformed: get("MODERATION_MALFORMED_POLICY")
                .map(|v| parse::<MalformedPolicy>("MODERATION_MALFORMED_POLICY", &v))
                .transpose()?
                .unwrap_or(defaults.malformed),
        };

        let storage = match get("SUPABASE_URL") {
            Some(url) => StorageConfig::Supabase {
                url,
                anon_key: get("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
                service_role_key: get("SUPABASE_SERVICE_ROLE_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            },
            None => StorageConfig::Sqlite {
                database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            },
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            classifier_policy,
            storage,
            nominatim_url: get("NOMINATIM_URL").unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            geocoder_user_agent: get("GEOCODER_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_GEOCODER_USER_AGENT.to_string()),
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
