// Wiring: turns an AppConfig into ready-to-use services.
//
// This is the only place that picks concrete infra types. The host server
// builds `Services` once at startup and calls into it per request.

use crate::config::{AppConfig, StorageConfig};
use crate::core::clinics::ClinicService;
use crate::core::moderation::ModerationService;
use crate::core::reviews::ReviewService;
use crate::infra::geocoding::NominatimClient;
use crate::infra::moderation::OpenAiModerationClient;
use crate::infra::storage::{AnyStore, SqliteStore, SupabaseClient, SupabaseStore};
use anyhow::Context;
use std::sync::Arc;

pub type AppReviewService = ReviewService<OpenAiModerationClient, Arc<AnyStore>>;
pub type AppClinicService = ClinicService<Arc<AnyStore>, NominatimClient>;

pub struct Services {
    pub reviews: AppReviewService,
    pub clinics: AppClinicService,
}

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Open the configured store (migrating SQLite if that's the backend).
pub async fn build_store(storage: &StorageConfig) -> anyhow::Result<AnyStore> {
    match storage {
        StorageConfig::Sqlite { database_url } => {
            let store = SqliteStore::connect(database_url)
                .await
                .with_context(|| format!("Failed to open review database at {}", database_url))?;
            tracing::info!("Using SQLite store at {}", database_url);
            Ok(AnyStore::Sqlite(store))
        }
        StorageConfig::Supabase {
            url,
            anon_key,
            service_role_key,
        } => {
            let reader = SupabaseClient::anonymous(url, anon_key)?;
            let writer = SupabaseClient::service_role(url, service_role_key)?;
            tracing::info!("Using hosted store at {}", url);
            Ok(AnyStore::Supabase(SupabaseStore::new(reader, writer)?))
        }
    }
}

/// Build every service from config.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    let store = Arc::new(build_store(&config.storage).await?);

    let classifier = OpenAiModerationClient::with_base_url(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    );
    let moderation = ModerationService::new(classifier, config.classifier_policy.clone());

    let geocoder = NominatimClient::new(config.nominatim_url.clone(), &config.geocoder_user_agent)?;

    tracing::info!(
        timeout = ?config.classifier_policy.timeout,
        retries = config.classifier_policy.max_retries,
        malformed = ?config.classifier_policy.malformed,
        "Moderation pipeline ready"
    );

    Ok(Services {
        reviews: ReviewService::new(moderation, store.clone()),
        clinics: ClinicService::new(store, geocoder),
    })
}

/// `init_tracing` + `AppConfig::from_env` + `build_services`.
pub async fn from_env() -> anyhow::Result<Services> {
    init_tracing();
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    build_services(&config).await
}
