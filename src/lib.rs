// Review moderation pipeline for the veterinary externship map.
//
// **Architecture Overview:**
// - `core/` = Business logic (moderation rules, review/clinic submission)
// - `infra/` = Implementations of core traits (classifier API, geocoder, stores)
// - `config.rs` = Environment configuration
// - `bootstrap.rs` = Dependency injection: config in, services out
//
// A host server calls `bootstrap::from_env()` once and then routes requests
// to `Services::reviews` and `Services::clinics`.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;

pub mod bootstrap;
pub mod config;

pub use bootstrap::{build_services, init_tracing, Services};
pub use config::{AppConfig, ConfigError, StorageConfig};
