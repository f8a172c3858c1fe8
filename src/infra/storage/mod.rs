// Implementations of ReviewStore and ClinicStore.
//
// - `in_memory.rs` keeps everything in DashMaps (tests, demos)
// - `sqlite_store.rs` is the self-hosted backend
// - `supabase_store.rs` talks to the hosted REST backend

pub mod in_memory;
pub mod sqlite_store;
pub mod supabase_store;

pub use in_memory::InMemoryStore;
pub use sqlite_store::SqliteStore;
pub use supabase_store::{SupabaseClient, SupabaseRole, SupabaseStore};

use crate::core::clinics::{ClinicListing, ClinicStore, ClinicUpdateRequest, NewClinic};
use crate::core::reviews::{NewReviewRecord, ReviewStore};
use crate::core::submission::{RecordId, StoreError};
use async_trait::async_trait;

/// Whichever backend the configuration picked.
pub enum AnyStore {
    Sqlite(SqliteStore),
    Supabase(SupabaseStore),
}

#[async_trait]
impl ReviewStore for AnyStore {
    async fn insert_review(&self, record: NewReviewRecord) -> Result<RecordId, StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.insert_review(record).await,
            AnyStore::Supabase(store) => store.insert_review(record).await,
        }
    }
}

#[async_trait]
impl ClinicStore for AnyStore {
    async fn insert_clinic(&self, clinic: NewClinic) -> Result<RecordId, StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.insert_clinic(clinic).await,
            AnyStore::Supabase(store) => store.insert_clinic(clinic).await,
        }
    }

    async fn insert_clinic_update(
        &self,
        request: ClinicUpdateRequest,
    ) -> Result<RecordId, StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.insert_clinic_update(request).await,
            AnyStore::Supabase(store) => store.insert_clinic_update(request).await,
        }
    }

    async fn list_approved_clinics(&self) -> Result<Vec<ClinicListing>, StoreError> {
        match self {
            AnyStore::Sqlite(store) => store.list_approved_clinics().await,
            AnyStore::Supabase(store) => store.list_approved_clinics().await,
        }
    }
}
