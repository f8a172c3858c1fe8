// Clinic service - new-clinic submissions, update suggestions, and the
// published clinic list.
//
// There is no automatic moderation here: everything written goes in as
// unapproved/pending and a moderator decides.

use super::clinic_models::{AddressSuggestion, ClinicFilter, ClinicListing, ClinicUpdateRequest, NewClinic};
use crate::core::submission::{RecordId, StoreError, SubmissionResponse};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Geocoder queries shorter than this are not worth sending.
pub const MIN_ADDRESS_QUERY_CHARS: usize = 4;

pub const CLINIC_SUBMITTED_MESSAGE: &str = "Clinic submitted for verification!";
pub const CLINIC_FAILURE_MESSAGE: &str = "Failed to submit clinic.";
pub const UPDATE_SENT_MESSAGE: &str = "Request sent! A moderator will verify these changes.";
pub const UPDATE_FAILURE_MESSAGE: &str = "Failed to send request.";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to store clinic data: {0}")]
    Storage(#[from] StoreError),

    #[error("Geocoding failed: {0}")]
    Geocoding(#[from] GeocodeError),
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoder request failed: {0}")]
    Request(String),

    #[error("Geocoder returned {0}")]
    Status(u16),

    #[error("Geocoder response could not be parsed: {0}")]
    Parse(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// Persists clinic submissions and serves the published list.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    /// Insert a clinic with `is_approved = false`.
    async fn insert_clinic(&self, clinic: NewClinic) -> Result<RecordId, StoreError>;

    /// Insert an update suggestion with status "pending".
    async fn insert_clinic_update(&self, request: ClinicUpdateRequest)
        -> Result<RecordId, StoreError>;

    /// Approved clinics with their approved reviews, newest review first.
    async fn list_approved_clinics(&self) -> Result<Vec<ClinicListing>, StoreError>;
}

#[async_trait]
impl<S: ClinicStore + ?Sized> ClinicStore for Arc<S> {
    async fn insert_clinic(&self, clinic: NewClinic) -> Result<RecordId, StoreError> {
        (**self).insert_clinic(clinic).await
    }

    async fn insert_clinic_update(
        &self,
        request: ClinicUpdateRequest,
    ) -> Result<RecordId, StoreError> {
        (**self).insert_clinic_update(request).await
    }

    async fn list_approved_clinics(&self) -> Result<Vec<ClinicListing>, StoreError> {
        (**self).list_approved_clinics().await
    }
}

/// Free-text address search.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeocodeError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ClinicService<S: ClinicStore, G: Geocoder> {
    store: S,
    geocoder: G,
}

impl<S: ClinicStore, G: Geocoder> ClinicService<S, G> {
    pub fn new(store: S, geocoder: G) -> Self {
        Self { store, geocoder }
    }

    /// Submit a new clinic for verification.
    pub async fn submit_clinic(&self, clinic: NewClinic) -> Result<RecordId, ClinicError> {
        if clinic.submitted_by.trim().is_empty() {
            return Err(ClinicError::Validation(
                "You must be signed in to add a clinic.".to_string(),
            ));
        }
        if clinic.name.trim().is_empty() || clinic.latitude == 0.0 {
            return Err(ClinicError::Validation(
                "Please select a valid address first.".to_string(),
            ));
        }

        let name = clinic.name.clone();
        let id = self.store.insert_clinic(clinic).await.map_err(|e| {
            tracing::error!("Failed to store clinic '{}': {}", name, e);
            ClinicError::Storage(e)
        })?;

        tracing::info!(clinic_id = %id, "Clinic submitted for verification");
        Ok(id)
    }

    /// Record a user's suggested correction for an existing clinic.
    pub async fn suggest_update(
        &self,
        request: ClinicUpdateRequest,
    ) -> Result<RecordId, ClinicError> {
        if request.suggested_changes.trim().is_empty() {
            return Err(ClinicError::Validation(
                "Please describe the changes.".to_string(),
            ));
        }

        let clinic_id = request.clinic_id.clone();
        let id = self.store.insert_clinic_update(request).await.map_err(|e| {
            tracing::error!("Update Request Error for clinic {}: {}", clinic_id, e);
            ClinicError::Storage(e)
        })?;

        tracing::info!(update_id = %id, clinic_id = %clinic_id, "Clinic update suggested");
        Ok(id)
    }

    /// Published clinics that pass the filter.
    pub async fn list_clinics(&self, filter: &ClinicFilter) -> Result<Vec<ClinicListing>, ClinicError> {
        let listings = self.store.list_approved_clinics().await?;
        Ok(filter.apply(listings))
    }

    /// Candidate addresses for the "add clinic" form.
    pub async fn suggest_addresses(&self, query: &str) -> Result<Vec<AddressSuggestion>, ClinicError> {
        let query = query.trim();
        if query.chars().count() < MIN_ADDRESS_QUERY_CHARS {
            return Ok(Vec::new());
        }
        Ok(self.geocoder.search(query).await?)
    }
}

/// User-facing shape for a clinic submission.
pub fn clinic_response(result: &Result<RecordId, ClinicError>) -> SubmissionResponse {
    match result {
        Ok(_) => SubmissionResponse::ok(CLINIC_SUBMITTED_MESSAGE),
        Err(ClinicError::Validation(msg)) => SubmissionResponse::failed(msg.clone()),
        Err(_) => SubmissionResponse::failed(CLINIC_FAILURE_MESSAGE),
    }
}

/// User-facing shape for an update suggestion.
pub fn update_response(result: &Result<RecordId, ClinicError>) -> SubmissionResponse {
    match result {
        Ok(_) => SubmissionResponse::ok(UPDATE_SENT_MESSAGE),
        Err(ClinicError::Validation(msg)) => SubmissionResponse::failed(msg.clone()),
        Err(_) => SubmissionResponse::failed(UPDATE_FAILURE_MESSAGE),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clinics::clinic_models::UPDATE_STATUS_PENDING;
    use crate::infra::storage::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Geocoder that returns one fixed suggestion and counts calls.
    struct StubGeocoder {
        calls: AtomicUsize,
    }

    impl StubGeocoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn search(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![AddressSuggestion {
                name: query.to_string(),
                display_name: format!("{}, Davis, California", query),
                street: "1 Garrod Dr".to_string(),
                city: "Davis".to_string(),
                state: "California".to_string(),
                postal_code: "95616".to_string(),
                country: "United States".to_string(),
                latitude: 38.53,
                longitude: -121.76,
            }])
        }
    }

    fn new_clinic(user: &str) -> NewClinic {
        NewClinic {
            name: "Davis Large Animal Clinic".to_string(),
            address: "1 Garrod Dr".to_string(),
            city: "Davis".to_string(),
            state: "California".to_string(),
            postal_code: "95616".to_string(),
            country: "United States".to_string(),
            latitude: 38.53,
            longitude: -121.76,
            ownership_type: "University".to_string(),
            website: None,
            specialties: vec!["Large Animal".to_string()],
            animal_types: vec!["Equine".to_string()],
            submitted_by: user.to_string(),
        }
    }

    fn service() -> (ClinicService<Arc<InMemoryStore>, StubGeocoder>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (ClinicService::new(store.clone(), StubGeocoder::new()), store)
    }

    #[tokio::test]
    async fn test_submitted_clinic_is_not_listed_until_approved() {
        let (service, store) = service();

        let id = service.submit_clinic(new_clinic("user-1")).await.unwrap();

        let listed = service.list_clinics(&ClinicFilter::default()).await.unwrap();
        assert!(listed.is_empty());

        store.set_clinic_approval(&id, true);
        let listed = service.list_clinics(&ClinicFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].clinic.name, "Davis Large Animal Clinic");
    }

    #[tokio::test]
    async fn test_clinic_requires_address_and_user() {
        let (service, _store) = service();

        let mut missing_coords = new_clinic("user-1");
        missing_coords.latitude = 0.0;
        let result = service.submit_clinic(missing_coords).await;
        assert_eq!(
            clinic_response(&result),
            SubmissionResponse::failed("Please select a valid address first.")
        );

        let result = service.submit_clinic(new_clinic("  ")).await;
        assert!(matches!(result, Err(ClinicError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_suggestion_is_pending() {
        let (service, store) = service();

        let result = service
            .suggest_update(ClinicUpdateRequest {
                clinic_id: "clinic-1".to_string(),
                user_id: "user-1".to_string(),
                suggested_changes: "Phone number changed to 555-0100".to_string(),
            })
            .await;

        assert_eq!(update_response(&result), SubmissionResponse::ok(UPDATE_SENT_MESSAGE));
        let id = result.unwrap();
        assert_eq!(store.update_status(&id).as_deref(), Some(UPDATE_STATUS_PENDING));
        assert_eq!(
            store.pending_updates("clinic-1")[0].suggested_changes,
            "Phone number changed to 555-0100"
        );
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let (service, _store) = service();

        let result = service
            .suggest_update(ClinicUpdateRequest {
                clinic_id: "clinic-1".to_string(),
                user_id: "user-1".to_string(),
                suggested_changes: "   ".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ClinicError::Validation(_))));
    }

    #[tokio::test]
    async fn test_short_address_query_skips_geocoder() {
        let (service, _store) = service();

        let suggestions = service.suggest_addresses(" 1 G ").await.unwrap();
        assert!(suggestions.is_empty());
        assert_eq!(service.geocoder.calls.load(Ordering::SeqCst), 0);

        let suggestions = service.suggest_addresses("1 Garrod Dr").await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(service.geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_storage_failure_message_is_generic() {
        let result: Result<RecordId, ClinicError> =
            Err(StoreError::StorageError("connection refused".to_string()).into());
        assert_eq!(update_response(&result), SubmissionResponse::failed(UPDATE_FAILURE_MESSAGE));
        assert_eq!(clinic_response(&result), SubmissionResponse::failed(CLINIC_FAILURE_MESSAGE));
    }
}
