// In-memory implementation of ReviewStore and ClinicStore.
//
// Useful for tests and local demos: nothing survives a restart. DashMap lets
// concurrent submissions insert without a Mutex around the whole store.

use crate::core::clinics::{
    Clinic, ClinicListing, ClinicStore, ClinicUpdateRequest, NewClinic, PublishedReview,
    UPDATE_STATUS_PENDING,
};
use crate::core::reviews::{NewReviewRecord, ReviewStore};
use crate::core::submission::{RecordId, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct StoredReview {
    record: NewReviewRecord,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredClinic {
    clinic: NewClinic,
    is_approved: bool,
}

#[derive(Debug, Clone)]
struct StoredUpdate {
    request: ClinicUpdateRequest,
    status: String,
}

pub struct InMemoryStore {
    next_id: AtomicU64,
    reviews: DashMap<RecordId, StoredReview>,
    clinics: DashMap<RecordId, StoredClinic>,
    updates: DashMap<RecordId, StoredUpdate>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            reviews: DashMap::new(),
            clinics: DashMap::new(),
            updates: DashMap::new(),
        }
    }

    fn allocate_id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    /// Stored review row, if any.
    pub fn review(&self, id: &RecordId) -> Option<NewReviewRecord> {
        self.reviews.get(id).map(|r| r.record.clone())
    }

    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    /// Stand-in for a moderator approving or hiding a clinic.
    pub fn set_clinic_approval(&self, id: &RecordId, approved: bool) -> bool {
        match self.clinics.get_mut(id) {
            Some(mut clinic) => {
                clinic.is_approved = approved;
                true
            }
            None => false,
        }
    }

    pub fn update_status(&self, id: &RecordId) -> Option<String> {
        self.updates.get(id).map(|u| u.status.clone())
    }

    /// Update requests waiting on a moderator for one clinic.
    pub fn pending_updates(&self, clinic_id: &str) -> Vec<ClinicUpdateRequest> {
        self.updates
            .iter()
            .filter(|u| u.status == UPDATE_STATUS_PENDING && u.request.clinic_id == clinic_id)
            .map(|u| u.request.clone())
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn insert_review(&self, record: NewReviewRecord) -> Result<RecordId, StoreError> {
        let id = self.allocate_id();
        self.reviews.insert(
            id.clone(),
            StoredReview {
                record,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn insert_clinic(&self, clinic: NewClinic) -> Result<RecordId, StoreError> {
        let id = self.allocate_id();
        self.clinics.insert(
            id.clone(),
            StoredClinic {
                clinic,
                is_approved: false,
            },
        );
        Ok(id)
    }

    async fn insert_clinic_update(
        &self,
        request: ClinicUpdateRequest,
    ) -> Result<RecordId, StoreError> {
        let id = self.allocate_id();
        self.updates.insert(
            id.clone(),
            StoredUpdate {
                request,
                status: UPDATE_STATUS_PENDING.to_string(),
            },
        );
        Ok(id)
    }

    async fn list_approved_clinics(&self) -> Result<Vec<ClinicListing>, StoreError> {
        let mut listings: Vec<ClinicListing> = self
            .clinics
            .iter()
            .filter(|entry| entry.is_approved)
            .map(|entry| {
                let id = entry.key().clone();
                let stored = &entry.value().clinic;
                let reviews = self
                    .reviews
                    .iter()
                    .filter(|r| r.record.is_approved && r.record.clinic_id == id.0)
                    .map(|r| PublishedReview {
                        id: r.key().0.clone(),
                        overall_rating: r.record.overall_rating,
                        mentorship: r.record.mentorship,
                        hands_on: r.record.hands_on,
                        culture: r.record.culture,
                        volume: r.record.volume,
                        duration_weeks: Some(r.record.duration_weeks),
                        externship_year: Some(r.record.externship_year),
                        comment: Some(r.record.comment.clone()),
                        days_per_week: r.record.days_per_week,
                        hours_per_day: r.record.hours_per_day,
                        allows_surgery: r.record.allows_surgery,
                        provides_stipend: r.record.provides_stipend,
                        hosts_intern_residents: r.record.hosts_intern_residents,
                        open_to_years: r.record.open_to_years.clone(),
                        created_at: Some(r.created_at),
                    })
                    .collect();

                ClinicListing::new(
                    Clinic {
                        id: id.0,
                        name: stored.name.clone(),
                        address: Some(stored.address.clone()),
                        city: Some(stored.city.clone()),
                        state: Some(stored.state.clone()),
                        postal_code: Some(stored.postal_code.clone()),
                        country: Some(stored.country.clone()),
                        latitude: stored.latitude,
                        longitude: stored.longitude,
                        category: Some(stored.ownership_type.clone()),
                        website: stored.website.clone(),
                        specialties: stored.specialties.clone(),
                        animal_types: stored.animal_types.clone(),
                        provides_stipend: false,
                        allows_surgery: false,
                    },
                    reviews,
                )
            })
            .collect();

        listings.sort_by(|a, b| a.clinic.name.cmp(&b.clinic.name));
        Ok(listings)
    }
}
