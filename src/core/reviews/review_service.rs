// Review service - moderate a submitted review and persist it.
//
// A review rejected by moderation is still a successful submission: it is
// stored with is_approved = false and waits for a moderator. Only
// infrastructure failures (the store write) surface as errors.

use super::review_models::{NewReviewRecord, ReviewReceipt, ReviewStatus, SubmittedReview};
use crate::core::moderation::{ModerationService, SafetyClassifier};
use crate::core::submission::{RecordId, StoreError, SubmissionResponse};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Message shown for any failure, whatever the cause.
pub const REVIEW_FAILURE_MESSAGE: &str = "Error submitting review.";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Invalid value for {field}: {value}")]
    InvalidNumber { field: &'static str, value: f64 },

    #[error("Failed to store review: {0}")]
    Storage(#[from] StoreError),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persists review rows.
///
/// Implementations must write with credentials that are allowed to set
/// `is_approved`; end users never get those.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert_review(&self, record: NewReviewRecord) -> Result<RecordId, StoreError>;
}

#[async_trait]
impl<S: ReviewStore + ?Sized> ReviewStore for Arc<S> {
    async fn insert_review(&self, record: NewReviewRecord) -> Result<RecordId, StoreError> {
        (**self).insert_review(record).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ReviewService<C: SafetyClassifier, S: ReviewStore> {
    moderation: ModerationService<C>,
    store: S,
}

impl<C: SafetyClassifier, S: ReviewStore> ReviewService<C, S> {
    pub fn new(moderation: ModerationService<C>, store: S) -> Self {
        Self { moderation, store }
    }

    /// Moderate and record one review.
    ///
    /// Resubmitting the same review creates a second record.
    pub async fn submit_review(
        &self,
        review: SubmittedReview,
    ) -> Result<ReviewReceipt, ReviewError> {
        validate_numbers(&review)?;

        let decision = self.moderation.moderate(&review.comment).await;
        let current_year = Utc::now().year();
        let record = NewReviewRecord::from_submission(review, &decision, current_year);

        let clinic_id = record.clinic_id.clone();
        let review_id = self.store.insert_review(record).await.map_err(|e| {
            tracing::error!("Failed to store review for clinic {}: {}", clinic_id, e);
            ReviewError::Storage(e)
        })?;

        let status = if decision.is_approved {
            ReviewStatus::Published
        } else {
            ReviewStatus::PendingVerification
        };

        tracing::info!(
            review_id = %review_id,
            clinic_id = %clinic_id,
            status = ?status,
            "Review recorded"
        );

        Ok(ReviewReceipt { review_id, status })
    }

    /// Same as `submit_review`, collapsed into the user-facing shape.
    pub async fn submit_review_response(&self, review: SubmittedReview) -> SubmissionResponse {
        review_response(&self.submit_review(review).await)
    }
}

/// Map a submission result to what the user sees.
pub fn review_response(result: &Result<ReviewReceipt, ReviewError>) -> SubmissionResponse {
    match result {
        Ok(receipt) => SubmissionResponse::ok(receipt.status.message()),
        Err(_) => SubmissionResponse::failed(REVIEW_FAILURE_MESSAGE),
    }
}

fn validate_numbers(review: &SubmittedReview) -> Result<(), ReviewError> {
    let fields = [
        ("overall_rating", review.overall_rating),
        ("mentorship", review.mentorship),
        ("hands_on", review.hands_on),
        ("culture", review.culture),
        ("volume", review.volume),
        ("duration_weeks", review.duration_weeks),
    ];

    let optional = [
        ("days_per_week", review.days_per_week),
        ("hours_per_day", review.hours_per_day),
    ];

    let mut all = fields
        .into_iter()
        .chain(optional.into_iter().filter_map(|(field, value)| value.map(|v| (field, v))));

    match all.find(|(_, value)| !value.is_finite()) {
        Some((field, value)) => Err(ReviewError::InvalidNumber { field, value }),
        None => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
