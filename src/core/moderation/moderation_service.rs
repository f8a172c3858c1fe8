// Moderation service - core business logic for deciding review approval.
//
// This service handles:
// - Calling the remote safety classifier (with timeout + retry)
// - Running the local heuristic rules
// - Combining both into an approval flag and a moderation note
//
// NO HTTP dependencies here - the classifier is a port implemented in infra.

use super::heuristics;
use super::moderation_models::{
    ClassifierPolicy, ClassifierResponse, ClassifierSignal, MalformedPolicy, ModerationDecision,
};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier transport error: {0}")]
    Transport(String),

    #[error("Classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Classifier response could not be parsed: {0}")]
    Malformed(String),

    #[error("Classifier did not answer within {0:?}")]
    Timeout(Duration),
}

impl ClassifierError {
    /// Whether another attempt could succeed. Client errors (bad key, bad
    /// request) won't change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifierError::Transport(_) | ClassifierError::Timeout(_) => true,
            ClassifierError::Status { status, .. } => *status == 429 || *status >= 500,
            ClassifierError::Malformed(_) => false,
        }
    }
}

// ============================================================================
// CLASSIFIER TRAIT (PORT)
// ============================================================================

/// A remote content-safety classifier.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    /// Submit raw comment text and report whether it was flagged.
    async fn classify(&self, text: &str) -> Result<ClassifierResponse, ClassifierError>;
}

#[async_trait]
impl<C: SafetyClassifier + ?Sized> SafetyClassifier for Arc<C> {
    async fn classify(&self, text: &str) -> Result<ClassifierResponse, ClassifierError> {
        (**self).classify(text).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Runs the full moderation pipeline for one comment.
pub struct ModerationService<C: SafetyClassifier> {
    classifier: C,
    policy: ClassifierPolicy,
}

impl<C: SafetyClassifier> ModerationService<C> {
    /// Create a new moderation service with the given classifier.
    pub fn new(classifier: C, policy: ClassifierPolicy) -> Self {
        Self { classifier, policy }
    }

    /// Moderate a comment. Never fails: classifier trouble becomes
    /// `ClassifierSignal::Unavailable`, which sends the review to a human.
    pub async fn moderate(&self, text: &str) -> ModerationDecision {
        let signal = self.classify_with_policy(text).await;
        let verdict = heuristics::evaluate(text);
        let decision = ModerationDecision::combine(signal, verdict);

        tracing::info!(
            approved = decision.is_approved,
            signal = ?decision.signal,
            note = %decision.moderation_note,
            chars = text.chars().count(),
            "Moderated review comment"
        );

        decision
    }

    /// Call the classifier, applying timeout, retry and malformed handling.
    async fn classify_with_policy(&self, text: &str) -> ClassifierSignal {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            let result = match tokio::time::timeout(self.policy.timeout, self.classifier.classify(text))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(ClassifierResponse { flagged: Some(true) }) => return ClassifierSignal::Flagged,
                Ok(ClassifierResponse {
                    flagged: Some(false),
                }) => return ClassifierSignal::Clear,
                Ok(ClassifierResponse { flagged: None }) => {
                    return self.on_malformed("response carried no flagged field");
                }
                Err(ClassifierError::Malformed(detail)) => return self.on_malformed(&detail),
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = with_jitter(backoff);
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %err,
                        "Classifier call failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        attempts = attempt + 1,
                        error = %err,
                        "Classifier unavailable, routing review to manual verification"
                    );
                    return ClassifierSignal::Unavailable;
                }
            }
        }
    }

    fn on_malformed(&self, detail: &str) -> ClassifierSignal {
        match self.policy.malformed {
            MalformedPolicy::FailOpen => {
                tracing::warn!("Malformed classifier response ({}), treating as not flagged", detail);
                ClassifierSignal::Clear
            }
            MalformedPolicy::ManualReview => {
                tracing::warn!("Malformed classifier response ({}), sending to manual review", detail);
                ClassifierSignal::Unavailable
            }
        }
    }
}

/// Add up to 25% random jitter so retries from parallel requests spread out.
fn with_jitter(base: Duration) -> Duration {
    let max_extra = (base.as_millis() / 4) as u64;
    if max_extra == 0 {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0..=max_extra);
    base + Duration::from_millis(extra)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_models::{
        NOTE_AI_FLAGGED, NOTE_AUTO_APPROVED, NOTE_CLASSIFIER_UNAVAILABLE,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const GOOD_COMMENT: &str = "Great clinic, loved the mentorship here!";

    /// Classifier that replays a fixed script of answers.
    /// Once the script runs out it keeps returning the last entry.
    struct ScriptedClassifier {
        script: Mutex<VecDeque<Result<ClassifierResponse, String>>>,
        last: Mutex<Option<Result<ClassifierResponse, String>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        fn new(script: Vec<Result<ClassifierResponse, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn answering(flagged: Option<bool>) -> Self {
            Self::new(vec![Ok(ClassifierResponse { flagged })])
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::answering(Some(false))
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SafetyClassifier for ScriptedClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassifierResponse, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let next = {
                let mut script = self.script.lock().unwrap();
                let mut last = self.last.lock().unwrap();
                match script.pop_front() {
                    Some(entry) => {
                        *last = Some(entry.clone());
                        entry
                    }
                    None => last.clone().expect("script must not be empty"),
                }
            };

            next.map_err(|msg| {
                if msg == "malformed" {
                    ClassifierError::Malformed(msg)
                } else if let Some(code) = msg.strip_prefix("status ") {
                    ClassifierError::Status {
                        status: code.parse().unwrap(),
                        body: String::new(),
                    }
                } else {
                    ClassifierError::Transport(msg)
                }
            })
        }
    }

    fn fast_policy() -> ClassifierPolicy {
        ClassifierPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            malformed: MalformedPolicy::FailOpen,
        }
    }

    #[tokio::test]
    async fn test_clean_comment_is_auto_approved() {
        let service = ModerationService::new(ScriptedClassifier::answering(Some(false)), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert!(decision.is_approved);
        assert_eq!(decision.moderation_note, NOTE_AUTO_APPROVED);
        assert_eq!(decision.signal, ClassifierSignal::Clear);
    }

    #[tokio::test]
    async fn test_flagged_comment_never_approved() {
        let service = ModerationService::new(ScriptedClassifier::answering(Some(true)), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert!(!decision.is_approved);
        assert_eq!(decision.moderation_note, NOTE_AI_FLAGGED);
    }

    #[tokio::test]
    async fn test_heuristic_failure_blocks_approval() {
        let service = ModerationService::new(ScriptedClassifier::answering(Some(false)), fast_policy());

        let decision = service.moderate("asdkjasldkjaslkdjaslkdj").await;

        assert!(!decision.is_approved);
        assert_eq!(decision.moderation_note, "Keyboard mash (long word)");
    }

    #[tokio::test]
    async fn test_profanity_rejected_regardless_of_classifier() {
        let service = ModerationService::new(ScriptedClassifier::answering(Some(false)), fast_policy());

        let decision = service
            .moderate("Honestly fuck this clinic and the way they treat students")
            .await;

        assert!(!decision.is_approved);
        assert_eq!(decision.moderation_note, "Profanity detected");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let classifier = Arc::new(ScriptedClassifier::new(vec![
            Err("connection reset".to_string()),
            Ok(ClassifierResponse::flagged(false)),
        ]));
        let service = ModerationService::new(classifier.clone(), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert!(decision.is_approved);
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_persistent_failure_routes_to_manual_review() {
        let classifier = Arc::new(ScriptedClassifier::new(vec![Err("503".to_string())]));
        let service = ModerationService::new(classifier.clone(), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert!(!decision.is_approved);
        assert_eq!(decision.signal, ClassifierSignal::Unavailable);
        assert_eq!(decision.moderation_note, NOTE_CLASSIFIER_UNAVAILABLE);
        // one attempt + one retry
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_server_errors_and_rate_limits_are_retried() {
        for code in ["status 503", "status 429"] {
            let classifier = Arc::new(ScriptedClassifier::new(vec![
                Err(code.to_string()),
                Ok(ClassifierResponse::flagged(false)),
            ]));
            let service = ModerationService::new(classifier.clone(), fast_policy());

            let decision = service.moderate(GOOD_COMMENT).await;

            assert!(decision.is_approved, "{} should be retried", code);
            assert_eq!(classifier.calls(), 2);
        }
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        for code in ["status 401", "status 400"] {
            let classifier = Arc::new(ScriptedClassifier::new(vec![
                Err(code.to_string()),
                Ok(ClassifierResponse::flagged(false)),
            ]));
            let service = ModerationService::new(classifier.clone(), fast_policy());

            let decision = service.moderate(GOOD_COMMENT).await;

            assert_eq!(decision.signal, ClassifierSignal::Unavailable);
            assert!(!decision.is_approved);
            assert_eq!(classifier.calls(), 1, "{} must not be retried", code);
        }
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ClassifierError::Transport("reset".to_string()).is_retryable());
        assert!(ClassifierError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ClassifierError::Status { status: 502, body: String::new() }.is_retryable());
        assert!(!ClassifierError::Status { status: 403, body: String::new() }.is_retryable());
        assert!(!ClassifierError::Malformed("eof".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_slow_classifier_times_out() {
        let classifier = Arc::new(ScriptedClassifier::slow(Duration::from_millis(500)));
        let service = ModerationService::new(classifier.clone(), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert_eq!(decision.signal, ClassifierSignal::Unavailable);
        assert!(!decision.is_approved);
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_flag_fails_open_by_default() {
        let service = ModerationService::new(ScriptedClassifier::answering(None), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert_eq!(decision.signal, ClassifierSignal::Clear);
        assert!(decision.is_approved);
    }

    #[tokio::test]
    async fn test_missing_flag_can_require_manual_review() {
        let policy = ClassifierPolicy {
            malformed: MalformedPolicy::ManualReview,
            ..fast_policy()
        };
        let service = ModerationService::new(ScriptedClassifier::answering(None), policy);

        let decision = service.moderate(GOOD_COMMENT).await;

        assert_eq!(decision.signal, ClassifierSignal::Unavailable);
        assert!(!decision.is_approved);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retried() {
        let classifier = Arc::new(ScriptedClassifier::new(vec![Err("malformed".to_string())]));
        let service = ModerationService::new(classifier.clone(), fast_policy());

        let decision = service.moderate(GOOD_COMMENT).await;

        assert_eq!(decision.signal, ClassifierSignal::Clear);
        assert_eq!(classifier.calls(), 1);
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let base = Duration::from_millis(400);
        for _ in 0..50 {
            let delay = with_jitter(base);
            assert!(delay >= base && delay <= Duration::from_millis(500));
        }
        assert_eq!(with_jitter(Duration::from_millis(2)), Duration::from_millis(2));
    }
}
