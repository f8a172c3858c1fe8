// Moderation domain models - data structures for the review moderation pipeline.
//
// These are pure domain types with no HTTP or database dependencies.
// Only `is_approved` and `moderation_note` from a ModerationDecision ever get
// persisted; the verdict and signal are per-submission and thrown away.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Note stored when both signals are clean.
pub const NOTE_AUTO_APPROVED: &str = "Auto-Approved";
/// Note stored when the remote classifier flagged the comment.
pub const NOTE_AI_FLAGGED: &str = "Flagged by AI safety classifier";
/// Note stored when the classifier could not be reached in time.
pub const NOTE_CLASSIFIER_UNAVAILABLE: &str = "Classifier unavailable, pending manual review";

/// Output of the local heuristic evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub safe: bool,
    pub reason: Option<String>,
}

impl ModerationVerdict {
    /// Create a "passed every rule" verdict
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    /// Create a rejection verdict
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }
}

/// Raw answer from a classifier backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassifierResponse {
    /// `None` when the response parsed but had no usable flag.
    pub flagged: Option<bool>,
}

impl ClassifierResponse {
    pub fn flagged(flagged: bool) -> Self {
        Self {
            flagged: Some(flagged),
        }
    }
}

/// What the classifier step contributes to the final decision, after the
/// call policy (timeouts, retries, malformed handling) has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierSignal {
    /// Classifier answered and did not flag the text
    Clear,
    /// Classifier flagged the text
    Flagged,
    /// Classifier could not give a usable answer; route to manual review
    Unavailable,
}

/// How to treat a response that is missing the flagged field or can't be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Treat as not flagged. Known risk: a schema change upstream silently
    /// turns the classifier off.
    #[default]
    FailOpen,
    /// Treat as unavailable, so the review waits for a moderator.
    ManualReview,
}

impl FromStr for MalformedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "fail-open" => Ok(MalformedPolicy::FailOpen),
            "manual_review" | "manual-review" => Ok(MalformedPolicy::ManualReview),
            other => Err(format!("unknown malformed policy '{}'", other)),
        }
    }
}

/// Timeout and retry settings for the remote classifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierPolicy {
    /// Upper bound on a single attempt
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
    pub malformed: MalformedPolicy,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            initial_backoff: Duration::from_millis(250),
            malformed: MalformedPolicy::FailOpen,
        }
    }
}

/// Combined outcome for one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationDecision {
    pub is_approved: bool,
    pub moderation_note: String,
    pub signal: ClassifierSignal,
    pub verdict: ModerationVerdict,
}

impl ModerationDecision {
    /// Combine the classifier signal and heuristic verdict.
    ///
    /// Approved only when the classifier is clear AND every heuristic passed.
    /// Note precedence: flagged, heuristic reason, unavailable, auto-approved.
    pub fn combine(signal: ClassifierSignal, verdict: ModerationVerdict) -> Self {
        let is_approved = signal == ClassifierSignal::Clear && verdict.safe;

        let moderation_note = match (signal, verdict.reason.as_deref()) {
            (ClassifierSignal::Flagged, _) => NOTE_AI_FLAGGED.to_string(),
            (_, Some(reason)) if !verdict.safe => reason.to_string(),
            (ClassifierSignal::Unavailable, _) => NOTE_CLASSIFIER_UNAVAILABLE.to_string(),
            _ => NOTE_AUTO_APPROVED.to_string(),
        };

        Self {
            is_approved,
            moderation_note,
            signal,
            verdict,
        }
    }
}
