// Review domain models - what a student submits and what we store.
//
// The submitted form carries floats and a free-text year straight from the
// browser. NewReviewRecord is the normalized row: integer ratings, a real
// year, and the moderation outcome.

use crate::core::clinics::clinic_models::null_as_default;
use crate::core::moderation::ModerationDecision;
use crate::core::submission::RecordId;
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Raw review form as posted by an authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedReview {
    pub clinic_id: String,
    pub user_id: String,
    pub comment: String,
    pub overall_rating: f64,
    pub mentorship: f64,
    pub hands_on: f64,
    pub culture: f64,
    /// Caseload
    pub volume: f64,
    pub duration_weeks: f64,
    /// A number from the form, or free text; may be empty or junk
    #[serde(default, deserialize_with = "deserialize_year_field")]
    pub externship_year: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub days_per_week: Option<f64>,
    #[serde(default)]
    pub hours_per_day: Option<f64>,
    #[serde(default)]
    pub allows_surgery: Option<bool>,
    #[serde(default)]
    pub provides_stipend: Option<bool>,
    #[serde(default)]
    pub hosts_intern_residents: Option<bool>,
    /// Vet school years the clinic takes ("3rd Year", ...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub open_to_years: Vec<String>,
}

/// The review row handed to a ReviewStore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReviewRecord {
    pub clinic_id: String,
    pub user_id: String,
    pub overall_rating: i32,
    pub mentorship: i32,
    pub hands_on: i32,
    pub culture: i32,
    pub volume: i32,
    pub duration_weeks: i32,
    pub externship_year: i32,
    pub comment: String,
    pub service: Option<String>,
    pub days_per_week: Option<i32>,
    pub hours_per_day: Option<i32>,
    pub allows_surgery: Option<bool>,
    pub provides_stipend: Option<bool>,
    pub hosts_intern_residents: Option<bool>,
    pub open_to_years: Vec<String>,
    pub is_approved: bool,
    pub moderation_note: String,
}

impl NewReviewRecord {
    /// Build the persisted row from a submission and its moderation outcome.
    ///
    /// Ratings must already be known to be finite.
    pub fn from_submission(
        review: SubmittedReview,
        decision: &ModerationDecision,
        current_year: i32,
    ) -> Self {
        Self {
            overall_rating: round_rating(review.overall_rating),
            mentorship: round_rating(review.mentorship),
            hands_on: round_rating(review.hands_on),
            culture: round_rating(review.culture),
            volume: round_rating(review.volume),
            duration_weeks: round_count(review.duration_weeks),
            days_per_week: review.days_per_week.map(round_count),
            hours_per_day: review.hours_per_day.map(round_count),
            externship_year: parse_year(&review.externship_year, current_year),
            clinic_id: review.clinic_id,
            user_id: review.user_id,
            comment: review.comment,
            service: review.service,
            allows_surgery: review.allows_surgery,
            provides_stipend: review.provides_stipend,
            hosts_intern_residents: review.hosts_intern_residents,
            open_to_years: review.open_to_years,
            is_approved: decision.is_approved,
            moderation_note: decision.moderation_note.clone(),
        }
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReviewStatus {
    Published,
    PendingVerification,
}

impl ReviewStatus {
    pub fn message(&self) -> &'static str {
        match self {
            ReviewStatus::Published => "Review published!",
            ReviewStatus::PendingVerification => {
                "Review submitted. It will appear after manual verification."
            }
        }
    }
}

/// Returned when a review was recorded, approved or not.
/// Deliberately carries no rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewReceipt {
    pub review_id: RecordId,
    pub status: ReviewStatus,
}

/// Round half away from zero and clamp to the 1-5 scale.
pub fn round_rating(value: f64) -> i32 {
    (value.round() as i32).clamp(MIN_RATING, MAX_RATING)
}

/// Round to a whole count (weeks, days, hours), never negative.
pub fn round_count(value: f64) -> i32 {
    (value.round() as i32).max(0)
}

/// Parse the leading integer of a year field ("2024", " 2023 (spring)").
/// Missing, unparseable or non-positive values become `current_year`.
pub fn parse_year(raw: &str, current_year: i32) -> i32 {
    parse_leading_int(raw)
        .filter(|year| *year > 0)
        .unwrap_or(current_year)
}

/// The form sends the year as a number; older clients send a string.
fn deserialize_year_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        // Anything else is unparseable and falls back to the current year
        _ => String::new(),
    })
}

fn parse_leading_int(raw: &str) -> Option<i32> {
    let s = raw.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i32 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{ClassifierSignal, ModerationVerdict};

    fn sample_review() -> SubmittedReview {
        SubmittedReview {
            clinic_id: "clinic-1".to_string(),
            user_id: "user-1".to_string(),
            comment: "Great clinic, loved the mentorship here!".to_string(),
            overall_rating: 4.6,
            mentorship: 4.5,
            hands_on: 3.2,
            culture: 5.0,
            volume: 2.49,
            duration_weeks: 3.7,
            externship_year: "2023".to_string(),
            service: Some("Surgery".to_string()),
            days_per_week: Some(4.6),
            hours_per_day: Some(9.0),
            allows_surgery: Some(true),
            provides_stipend: Some(false),
            hosts_intern_residents: Some(true),
            open_to_years: vec!["3rd Year".to_string(), "4th Year".to_string()],
        }
    }

    #[test]
    fn test_record_rounds_ratings() {
        let decision =
            ModerationDecision::combine(ClassifierSignal::Clear, ModerationVerdict::safe());
        let record = NewReviewRecord::from_submission(sample_review(), &decision, 2030);

        assert_eq!(record.overall_rating, 5);
        assert_eq!(record.mentorship, 5);
        assert_eq!(record.hands_on, 3);
        assert_eq!(record.culture, 5);
        assert_eq!(record.volume, 2);
        assert_eq!(record.duration_weeks, 4);
        assert_eq!(record.externship_year, 2023);
        assert_eq!(record.days_per_week, Some(5));
        assert_eq!(record.hours_per_day, Some(9));
        assert_eq!(record.allows_surgery, Some(true));
        assert_eq!(record.provides_stipend, Some(false));
        assert_eq!(record.open_to_years, ["3rd Year", "4th Year"]);
        assert!(record.is_approved);
        assert_eq!(record.moderation_note, "Auto-Approved");
    }

    #[test]
    fn test_ratings_clamped_to_scale() {
        assert_eq!(round_rating(0.2), 1);
        assert_eq!(round_rating(-3.0), 1);
        assert_eq!(round_rating(9.0), 5);
        assert_eq!(round_count(-2.0), 0);
    }

    #[test]
    fn test_year_parsing() {
        assert_eq!(parse_year("2022", 2030), 2022);
        assert_eq!(parse_year("  2021 (spring)", 2030), 2021);
        assert_eq!(parse_year("not-a-number", 2030), 2030);
        assert_eq!(parse_year("", 2030), 2030);
        assert_eq!(parse_year("0", 2030), 2030);
        assert_eq!(parse_year("-5", 2030), 2030);
        assert_eq!(parse_year("99999999999", 2030), 2030);
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(ReviewStatus::Published.message(), "Review published!");
        assert!(ReviewStatus::PendingVerification
            .message()
            .contains("manual verification"));
    }

    #[test]
    fn test_submission_deserializes_with_optional_fields_missing() {
        let review: SubmittedReview = serde_json::from_value(serde_json::json!({
            "clinic_id": "c",
            "user_id": "u",
            "comment": "Great clinic, loved the mentorship here!",
            "overall_rating": 4,
            "mentorship": 4,
            "hands_on": 4,
            "culture": 4,
            "volume": 4,
            "duration_weeks": 2
        }))
        .unwrap();
        assert_eq!(review.externship_year, "");
        assert_eq!(review.service, None);
        assert!(review.open_to_years.is_empty());
    }

    #[test]
    fn test_numeric_year_from_form_is_accepted() {
        let review: SubmittedReview = serde_json::from_value(serde_json::json!({
            "clinic_id": "c",
            "user_id": "u",
            "comment": "Great clinic, loved the mentorship here!",
            "overall_rating": 5,
            "mentorship": 5,
            "hands_on": 5,
            "culture": 5,
            "volume": 5,
            "duration_weeks": 2,
            "externship_year": 2024
        }))
        .unwrap();
        assert_eq!(review.externship_year, "2024");
        assert_eq!(parse_year(&review.externship_year, 2030), 2024);

        let junk: SubmittedReview = serde_json::from_value(serde_json::json!({
            "clinic_id": "c", "user_id": "u", "comment": "x",
            "overall_rating": 5, "mentorship": 5, "hands_on": 5, "culture": 5,
            "volume": 5, "duration_weeks": 2, "externship_year": null
        }))
        .unwrap();
        assert_eq!(parse_year(&junk.externship_year, 2030), 2030);
    }

    #[test]
    fn test_logistics_fields_survive_into_record() {
        let review: SubmittedReview = serde_json::from_value(serde_json::json!({
            "clinic_id": "c",
            "user_id": "u",
            "comment": "Great clinic, loved the mentorship here!",
            "overall_rating": 5,
            "mentorship": 5,
            "hands_on": 5,
            "culture": 5,
            "volume": 5,
            "duration_weeks": 2,
            "externship_year": 2024,
            "days_per_week": 5,
            "hours_per_day": 9,
            "allows_surgery": true,
            "hosts_intern_residents": false,
            "provides_stipend": true,
            "open_to_years": ["3rd Year"]
        }))
        .unwrap();
        let decision =
            ModerationDecision::combine(ClassifierSignal::Clear, ModerationVerdict::safe());
        let record = NewReviewRecord::from_submission(review, &decision, 2030);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["days_per_week"], 5);
        assert_eq!(json["hours_per_day"], 9);
        assert_eq!(json["allows_surgery"], true);
        assert_eq!(json["provides_stipend"], true);
        assert_eq!(json["open_to_years"], serde_json::json!(["3rd Year"]));
    }
}
