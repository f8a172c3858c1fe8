// Clinic domain models.
//
// Clinics and update suggestions always enter the system unapproved; only a
// moderator (outside this crate) can publish them. The listing types describe
// what the map shows once they are published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status every clinic update suggestion starts in.
pub const UPDATE_STATUS_PENDING: &str = "pending";

/// A clinic as it appears on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Ownership type ("Private Practice", "Corporate", ...)
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specialties: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub animal_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provides_stipend: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allows_surgery: bool,
}

/// An approved review as shown under a clinic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedReview {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub overall_rating: i32,
    pub mentorship: i32,
    pub hands_on: i32,
    pub culture: i32,
    pub volume: i32,
    #[serde(default)]
    pub duration_weeks: Option<i32>,
    #[serde(default)]
    pub externship_year: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub days_per_week: Option<i32>,
    #[serde(default)]
    pub hours_per_day: Option<i32>,
    #[serde(default)]
    pub allows_surgery: Option<bool>,
    #[serde(default)]
    pub provides_stipend: Option<bool>,
    #[serde(default)]
    pub hosts_intern_residents: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub open_to_years: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A published clinic together with its approved reviews, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicListing {
    pub clinic: Clinic,
    pub reviews: Vec<PublishedReview>,
}

impl ClinicListing {
    pub fn new(clinic: Clinic, mut reviews: Vec<PublishedReview>) -> Self {
        sort_newest_first(&mut reviews);
        Self { clinic, reviews }
    }

    pub fn scorecard(&self) -> Option<Scorecard> {
        Scorecard::from_reviews(&self.reviews)
    }

    /// True if any review says the clinic takes students in `year`.
    pub fn open_to_year(&self, year: &str) -> bool {
        self.reviews
            .iter()
            .any(|r| r.open_to_years.iter().any(|y| y == year))
    }

    pub fn hosts_intern_residents(&self) -> bool {
        self.reviews
            .iter()
            .any(|r| r.hosts_intern_residents == Some(true))
    }
}

/// Reviews without a timestamp sink to the bottom.
pub fn sort_newest_first(reviews: &mut [PublishedReview]) {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Average sub-ratings for one clinic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub review_count: usize,
    pub overall: f64,
    pub mentorship: f64,
    pub hands_on: f64,
    pub culture: f64,
    pub volume: f64,
}

impl Scorecard {
    /// `None` when there is nothing to average.
    pub fn from_reviews(reviews: &[PublishedReview]) -> Option<Self> {
        if reviews.is_empty() {
            return None;
        }
        let n = reviews.len() as f64;
        let avg = |f: fn(&PublishedReview) -> i32| reviews.iter().map(|r| f(r) as f64).sum::<f64>() / n;

        Some(Self {
            review_count: reviews.len(),
            overall: avg(|r| r.overall_rating),
            mentorship: avg(|r| r.mentorship),
            hands_on: avg(|r| r.hands_on),
            culture: avg(|r| r.culture),
            volume: avg(|r| r.volume),
        })
    }

    /// One decimal place, or "N/A" with no reviews.
    pub fn display(score: Option<f64>) -> String {
        match score {
            Some(value) => format!("{:.1}", value),
            None => "N/A".to_string(),
        }
    }
}

/// Search and attribute filters for the clinic list.
/// `None` location fields mean "All".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClinicFilter {
    pub search: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub animal_type: Option<String>,
    pub stipend_only: bool,
    pub surgery_only: bool,
    pub interns_only: bool,
}

impl ClinicFilter {
    pub fn matches(&self, listing: &ClinicListing) -> bool {
        let clinic = &listing.clinic;

        let matches_search = clinic
            .name
            .to_lowercase()
            .contains(&self.search.trim().to_lowercase());

        let matches_location = field_matches(&self.country, &clinic.country)
            && field_matches(&self.state, &clinic.state)
            && field_matches(&self.city, &clinic.city);

        let matches_animal = match &self.animal_type {
            Some(animal) => clinic.animal_types.iter().any(|a| a == animal),
            None => true,
        };

        let matches_logistics = (!self.stipend_only || clinic.provides_stipend)
            && (!self.surgery_only || clinic.allows_surgery)
            && (!self.interns_only || listing.hosts_intern_residents());

        matches_search && matches_location && matches_animal && matches_logistics
    }

    pub fn apply(&self, listings: Vec<ClinicListing>) -> Vec<ClinicListing> {
        listings.into_iter().filter(|l| self.matches(l)).collect()
    }
}

fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
        None => true,
    }
}

/// A new clinic suggested by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClinic {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "category")]
    pub ownership_type: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub animal_types: Vec<String>,
    pub submitted_by: String,
}

impl NewClinic {
    /// Prefill a clinic from a picked geocoder suggestion.
    pub fn from_suggestion(suggestion: &AddressSuggestion, submitted_by: impl Into<String>) -> Self {
        Self {
            name: suggestion.name.clone(),
            address: suggestion.street.clone(),
            city: suggestion.city.clone(),
            state: suggestion.state.clone(),
            postal_code: suggestion.postal_code.clone(),
            country: suggestion.country.clone(),
            latitude: suggestion.latitude,
            longitude: suggestion.longitude,
            ownership_type: "Private Practice".to_string(),
            website: None,
            specialties: Vec::new(),
            animal_types: Vec::new(),
            submitted_by: submitted_by.into(),
        }
    }
}

/// A user's free-text request to correct a clinic's details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicUpdateRequest {
    pub clinic_id: String,
    pub user_id: String,
    pub suggested_changes: String,
}

/// One geocoder candidate, already mapped into clinic address fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressSuggestion {
    pub name: String,
    pub display_name: String,
    /// House number and road
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Ids come back as integers from SQLite and as UUID strings from the
/// hosted backend.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected id value: {}", other))),
    }
}

/// Nullable columns that we'd rather treat as empty.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
