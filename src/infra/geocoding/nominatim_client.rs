use crate::core::clinics::{AddressSuggestion, GeocodeError, Geocoder};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const RESULT_LIMIT: &str = "5";

/// Minimal OpenStreetMap Nominatim client for address lookups.
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub fn new(base_url: String, user_agent: &str) -> Result<Self, GeocodeError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_str(user_agent).map_err(|e| GeocodeError::Request(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_place(place: ApiPlace) -> Option<AddressSuggestion> {
        let latitude = place.lat.parse::<f64>().ok()?;
        let longitude = place.lon.parse::<f64>().ok()?;
        let address = place.address.unwrap_or_default();

        let name = place
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                place
                    .display_name
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            });

        let street = format!(
            "{} {}",
            address.house_number.unwrap_or_default(),
            address.road.unwrap_or_default()
        )
        .trim()
        .to_string();

        Some(AddressSuggestion {
            name,
            display_name: place.display_name,
            street,
            city: address
                .city
                .or(address.town)
                .or(address.village)
                .unwrap_or_default(),
            state: address.state.unwrap_or_default(),
            postal_code: address.postcode.unwrap_or_default(),
            country: address.country.unwrap_or_default(),
            latitude,
            longitude,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        let url = format!("{}/search", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("addressdetails", "1"),
                ("limit", RESULT_LIMIT),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GeocodeError::Status(resp.status().as_u16()));
        }

        let places: Vec<ApiPlace> = resp
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(e.to_string()))?;

        let total = places.len();
        let suggestions: Vec<_> = places.into_iter().filter_map(Self::map_place).collect();
        if suggestions.len() < total {
            tracing::debug!(
                "Dropped {} geocoder results with unparseable coordinates",
                total - suggestions.len()
            );
        }
        Ok(suggestions)
    }
}

#[derive(Debug, Deserialize)]
struct ApiPlace {
    name: Option<String>,
    display_name: String,
    lat: String,
    lon: String,
    address: Option<ApiAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}
