// Hosted backend store, talking to the Supabase REST (PostgREST) API.
//
// Two explicitly constructed client handles:
// - an anonymous client for public reads (row-level security applies)
// - a service-role client for writes, which bypasses row-level security so
//   the server can set is_approved
//
// Nothing here is global; bootstrap builds both and hands them in.

use crate::core::clinics::{
    sort_newest_first, Clinic, ClinicListing, ClinicStore, ClinicUpdateRequest, NewClinic,
    PublishedReview, UPDATE_STATUS_PENDING,
};
use crate::core::reviews::{NewReviewRecord, ReviewStore};
use crate::core::submission::{RecordId, StoreError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Which key a client was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupabaseRole {
    Anonymous,
    ServiceRole,
}

/// Thin PostgREST client bound to one API key.
pub struct SupabaseClient {
    http: Client,
    rest_url: String,
    role: SupabaseRole,
}

impl SupabaseClient {
    pub fn new(project_url: &str, api_key: &str, role: SupabaseRole) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).map_err(|e| StoreError::ConfigError(e.to_string()))?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| StoreError::ConfigError(e.to_string()))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            role,
        })
    }

    pub fn anonymous(project_url: &str, anon_key: &str) -> Result<Self, StoreError> {
        Self::new(project_url, anon_key, SupabaseRole::Anonymous)
    }

    pub fn service_role(project_url: &str, service_key: &str) -> Result<Self, StoreError> {
        Self::new(project_url, service_key, SupabaseRole::ServiceRole)
    }

    pub fn role(&self) -> SupabaseRole {
        self.role
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    /// Insert one row and return its id.
    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<RecordId, StoreError> {
        let resp = self
            .http
            .post(self.table_url(table))
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, body });
        }

        let rows: Vec<IdRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(|row| RecordId(row.id))
            .ok_or_else(|| StoreError::StorageError(format!("insert into {} returned no row", table)))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, StoreError> {
        let resp = self
            .http
            .get(self.table_url(table))
            .query(query)
            .send()
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, body });
        }

        resp.json()
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))
    }
}

/// ReviewStore + ClinicStore over the hosted backend.
pub struct SupabaseStore {
    reader: SupabaseClient,
    writer: SupabaseClient,
}

impl SupabaseStore {
    /// `writer` must hold the service-role key, otherwise the approval flag
    /// would be rejected by row-level security.
    pub fn new(reader: SupabaseClient, writer: SupabaseClient) -> Result<Self, StoreError> {
        if writer.role() != SupabaseRole::ServiceRole {
            return Err(StoreError::ConfigError(
                "writes require the service-role client".to_string(),
            ));
        }
        Ok(Self { reader, writer })
    }
}

#[async_trait]
impl ReviewStore for SupabaseStore {
    async fn insert_review(&self, record: NewReviewRecord) -> Result<RecordId, StoreError> {
        self.writer.insert("reviews", &record).await
    }
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn insert_clinic(&self, clinic: NewClinic) -> Result<RecordId, StoreError> {
        let row = ClinicInsertRow {
            clinic: &clinic,
            is_approved: false,
        };
        self.writer.insert("clinics", &row).await
    }

    async fn insert_clinic_update(
        &self,
        request: ClinicUpdateRequest,
    ) -> Result<RecordId, StoreError> {
        let row = UpdateInsertRow {
            request: &request,
            status: UPDATE_STATUS_PENDING,
        };
        self.writer.insert("clinic_updates", &row).await
    }

    async fn list_approved_clinics(&self) -> Result<Vec<ClinicListing>, StoreError> {
        let rows: Vec<ClinicRow> = self
            .reader
            .select(
                "clinics",
                &[("select", "*,reviews(*)"), ("is_approved", "eq.true")],
            )
            .await?;

        Ok(rows.into_iter().map(ClinicRow::into_listing).collect())
    }
}

#[derive(Serialize)]
struct ClinicInsertRow<'a> {
    #[serde(flatten)]
    clinic: &'a NewClinic,
    is_approved: bool,
}

#[derive(Serialize)]
struct UpdateInsertRow<'a> {
    #[serde(flatten)]
    request: &'a ClinicUpdateRequest,
    status: &'static str,
}

#[derive(Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "crate::core::clinics::clinic_models::deserialize_id")]
    id: String,
}

#[derive(Deserialize)]
struct ClinicRow {
    #[serde(flatten)]
    clinic: Clinic,
    #[serde(default)]
    reviews: Vec<ReviewRow>,
}

#[derive(Deserialize)]
struct ReviewRow {
    #[serde(flatten)]
    review: PublishedReview,
    #[serde(default)]
    is_approved: bool,
}

impl ClinicRow {
    /// Embedded reviews may include unapproved rows depending on the
    /// backend's policies, so filter here as well.
    fn into_listing(self) -> ClinicListing {
        let mut reviews: Vec<PublishedReview> = self
            .reviews
            .into_iter()
            .filter(|r| r.is_approved)
            .map(|r| r.review)
            .collect();
        sort_newest_first(&mut reviews);
        ClinicListing {
            clinic: self.clinic,
            reviews,
        }
    }
}
