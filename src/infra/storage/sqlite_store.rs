// SQLite-backed store for self-hosted deployments.
//
// Tables:
// - clinics: Submitted clinics (approved by a moderator out of band)
// - reviews: Moderated reviews with their approval flag and note
// - clinic_updates: Pending clinic correction requests
//
// There is no row-level security in SQLite; the server process is the only
// writer, which is what lets it set is_approved.

use crate::core::clinics::{
    Clinic, ClinicListing, ClinicStore, ClinicUpdateRequest, NewClinic, PublishedReview,
    UPDATE_STATUS_PENDING,
};
use crate::core::reviews::{NewReviewRecord, ReviewStore};
use crate::core::submission::{RecordId, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and migrate it.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        // Ensure the file exists if it's a file path
        let path_str = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::StorageError(e.to_string()))?;
            }
            std::fs::File::create(path_str).map_err(|e| StoreError::StorageError(e.to_string()))?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // An in-memory database lives only as long as its connection
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&conn_str)
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clinics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                address TEXT,
                city TEXT,
                state TEXT,
                postal_code TEXT,
                country TEXT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                category TEXT,
                website TEXT,
                specialties TEXT NOT NULL DEFAULT '[]',
                animal_types TEXT NOT NULL DEFAULT '[]',
                provides_stipend BOOLEAN NOT NULL DEFAULT 0,
                allows_surgery BOOLEAN NOT NULL DEFAULT 0,
                submitted_by TEXT NOT NULL,
                is_approved BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                clinic_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                overall_rating INTEGER NOT NULL,
                mentorship INTEGER NOT NULL,
                hands_on INTEGER NOT NULL,
                culture INTEGER NOT NULL,
                volume INTEGER NOT NULL,
                duration_weeks INTEGER NOT NULL,
                externship_year INTEGER NOT NULL,
                comment TEXT NOT NULL,
                service TEXT,
                days_per_week INTEGER,
                hours_per_day INTEGER,
                allows_surgery BOOLEAN,
                provides_stipend BOOLEAN,
                hosts_intern_residents BOOLEAN,
                open_to_years TEXT NOT NULL DEFAULT '[]',
                is_approved BOOLEAN NOT NULL DEFAULT 0,
                moderation_note TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reviews_clinic ON reviews(clinic_id, is_approved)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clinic_updates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                clinic_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                suggested_changes TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        Ok(())
    }

    fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
        value
            .as_deref()
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn parse_list(value: String) -> Vec<String> {
        serde_json::from_str(&value).unwrap_or_default()
    }

    async fn approved_reviews_by_clinic(
        &self,
    ) -> Result<HashMap<String, Vec<PublishedReview>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, clinic_id, overall_rating, mentorship, hands_on, culture, volume,
                   duration_weeks, externship_year, comment, days_per_week, hours_per_day,
                   allows_surgery, provides_stipend, hosts_intern_residents, open_to_years,
                   created_at
            FROM reviews
            WHERE is_approved = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        let mut by_clinic: HashMap<String, Vec<PublishedReview>> = HashMap::new();
        for row in rows {
            let clinic_id: String = row.get("clinic_id");
            let review = PublishedReview {
                id: row.get::<i64, _>("id").to_string(),
                overall_rating: row.get("overall_rating"),
                mentorship: row.get("mentorship"),
                hands_on: row.get("hands_on"),
                culture: row.get("culture"),
                volume: row.get("volume"),
                duration_weeks: row.get("duration_weeks"),
                externship_year: row.get("externship_year"),
                comment: row.get("comment"),
                days_per_week: row.get("days_per_week"),
                hours_per_day: row.get("hours_per_day"),
                allows_surgery: row.get("allows_surgery"),
                provides_stipend: row.get("provides_stipend"),
                hosts_intern_residents: row.get("hosts_intern_residents"),
                open_to_years: Self::parse_list(row.get("open_to_years")),
                created_at: Self::parse_timestamp(row.get("created_at")),
            };
            by_clinic.entry(clinic_id).or_default().push(review);
        }
        Ok(by_clinic)
    }
}

#[async_trait]
impl ReviewStore for SqliteStore {
    async fn insert_review(&self, record: NewReviewRecord) -> Result<RecordId, StoreError> {
        let open_to_years = serde_json::to_string(&record.open_to_years)
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO reviews (
                clinic_id, user_id, overall_rating, mentorship, hands_on, culture, volume,
                duration_weeks, externship_year, comment, service, days_per_week,
                hours_per_day, allows_surgery, provides_stipend, hosts_intern_residents,
                open_to_years, is_approved, moderation_note, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.clinic_id)
        .bind(&record.user_id)
        .bind(record.overall_rating)
        .bind(record.mentorship)
        .bind(record.hands_on)
        .bind(record.culture)
        .bind(record.volume)
        .bind(record.duration_weeks)
        .bind(record.externship_year)
        .bind(&record.comment)
        .bind(&record.service)
        .bind(record.days_per_week)
        .bind(record.hours_per_day)
        .bind(record.allows_surgery)
        .bind(record.provides_stipend)
        .bind(record.hosts_intern_residents)
        .bind(open_to_years)
        .bind(record.is_approved)
        .bind(&record.moderation_note)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        Ok(RecordId::from(result.last_insert_rowid()))
    }
}

#[async_trait]
impl ClinicStore for SqliteStore {
    async fn insert_clinic(&self, clinic: NewClinic) -> Result<RecordId, StoreError> {
        let specialties = serde_json::to_string(&clinic.specialties)
            .map_err(|e| StoreError::StorageError(e.to_string()))?;
        let animal_types = serde_json::to_string(&clinic.animal_types)
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO clinics (
                name, address, city, state, postal_code, country, latitude, longitude,
                category, website, specialties, animal_types, submitted_by, is_approved,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&clinic.name)
        .bind(&clinic.address)
        .bind(&clinic.city)
        .bind(&clinic.state)
        .bind(&clinic.postal_code)
        .bind(&clinic.country)
        .bind(clinic.latitude)
        .bind(clinic.longitude)
        .bind(&clinic.ownership_type)
        .bind(&clinic.website)
        .bind(specialties)
        .bind(animal_types)
        .bind(&clinic.submitted_by)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        Ok(RecordId::from(result.last_insert_rowid()))
    }

    async fn insert_clinic_update(
        &self,
        request: ClinicUpdateRequest,
    ) -> Result<RecordId, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO clinic_updates (clinic_id, user_id, suggested_changes, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.clinic_id)
        .bind(&request.user_id)
        .bind(&request.suggested_changes)
        .bind(UPDATE_STATUS_PENDING)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StorageError(e.to_string()))?;

        Ok(RecordId::from(result.last_insert_rowid()))
    }

    async fn list_approved_clinics(&self) -> Result<Vec<ClinicListing>, StoreError> {
        let rows = sqlx::query("SELECT * FROM clinics WHERE is_approved = 1 ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))?;

        let mut reviews = self.approved_reviews_by_clinic().await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get::<i64, _>("id").to_string();
            let clinic_reviews = reviews.remove(&id).unwrap_or_default();

            let clinic = Clinic {
                id,
                name: row.get("name"),
                address: row.get("address"),
                city: row.get("city"),
                state: row.get("state"),
                postal_code: row.get("postal_code"),
                country: row.get("country"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                category: row.get("category"),
                website: row.get("website"),
                specialties: Self::parse_list(row.get("specialties")),
                animal_types: Self::parse_list(row.get("animal_types")),
                provides_stipend: row.get("provides_stipend"),
                allows_surgery: row.get("allows_surgery"),
            };
            listings.push(ClinicListing::new(clinic, clinic_reviews));
        }

        Ok(listings)
    }
}
