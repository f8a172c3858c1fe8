// Core clinics module - clinic submissions, update suggestions, and the
// published clinic listing with its scorecards and filters.

pub mod clinic_models;
pub mod clinic_service;

pub use clinic_models::*;
pub use clinic_service::*;
