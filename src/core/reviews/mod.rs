// Core reviews module - review submission and the record we persist for it.

pub mod review_models;
pub mod review_service;

pub use review_models::*;
pub use review_service::*;
