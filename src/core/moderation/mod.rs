// Core moderation module - decides whether a review comment is auto-published.
// Following the same pattern as the other core modules: models, a pure rule
// engine, and a service that depends on a port trait.

pub mod heuristics;
pub mod moderation_models;
pub mod moderation_service;

pub use heuristics::{evaluate, evaluate_with_rule, HeuristicRule};
pub use moderation_models::*;
pub use moderation_service::*;
