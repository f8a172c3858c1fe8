// The core module contains all business logic.
// Each feature gets its own submodule. Nothing in here talks to the network
// or a database directly; it only depends on the port traits each feature
// declares, which the infra layer implements.

#[path = "submission.rs"]
pub mod submission;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "reviews/mod.rs"]
pub mod reviews;

#[path = "clinics/mod.rs"]
pub mod clinics;
