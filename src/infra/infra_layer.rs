// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "geocoding/mod.rs"]
pub mod geocoding;

#[path = "storage/mod.rs"]
pub mod storage;
