//! Drafts awaiting an admin decision.

pub mod model;
pub mod store;

pub use model::{Decision, Draft};
pub use store::{DraftStore, InMemoryDraftStore, SWEEP_INTERVAL, spawn_expiry_task};
