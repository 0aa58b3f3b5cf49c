//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Available Repositories
//!
//! - [`SyncStateRepository`](sync_state::SyncStateRepository) - Per-namespace sync progress

pub mod sync_state;
