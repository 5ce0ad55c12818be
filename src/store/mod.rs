//! Persistence collaborator seam.
//!
//! The queue engine never owns storage: all entries and appointments live in
//! an external store reached through the narrow CRUD contract below. The
//! store is the authority for id assignment and for the two uniqueness
//! constraints the engine can only check best-effort on its side (one entry
//! per appointment, one ticket number per clinic day).

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Appointment, NewQueueEntry, QueueEntry, QueueEntryPatch};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Constraint violated: {0}")]
    Conflict(String),

    #[error("Invalid response from store: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// True when the store could not be reached at all. Conflicts and
    /// not-found responses are rejections of one specific write, not
    /// availability problems, and must not trigger offline fallbacks.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

/// Day-scoped CRUD over queue entries plus read access to the schedule.
///
/// `list_queue_entries_today` must return a consistent snapshot of the
/// current clinic day; `update_queue_entry` performs a partial merge, never
/// a full replace.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn create_queue_entry(&self, new: NewQueueEntry) -> Result<QueueEntry, StoreError>;

    async fn update_queue_entry(
        &self,
        id: Uuid,
        patch: QueueEntryPatch,
    ) -> Result<QueueEntry, StoreError>;

    async fn remove_queue_entry(&self, id: Uuid) -> Result<(), StoreError>;

    async fn list_queue_entries_today(&self) -> Result<Vec<QueueEntry>, StoreError>;

    async fn list_appointments_today(&self) -> Result<Vec<Appointment>, StoreError>;
}
