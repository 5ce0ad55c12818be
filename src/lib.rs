//! frontdesk — patient queue and appointment-ordering engine.
//!
//! The clinic's waiting line as a library: sequential tickets for arriving
//! patients, a small status machine per entry, a manually reorderable
//! waiting partition, reconciliation against the day's appointment
//! schedule, and a polling loop that keeps every workstation's view
//! eventually consistent with the shared store.

pub mod config;
pub mod models;
pub mod ordering; // waiting-line display order + optimistic overlay
pub mod queue; // service facade: the day's ordering authority
pub mod reconcile; // schedule vs. line cross-reference
pub mod stats; // derived day counts and wait estimates
pub mod status; // entry status machine
pub mod store; // persistence collaborator seam (REST + in-memory)
pub mod sync; // polling refresh loop
pub mod ticket; // per-day ticket allocation

pub use config::QueueConfig;
pub use models::{
    Appointment, AppointmentStatus, QueueEntry, QueueEntryDraft, QueueEntryPatch, QueueStatus,
};
pub use queue::{BulkCheckIn, QueueError, QueueService, QueueSnapshot, QueueWarning};
pub use reconcile::Reconciliation;
pub use stats::QueueStats;
pub use store::{MemoryStore, QueueStore, RestStore, StoreError};
pub use sync::SyncHandle;
