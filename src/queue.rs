//! Queue service — the single ordering authority for the clinic day.
//!
//! Wraps the persistence collaborator with the front-desk rules: ticket
//! allocation from the authoritative list, status-transition legality,
//! manual reordering of the waiting partition, and appointment check-in
//! without duplication.
//!
//! Mutations are optimistic: the local view changes first, the store is
//! told second. Confirmations and rollbacks are matched by per-entry
//! sequence numbers, so a slow response for an old mutation can never
//! overwrite a newer one on the same entry. Failed position changes may
//! stay visible as provisional local state; failed status changes and
//! creations always roll back.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::models::{
    Appointment, ModelError, NewQueueEntry, QueueEntry, QueueEntryDraft, QueueEntryPatch,
    QueueStatus,
};
use crate::ordering::{self, LocalChange, OrderOverlay, PositionPatch};
use crate::reconcile::{self, Reconciliation};
use crate::stats::{self, QueueStats, WaitEstimate};
use crate::status;
use crate::store::{QueueStore, StoreError};
use crate::ticket;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Illegal status transition: {} -> {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: QueueStatus, to: QueueStatus },

    #[error("Appointment {appointment_id} already has a queue entry")]
    DuplicateCheckIn { appointment_id: Uuid },

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Ticket number {ticket} was issued more than once today")]
    TicketCollision { ticket: u32 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl From<ModelError> for QueueError {
    fn from(err: ModelError) -> Self {
        Self::Validation(err.to_string())
    }
}

// ─── Snapshot types ───────────────────────────────────────────────────────────

/// Non-fatal conditions worth showing at the desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueWarning {
    /// Two clients allocated the same display ticket; the line still works.
    TicketCollision { ticket: u32 },
    /// Manual ordering not yet accepted by the store.
    ProvisionalOrder { entries: u32 },
}

/// One consistent view of the day: display-ordered entries with local
/// changes applied, derived statistics, and the schedule reconciliation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntry>,
    pub stats: QueueStats,
    pub reconciliation: Reconciliation,
    pub warnings: Vec<QueueWarning>,
    pub refreshed_at: Option<NaiveDateTime>,
}

/// Outcome of a best-effort bulk check-in.
#[derive(Debug, Default)]
pub struct BulkCheckIn {
    pub created: Vec<QueueEntry>,
    pub failed: Vec<(Uuid, QueueError)>,
}

impl BulkCheckIn {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

// ─── Day state ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DayState {
    entries: Vec<QueueEntry>,
    appointments: Vec<Appointment>,
    overlay: OrderOverlay,
    collisions: Vec<u32>,
    refreshed_at: Option<NaiveDateTime>,
}

impl DayState {
    fn merged_entries(&self) -> Vec<QueueEntry> {
        let mut entries = self.entries.clone();
        self.overlay.apply(&mut entries);
        ordering::display_order(&mut entries);
        entries
    }

    fn merged_status(&self, id: Uuid) -> Option<QueueStatus> {
        self.merged_entries()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.status)
    }

    fn absorb(&mut self, entries: Vec<QueueEntry>) {
        self.entries = entries;
        self.collisions = ticket::find_collisions(&self.entries);
        self.overlay.discard_confirmed(&self.entries);
    }

    fn warnings(&self) -> Vec<QueueWarning> {
        let mut warnings: Vec<QueueWarning> = self
            .collisions
            .iter()
            .map(|t| QueueWarning::TicketCollision { ticket: *t })
            .collect();
        let provisional = self.overlay.provisional_count();
        if provisional > 0 {
            warnings.push(QueueWarning::ProvisionalOrder {
                entries: provisional as u32,
            });
        }
        warnings
    }

    fn snapshot(&self) -> QueueSnapshot {
        let entries = self.merged_entries();
        QueueSnapshot {
            stats: QueueStats::compute(&entries),
            reconciliation: reconcile::reconcile(
                &self.appointments,
                &entries,
                Local::now().date_naive(),
            ),
            warnings: self.warnings(),
            refreshed_at: self.refreshed_at,
            entries,
        }
    }
}

fn upsert(entries: &mut Vec<QueueEntry>, entry: QueueEntry) {
    match entries.iter_mut().find(|e| e.id == entry.id) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

// ─── Service ──────────────────────────────────────────────────────────────────

pub struct QueueService<S: QueueStore> {
    store: Arc<S>,
    config: QueueConfig,
    state: Mutex<DayState>,
}

impl<S: QueueStore> QueueService<S> {
    pub fn new(store: Arc<S>, config: QueueConfig) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(DayState::default()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, DayState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ── Refresh and views ────────────────────────────────

    /// Re-fetch server truth, retry provisional ordering, and return the
    /// merged view. This is what the sync loop runs on every tick.
    pub async fn refresh(&self) -> Result<QueueSnapshot, QueueError> {
        let entries = self.store.list_queue_entries_today().await?;
        let appointments = self.store.list_appointments_today().await?;

        let retries = {
            let mut guard = self.state();
            let state = &mut *guard;
            state.absorb(entries);
            state.appointments = appointments;
            state.refreshed_at = Some(Local::now().naive_local());
            if !state.collisions.is_empty() {
                warn!(
                    collisions = ?state.collisions,
                    "duplicate ticket numbers in today's queue"
                );
            }
            state.overlay.provisional_positions()
        };

        for (id, position, seq) in retries {
            match self
                .store
                .update_queue_entry(id, QueueEntryPatch::position(position))
                .await
            {
                Ok(updated) => {
                    let mut guard = self.state();
                    guard.overlay.confirm(id, seq);
                    upsert(&mut guard.entries, updated);
                    debug!(%id, position, "provisional order persisted");
                }
                Err(e) if e.is_unavailable() => {
                    warn!(%id, "store still unreachable, keeping provisional order: {e}");
                }
                Err(e) => {
                    // Entry gone or write permanently rejected; server wins.
                    self.state().overlay.rollback(id, seq);
                    warn!(%id, "dropping provisional order: {e}");
                }
            }
        }

        Ok(self.state().snapshot())
    }

    /// Current merged view without touching the store.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.state().snapshot()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::compute(&self.state().merged_entries())
    }

    /// Advisory wait for a patient joining the line now.
    pub fn wait_estimate(&self) -> WaitEstimate {
        let current = self.stats();
        stats::estimate_wait(
            current.waiting + current.in_progress,
            self.config.avg_consult_mins,
        )
    }

    // ── Registration and check-in ────────────────────────

    /// Register a walk-in. The ticket is allocated from a fresh entry list;
    /// if that list cannot be fetched, no ticket is issued.
    pub async fn create_walk_in(&self, draft: QueueEntryDraft) -> Result<QueueEntry, QueueError> {
        draft.validate()?;
        if draft.appointment_id.is_some() {
            return Err(QueueError::Validation(
                "walk-in registration cannot reference an appointment; use check_in".into(),
            ));
        }

        let entries = self.store.list_queue_entries_today().await?;
        let ticket_number = ticket::next_ticket_number(&entries);
        let new = NewQueueEntry {
            ticket_number,
            patient_id: draft.patient_id,
            appointment_id: None,
            is_walk_in: true,
            status: QueueStatus::Waiting,
            check_in_time: Local::now().naive_local(),
            notes: draft.notes,
        };

        let created = self.store.create_queue_entry(new).await.map_err(|e| match e {
            StoreError::Conflict(_) => QueueError::TicketCollision {
                ticket: ticket_number,
            },
            other => other.into(),
        })?;
        info!(ticket = created.ticket_number, "walk-in registered");

        let mut guard = self.state();
        let state = &mut *guard;
        state.absorb(entries);
        upsert(&mut state.entries, created.clone());
        Ok(created)
    }

    /// Convert a scheduled appointment into a queue entry. Exactly one
    /// entry may exist per appointment; a second attempt fails with
    /// `DuplicateCheckIn`, whether caught locally or by the store.
    pub async fn check_in(&self, appointment: &Appointment) -> Result<QueueEntry, QueueError> {
        let today = Local::now().date_naive();
        if !appointment.is_open_on(today) {
            return Err(QueueError::Validation(format!(
                "appointment {} is not open for check-in today",
                appointment.id
            )));
        }

        let entries = self.store.list_queue_entries_today().await?;
        if entries
            .iter()
            .any(|e| e.appointment_id == Some(appointment.id))
        {
            return Err(QueueError::DuplicateCheckIn {
                appointment_id: appointment.id,
            });
        }

        let draft = QueueEntryDraft::from_appointment(appointment);
        draft.validate()?;
        let ticket_number = ticket::next_ticket_number(&entries);
        let new = NewQueueEntry {
            ticket_number,
            patient_id: draft.patient_id,
            appointment_id: draft.appointment_id,
            is_walk_in: false,
            status: QueueStatus::Waiting,
            check_in_time: Local::now().naive_local(),
            notes: draft.notes,
        };

        let created = self.store.create_queue_entry(new).await.map_err(|e| match e {
            StoreError::Conflict(msg) if msg.contains("appointment") => {
                QueueError::DuplicateCheckIn {
                    appointment_id: appointment.id,
                }
            }
            StoreError::Conflict(_) => QueueError::TicketCollision {
                ticket: ticket_number,
            },
            other => other.into(),
        })?;
        info!(
            ticket = created.ticket_number,
            appointment = %appointment.id,
            "scheduled patient checked in"
        );

        let mut guard = self.state();
        let state = &mut *guard;
        state.absorb(entries);
        upsert(&mut state.entries, created.clone());
        Ok(created)
    }

    /// Check in a batch of appointments independently; one failure never
    /// aborts the rest.
    pub async fn check_in_all(&self, appointments: &[Appointment]) -> BulkCheckIn {
        let mut result = BulkCheckIn::default();
        for appointment in appointments {
            match self.check_in(appointment).await {
                Ok(entry) => result.created.push(entry),
                Err(e) => {
                    warn!(appointment = %appointment.id, "check-in failed: {e}");
                    result.failed.push((appointment.id, e));
                }
            }
        }
        result
    }

    // ── Status changes ───────────────────────────────────

    async fn current_status(&self, id: Uuid) -> Result<QueueStatus, QueueError> {
        if let Some(current) = self.state().merged_status(id) {
            return Ok(current);
        }
        // Cold cache: this workstation hasn't seen the entry yet.
        let entries = self.store.list_queue_entries_today().await?;
        let mut guard = self.state();
        guard.absorb(entries);
        guard.merged_status(id).ok_or(QueueError::EntryNotFound(id))
    }

    /// Apply a status transition. Illegal transitions are rejected with the
    /// queue untouched; store failures roll the optimistic change back.
    pub async fn set_status(
        &self,
        id: Uuid,
        new_status: QueueStatus,
    ) -> Result<QueueEntry, QueueError> {
        let current = self.current_status(id).await?;
        status::validate_transition(current, new_status)?;
        let seq = self
            .state()
            .overlay
            .stage(id, LocalChange::Status(new_status));

        match self
            .store
            .update_queue_entry(id, QueueEntryPatch::status(new_status))
            .await
        {
            Ok(updated) => {
                let mut guard = self.state();
                guard.overlay.confirm(id, seq);
                upsert(&mut guard.entries, updated.clone());
                info!(%id, from = current.as_str(), to = new_status.as_str(), "status changed");
                Ok(updated)
            }
            Err(StoreError::NotFound { .. }) => {
                self.state().overlay.rollback(id, seq);
                Err(QueueError::EntryNotFound(id))
            }
            Err(e) => {
                // A status change left provisional could strand a patient
                // in a state the store never saw; always roll back.
                self.state().overlay.rollback(id, seq);
                warn!(%id, "status change rolled back: {e}");
                Err(e.into())
            }
        }
    }

    /// Remove an entry from the queue — the staff-facing cancellation.
    /// Only non-terminal entries can be cancelled.
    pub async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        let current = self.current_status(id).await?;
        status::validate_transition(current, QueueStatus::Cancelled)?;
        let seq = self
            .state()
            .overlay
            .stage(id, LocalChange::Status(QueueStatus::Cancelled));

        match self.store.remove_queue_entry(id).await {
            Ok(()) => {
                let mut guard = self.state();
                guard.overlay.forget(id);
                guard.entries.retain(|e| e.id != id);
                info!(%id, "entry removed from the queue");
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => {
                // Another workstation got there first; converge silently.
                let mut guard = self.state();
                guard.overlay.forget(id);
                guard.entries.retain(|e| e.id != id);
                debug!(%id, "entry was already removed");
                Ok(())
            }
            Err(e) => {
                self.state().overlay.rollback(id, seq);
                warn!(%id, "removal rolled back: {e}");
                Err(e.into())
            }
        }
    }

    // ── Manual ordering ──────────────────────────────────

    /// Move a waiting entry one place forward. `Ok(false)` when the entry
    /// is at the front of the line or not in the waiting partition.
    pub async fn move_up(&self, id: Uuid) -> Result<bool, QueueError> {
        let patches = {
            let state = self.state();
            let merged = state.merged_entries();
            if !merged.iter().any(|e| e.id == id) {
                return Err(QueueError::EntryNotFound(id));
            }
            ordering::move_up(&merged, id)
        };
        match patches {
            Some(patches) => {
                self.persist_positions(patches).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move a waiting entry one place back. `Ok(false)` at the boundary or
    /// for entries outside the waiting partition.
    pub async fn move_down(&self, id: Uuid) -> Result<bool, QueueError> {
        let patches = {
            let state = self.state();
            let merged = state.merged_entries();
            if !merged.iter().any(|e| e.id == id) {
                return Err(QueueError::EntryNotFound(id));
            }
            ordering::move_down(&merged, id)
        };
        match patches {
            Some(patches) => {
                self.persist_positions(patches).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-order the waiting partition to match `ids_in_new_order`. Unknown,
    /// duplicate, and non-waiting ids are ignored. Returns how many entries
    /// were repositioned. Never fails hard: positions that cannot be
    /// persisted right now stay provisional and surface as a warning.
    pub async fn reorder(&self, ids_in_new_order: &[Uuid]) -> usize {
        let patches = {
            let state = self.state();
            ordering::reorder(&state.merged_entries(), ids_in_new_order)
        };
        let count = patches.len();
        self.persist_positions(patches).await;
        count
    }

    async fn persist_positions(&self, patches: Vec<PositionPatch>) {
        let staged: Vec<(Uuid, u32, u64)> = {
            let mut guard = self.state();
            patches
                .iter()
                .map(|p| {
                    let seq = guard.overlay.stage(p.id, LocalChange::Position(p.position));
                    (p.id, p.position, seq)
                })
                .collect()
        };

        for (id, position, seq) in staged {
            match self
                .store
                .update_queue_entry(id, QueueEntryPatch::position(position))
                .await
            {
                Ok(updated) => {
                    let mut guard = self.state();
                    guard.overlay.confirm(id, seq);
                    upsert(&mut guard.entries, updated);
                }
                Err(e) if e.is_unavailable() => {
                    self.state().overlay.mark_provisional(id, seq);
                    warn!(%id, "position change kept locally, store unreachable: {e}");
                }
                Err(e) => {
                    self.state().overlay.rollback(id, seq);
                    warn!(%id, "position change dropped: {e}");
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
