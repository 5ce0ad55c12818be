//! In-memory store, the reference implementation of the persistence seam.
//!
//! Backs the crate's own tests and lets downstream callers run a queue
//! without a remote API. Enforces the same uniqueness constraints a real
//! deployment puts on the database: at most one queue entry per appointment,
//! and one ticket number per clinic day. An offline toggle simulates an
//! unreachable collaborator for failure-path testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use uuid::Uuid;

use super::{QueueStore, StoreError};
use crate::models::{Appointment, NewQueueEntry, QueueEntry, QueueEntryPatch};

#[derive(Default)]
struct Inner {
    entries: Vec<QueueEntry>,
    appointments: Vec<Appointment>,
}

/// HashMap-free list-backed store; entry order is insertion order, which
/// keeps `list_queue_entries_today` deterministic for callers and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the day's schedule visible through `list_appointments_today`.
    pub fn seed_appointments(&self, appointments: Vec<Appointment>) {
        self.lock().appointments = appointments;
    }

    /// Simulate the collaborator being unreachable. While offline every
    /// operation fails with a transport error and no state changes.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn entry_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("store offline".into()));
        }
        Ok(())
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn create_queue_entry(&self, new: NewQueueEntry) -> Result<QueueEntry, StoreError> {
        self.check_reachable()?;
        let mut inner = self.lock();
        let today = Self::today();

        if let Some(appointment_id) = new.appointment_id {
            let taken = inner
                .entries
                .iter()
                .any(|e| e.appointment_id == Some(appointment_id));
            if taken {
                return Err(StoreError::Conflict(format!(
                    "appointment {appointment_id} already has a queue entry"
                )));
            }
        }

        let ticket_taken = inner
            .entries
            .iter()
            .filter(|e| e.check_in_time.date() == today)
            .any(|e| e.ticket_number == new.ticket_number);
        if ticket_taken {
            return Err(StoreError::Conflict(format!(
                "ticket number {} already issued today",
                new.ticket_number
            )));
        }

        let entry = new.into_entry(Uuid::new_v4());
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    async fn update_queue_entry(
        &self,
        id: Uuid,
        patch: QueueEntryPatch,
    ) -> Result<QueueEntry, StoreError> {
        self.check_reachable()?;
        let mut inner = self.lock();
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound {
                entity: "queue_entry",
                id,
            })?;
        patch.apply_to(entry);
        Ok(entry.clone())
    }

    async fn remove_queue_entry(&self, id: Uuid) -> Result<(), StoreError> {
        self.check_reachable()?;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        if inner.entries.len() == before {
            return Err(StoreError::NotFound {
                entity: "queue_entry",
                id,
            });
        }
        Ok(())
    }

    async fn list_queue_entries_today(&self) -> Result<Vec<QueueEntry>, StoreError> {
        self.check_reachable()?;
        let today = Self::today();
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|e| e.check_in_time.date() == today)
            .cloned()
            .collect())
    }

    async fn list_appointments_today(&self) -> Result<Vec<Appointment>, StoreError> {
        self.check_reachable()?;
        let today = Self::today();
        Ok(self
            .lock()
            .appointments
            .iter()
            .filter(|a| a.date == today)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, QueueStatus};

    fn new_entry(ticket: u32) -> NewQueueEntry {
        NewQueueEntry {
            ticket_number: ticket,
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            is_walk_in: true,
            status: QueueStatus::Waiting,
            check_in_time: Local::now().naive_local(),
            notes: None,
        }
    }

    fn appointment_today() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            date: Local::now().date_naive(),
            time: None,
            appointment_type: None,
            reason: None,
            status: AppointmentStatus::Scheduled,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_lists_today() {
        let store = MemoryStore::new();
        let created = store.create_queue_entry(new_entry(1)).await.unwrap();
        assert!(!created.id.is_nil());

        let listed = store.list_queue_entries_today().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn duplicate_ticket_rejected() {
        let store = MemoryStore::new();
        store.create_queue_entry(new_entry(1)).await.unwrap();

        let err = store.create_queue_entry(new_entry(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_appointment_link_rejected() {
        let store = MemoryStore::new();
        let appointment_id = Uuid::new_v4();

        let mut first = new_entry(1);
        first.appointment_id = Some(appointment_id);
        first.is_walk_in = false;
        store.create_queue_entry(first).await.unwrap();

        let mut second = new_entry(2);
        second.appointment_id = Some(appointment_id);
        second.is_walk_in = false;
        let err = store.create_queue_entry(second).await.unwrap_err();
        match err {
            StoreError::Conflict(msg) => assert!(msg.contains("appointment")),
            other => panic!("Expected Conflict, got: {other}"),
        }
    }

    #[tokio::test]
    async fn update_merges_partially() {
        let store = MemoryStore::new();
        let created = store.create_queue_entry(new_entry(1)).await.unwrap();

        let updated = store
            .update_queue_entry(created.id, QueueEntryPatch::position(4))
            .await
            .unwrap();
        assert_eq!(updated.position, Some(4));
        assert_eq!(updated.status, QueueStatus::Waiting, "status untouched");
        assert_eq!(updated.ticket_number, 1);
    }

    #[tokio::test]
    async fn update_unknown_entry_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_queue_entry(Uuid::new_v4(), QueueEntryPatch::position(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn remove_deletes_entry() {
        let store = MemoryStore::new();
        let created = store.create_queue_entry(new_entry(1)).await.unwrap();

        store.remove_queue_entry(created.id).await.unwrap();
        assert_eq!(store.entry_count(), 0);

        let err = store.remove_queue_entry(created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn appointments_scoped_to_today() {
        let store = MemoryStore::new();
        let today = appointment_today();
        let mut tomorrow = appointment_today();
        tomorrow.date = tomorrow.date.succ_opt().unwrap();
        store.seed_appointments(vec![today.clone(), tomorrow]);

        let listed = store.list_appointments_today().await.unwrap();
        assert_eq!(listed, vec![today]);
    }

    #[tokio::test]
    async fn offline_fails_every_operation_without_state_change() {
        let store = MemoryStore::new();
        store.create_queue_entry(new_entry(1)).await.unwrap();
        store.set_offline(true);

        let err = store.create_queue_entry(new_entry(2)).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.list_queue_entries_today().await.is_err());

        store.set_offline(false);
        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.list_queue_entries_today().await.unwrap().len(), 1);
    }
}
