//! Reconciliation of the day's schedule against the waiting line.
//!
//! Answers the front-desk question "which of today's booked patients have
//! actually arrived?" by cross-referencing appointment ids against the
//! queue entries created by check-in. Pure over its inputs: running it
//! twice on unchanged data yields the same partition.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Appointment, QueueEntry};

/// Partition of today's open appointments by arrival state.
/// Both sides preserve the schedule's own ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Appointments that already have a queue entry.
    pub already_queued: Vec<Uuid>,
    /// Appointments still waiting for the patient to arrive.
    pub check_in_eligible: Vec<Uuid>,
}

impl Reconciliation {
    pub fn is_eligible(&self, appointment_id: Uuid) -> bool {
        self.check_in_eligible.contains(&appointment_id)
    }

    pub fn is_queued(&self, appointment_id: Uuid) -> bool {
        self.already_queued.contains(&appointment_id)
    }
}

/// Partition `appointments` for the given day against the entry set.
///
/// Resolved appointments (completed, cancelled, missed) and appointments
/// dated for another day are skipped entirely; they can neither be checked
/// in nor show up as queued.
pub fn reconcile(
    appointments: &[Appointment],
    entries: &[QueueEntry],
    day: NaiveDate,
) -> Reconciliation {
    let queued_ids: HashSet<Uuid> = entries.iter().filter_map(|e| e.appointment_id).collect();

    let mut result = Reconciliation::default();
    for appointment in appointments.iter().filter(|a| a.is_open_on(day)) {
        if queued_ids.contains(&appointment.id) {
            result.already_queued.push(appointment.id);
        } else {
            result.check_in_eligible.push(appointment.id);
        }
    }
    result
}
