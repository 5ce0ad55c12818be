use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::appointment::Appointment;
use super::enums::QueueStatus;
use super::ModelError;

/// One patient's position and state in today's waiting line.
///
/// Ticket numbers are assigned in arrival order and never reused within a
/// clinic day, even after cancellation. `position` expresses manual ordering
/// among `Waiting` entries only; it carries no meaning once the entry leaves
/// the waiting state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub ticket_number: u32,
    pub patient_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<Uuid>,
    pub is_walk_in: bool,
    pub status: QueueStatus,
    pub check_in_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// Staff-supplied fields for registering a patient in the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntryDraft {
    pub patient_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl QueueEntryDraft {
    /// Draft for a patient with no backing scheduled appointment.
    pub fn walk_in(patient_id: Uuid) -> Self {
        Self {
            patient_id,
            appointment_id: None,
            notes: None,
        }
    }

    /// Draft for checking in a scheduled appointment.
    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            patient_id: appointment.patient_id,
            appointment_id: Some(appointment.id),
            notes: appointment.reason.clone(),
        }
    }

    /// Reject malformed drafts before any store call is made.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.patient_id.is_nil() {
            return Err(ModelError::Validation(
                "queue entry requires a patient reference".into(),
            ));
        }
        Ok(())
    }
}

/// A fully-specified entry awaiting its id from the store.
///
/// Ticket number, status, and check-in time are assigned by the engine; the
/// store only mints the id and enforces its uniqueness constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueEntry {
    pub ticket_number: u32,
    pub patient_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<Uuid>,
    pub is_walk_in: bool,
    pub status: QueueStatus,
    pub check_in_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewQueueEntry {
    pub fn into_entry(self, id: Uuid) -> QueueEntry {
        QueueEntry {
            id,
            ticket_number: self.ticket_number,
            patient_id: self.patient_id,
            appointment_id: self.appointment_id,
            is_walk_in: self.is_walk_in,
            status: self.status,
            check_in_time: self.check_in_time,
            notes: self.notes,
            position: None,
        }
    }
}

/// Partial update for an entry. `None` fields are left untouched by the
/// store; the update is a merge, never a full replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueEntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QueueStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl QueueEntryPatch {
    pub fn status(status: QueueStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn position(position: u32) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.position.is_none() && self.notes.is_none()
    }

    /// Merge the patch into an entry, leaving unspecified fields alone.
    pub fn apply_to(&self, entry: &mut QueueEntry) {
        if let Some(status) = self.status {
            entry.status = status;
        }
        if let Some(position) = self.position {
            entry.position = Some(position);
        }
        if let Some(notes) = &self.notes {
            entry.notes = Some(notes.clone());
        }
    }
}
