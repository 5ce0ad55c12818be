use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// A scheduled visit, owned by the appointment subsystem.
///
/// The queue engine reads these and writes back nothing; the only link is a
/// queue entry created by check-in that carries the appointment's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Open on the given day: scheduled, not yet resolved, and dated for it.
    pub fn is_open_on(&self, day: NaiveDate) -> bool {
        self.date == day && !self.status.is_terminal()
    }
}
