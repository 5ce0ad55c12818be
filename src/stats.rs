//! Day statistics derived from the current entry set.
//!
//! Nothing here is persisted; counts are recomputed on every refresh from
//! whatever `list_queue_entries_today` returned, in one pass and without
//! assuming any input ordering.

use serde::Serialize;

use crate::models::{QueueEntry, QueueStatus};
use crate::ticket;

/// Counts per status for the clinic day, plus the next ticket to issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub no_show: u32,
    pub total: u32,
    pub next_ticket_number: u32,
}

impl QueueStats {
    pub fn compute(entries: &[QueueEntry]) -> Self {
        let mut stats = Self {
            next_ticket_number: ticket::next_ticket_number(entries),
            ..Self::default()
        };
        for entry in entries {
            stats.total += 1;
            match entry.status {
                QueueStatus::Waiting => stats.waiting += 1,
                QueueStatus::InProgress => stats.in_progress += 1,
                QueueStatus::Completed => stats.completed += 1,
                QueueStatus::NoShow => stats.no_show += 1,
                QueueStatus::Cancelled => {}
            }
        }
        stats
    }
}

/// Advisory wait estimate for one waiting patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitEstimate {
    pub patients_ahead: u32,
    pub estimated_mins: u32,
}

/// Estimate time-to-consultation from queue depth.
///
/// Formula: `patients_ahead * avg_consult_mins`, counting the patient
/// currently in progress as one ahead. Display guidance only; the line can
/// move faster or slower than the average.
pub fn estimate_wait(patients_ahead: u32, avg_consult_mins: u32) -> WaitEstimate {
    WaitEstimate {
        patients_ahead,
        estimated_mins: patients_ahead.saturating_mul(avg_consult_mins),
    }
}
