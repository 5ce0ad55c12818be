//! Ticket allocation for the clinic day.
//!
//! Ticket numbers are derived from the authoritative entry list, never
//! stored independently: two workstations allocating concurrently converge
//! to the same next value once both observe the latest list. Cancelled
//! entries keep their number, so a day's tickets are issued exactly once.

use crate::models::QueueEntry;

/// First ticket of a fresh clinic day.
pub const FIRST_TICKET: u32 = 1;

/// Smallest integer greater than every ticket already issued today.
pub fn next_ticket_number(entries: &[QueueEntry]) -> u32 {
    entries
        .iter()
        .map(|e| e.ticket_number)
        .max()
        .map_or(FIRST_TICKET, |highest| highest + 1)
}

/// Ticket numbers issued to more than one entry, deduplicated and sorted.
/// Collisions happen when two clients allocate against the same stale list;
/// they are advisory display numbers, so this is a warning, not corruption.
pub fn find_collisions(entries: &[QueueEntry]) -> Vec<u32> {
    let mut tickets: Vec<u32> = entries.iter().map(|e| e.ticket_number).collect();
    tickets.sort_unstable();

    let mut collisions: Vec<u32> = tickets
        .windows(2)
        .filter(|pair| pair[0] == pair[1])
        .map(|pair| pair[0])
        .collect();
    collisions.dedup();
    collisions
}
