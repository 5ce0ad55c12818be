//! Ordering of the waiting line.
//!
//! Display order is always: InProgress first, then Waiting, then resolved
//! entries (Completed / NoShow / Cancelled) — resolved entries sort last no
//! matter what their `position` says. Manual reordering touches the Waiting
//! partition only.
//!
//! The `OrderOverlay` holds optimistic local changes that have been applied
//! to the view but not yet confirmed by the store. Each change carries a
//! sequence number so a stale in-flight completion can never clobber a
//! later mutation on the same entry, and position changes that failed to
//! persist are kept as provisional until a later sync lands them.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{QueueEntry, QueueStatus};

// ─── Display ordering ─────────────────────────────────────────────────────────

fn partition_rank(status: QueueStatus) -> u8 {
    match status {
        QueueStatus::InProgress => 0,
        QueueStatus::Waiting => 1,
        QueueStatus::Completed | QueueStatus::NoShow | QueueStatus::Cancelled => 2,
    }
}

/// Waiting positions are trusted only when every waiting entry has one and
/// together they form the contiguous run `1..=n`. Anything else falls back
/// to ticket order.
pub fn waiting_positions_usable(entries: &[QueueEntry]) -> bool {
    let mut positions = Vec::new();
    for entry in entries.iter().filter(|e| e.status == QueueStatus::Waiting) {
        match entry.position {
            Some(p) => positions.push(p),
            None => return false,
        }
    }
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(i, p)| *p == i as u32 + 1)
}

/// Sort entries into display order, in place.
pub fn display_order(entries: &mut [QueueEntry]) {
    let use_positions = waiting_positions_usable(entries);
    entries.sort_by_key(|e| {
        let rank = partition_rank(e.status);
        let position_key = if rank == 1 && use_positions {
            e.position.unwrap_or(u32::MAX)
        } else {
            0
        };
        (rank, position_key, e.ticket_number)
    });
}

// ─── Manual reordering ────────────────────────────────────────────────────────

/// One position assignment to persist to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionPatch {
    pub id: Uuid,
    pub position: u32,
}

fn waiting_in_display_order(entries: &[QueueEntry]) -> Vec<Uuid> {
    let mut sorted = entries.to_vec();
    display_order(&mut sorted);
    sorted
        .iter()
        .filter(|e| e.status == QueueStatus::Waiting)
        .map(|e| e.id)
        .collect()
}

fn assign_positions(ids: &[Uuid]) -> Vec<PositionPatch> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| PositionPatch {
            id: *id,
            position: index as u32 + 1,
        })
        .collect()
}

/// Swap the entry with its predecessor in the waiting partition.
/// `None` when the entry is not a waiting entry or already first.
pub fn move_up(entries: &[QueueEntry], id: Uuid) -> Option<Vec<PositionPatch>> {
    let mut ids = waiting_in_display_order(entries);
    let index = ids.iter().position(|candidate| *candidate == id)?;
    if index == 0 {
        return None;
    }
    ids.swap(index, index - 1);
    Some(assign_positions(&ids))
}

/// Swap the entry with its successor in the waiting partition.
/// `None` when the entry is not a waiting entry or already last.
pub fn move_down(entries: &[QueueEntry], id: Uuid) -> Option<Vec<PositionPatch>> {
    let mut ids = waiting_in_display_order(entries);
    let index = ids.iter().position(|candidate| *candidate == id)?;
    if index + 1 == ids.len() {
        return None;
    }
    ids.swap(index, index + 1);
    Some(assign_positions(&ids))
}

/// Assign `position = index + 1` across the supplied order. Ids that are
/// unknown, duplicated, or not in the Waiting state are silently excluded
/// before assignment, which keeps resolved entries pinned below active ones
/// and makes retries of the same order idempotent.
pub fn reorder(entries: &[QueueEntry], ids_in_new_order: &[Uuid]) -> Vec<PositionPatch> {
    let waiting: HashSet<Uuid> = entries
        .iter()
        .filter(|e| e.status == QueueStatus::Waiting)
        .map(|e| e.id)
        .collect();

    let mut seen = HashSet::new();
    let filtered: Vec<Uuid> = ids_in_new_order
        .iter()
        .filter(|id| waiting.contains(id) && seen.insert(**id))
        .copied()
        .collect();

    assign_positions(&filtered)
}

// ─── Optimistic overlay ───────────────────────────────────────────────────────

/// A local mutation applied to the view ahead of store confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalChange {
    Status(QueueStatus),
    Position(u32),
}

#[derive(Debug, Clone)]
struct PendingChange {
    seq: u64,
    change: LocalChange,
    provisional: bool,
}

/// In-memory overlay of unconfirmed mutations, keyed by entry id.
///
/// One pending change per entry; staging a new change supersedes the old
/// one. Sequence numbers order completions: `confirm`/`rollback` only take
/// effect if the change they were issued for is still the latest.
#[derive(Debug, Default)]
pub struct OrderOverlay {
    next_seq: u64,
    pending: HashMap<Uuid, PendingChange>,
}

impl OrderOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local change and return its sequence number.
    pub fn stage(&mut self, id: Uuid, change: LocalChange) -> u64 {
        self.next_seq += 1;
        self.pending.insert(
            id,
            PendingChange {
                seq: self.next_seq,
                change,
                provisional: false,
            },
        );
        self.next_seq
    }

    /// Drop the change after the store accepted it — unless a later change
    /// on the same entry has superseded it in the meantime.
    pub fn confirm(&mut self, id: Uuid, seq: u64) {
        if self.pending.get(&id).is_some_and(|p| p.seq == seq) {
            self.pending.remove(&id);
        }
    }

    /// Undo an optimistic change after the store rejected it. Like
    /// `confirm`, a superseded change is left alone.
    pub fn rollback(&mut self, id: Uuid, seq: u64) {
        self.confirm(id, seq);
    }

    /// Keep a failed position change visible for this session instead of
    /// letting the view revert; it will be retried on the next sync.
    pub fn mark_provisional(&mut self, id: Uuid, seq: u64) {
        if let Some(p) = self.pending.get_mut(&id) {
            if p.seq == seq {
                p.provisional = true;
            }
        }
    }

    /// Drop whatever is pending for an entry, e.g. after it was removed.
    pub fn forget(&mut self, id: Uuid) {
        self.pending.remove(&id);
    }

    /// Provisional position changes awaiting a retry, with their sequence
    /// numbers so the retry outcome can be applied race-free.
    pub fn provisional_positions(&self) -> Vec<(Uuid, u32, u64)> {
        self.pending
            .iter()
            .filter(|(_, p)| p.provisional)
            .filter_map(|(id, p)| match p.change {
                LocalChange::Position(position) => Some((*id, position, p.seq)),
                LocalChange::Status(_) => None,
            })
            .collect()
    }

    pub fn provisional_count(&self) -> usize {
        self.pending.values().filter(|p| p.provisional).count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Lay the pending changes over a fresh server snapshot.
    pub fn apply(&self, entries: &mut [QueueEntry]) {
        for entry in entries.iter_mut() {
            if let Some(p) = self.pending.get(&entry.id) {
                match p.change {
                    LocalChange::Status(status) => entry.status = status,
                    LocalChange::Position(position) => entry.position = Some(position),
                }
            }
        }
    }

    /// Re-validate pending changes against server truth: drop changes the
    /// server now reflects, and changes for entries that no longer exist.
    pub fn discard_confirmed(&mut self, entries: &[QueueEntry]) {
        self.pending.retain(|id, p| {
            match entries.iter().find(|e| e.id == *id) {
                None => false,
                Some(entry) => match p.change {
                    LocalChange::Status(status) => entry.status != status,
                    LocalChange::Position(position) => entry.position != Some(position),
                },
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn entry(ticket: u32, status: QueueStatus, position: Option<u32>) -> QueueEntry {
        QueueEntry {
            id: Uuid::new_v4(),
            ticket_number: ticket,
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            is_walk_in: true,
            status,
            check_in_time: Local::now().naive_local(),
            notes: None,
            position,
        }
    }

    fn tickets(entries: &[QueueEntry]) -> Vec<u32> {
        entries.iter().map(|e| e.ticket_number).collect()
    }

    #[test]
    fn in_progress_first_then_waiting_then_resolved() {
        let mut entries = vec![
            entry(1, QueueStatus::Completed, None),
            entry(2, QueueStatus::Waiting, None),
            entry(3, QueueStatus::InProgress, None),
            entry(4, QueueStatus::NoShow, None),
            entry(5, QueueStatus::Waiting, None),
        ];
        display_order(&mut entries);
        assert_eq!(tickets(&entries), vec![3, 2, 5, 1, 4]);
    }

    #[test]
    fn resolved_entries_sort_last_despite_positions() {
        let mut entries = vec![
            entry(1, QueueStatus::Completed, Some(1)),
            entry(2, QueueStatus::Waiting, Some(1)),
            entry(3, QueueStatus::Cancelled, Some(2)),
        ];
        display_order(&mut entries);
        assert_eq!(tickets(&entries), vec![2, 1, 3]);
    }

    #[test]
    fn contiguous_positions_override_ticket_order() {
        let mut entries = vec![
            entry(1, QueueStatus::Waiting, Some(2)),
            entry(2, QueueStatus::Waiting, Some(1)),
        ];
        display_order(&mut entries);
        assert_eq!(tickets(&entries), vec![2, 1]);
    }

    #[test]
    fn incomplete_positions_fall_back_to_tickets() {
        let mut entries = vec![
            entry(2, QueueStatus::Waiting, Some(1)),
            entry(1, QueueStatus::Waiting, None),
        ];
        display_order(&mut entries);
        assert_eq!(tickets(&entries), vec![1, 2]);
    }

    #[test]
    fn gapped_positions_fall_back_to_tickets() {
        let mut entries = vec![
            entry(2, QueueStatus::Waiting, Some(5)),
            entry(1, QueueStatus::Waiting, Some(1)),
        ];
        assert!(!waiting_positions_usable(&entries));
        display_order(&mut entries);
        assert_eq!(tickets(&entries), vec![1, 2]);
    }

    #[test]
    fn move_up_swaps_with_predecessor() {
        let a = entry(1, QueueStatus::Waiting, None);
        let b = entry(2, QueueStatus::Waiting, None);
        let entries = vec![a.clone(), b.clone()];

        let patches = move_up(&entries, b.id).unwrap();
        assert_eq!(
            patches,
            vec![
                PositionPatch { id: b.id, position: 1 },
                PositionPatch { id: a.id, position: 2 },
            ]
        );
    }

    #[test]
    fn move_up_at_front_is_noop() {
        let a = entry(1, QueueStatus::Waiting, None);
        let entries = vec![a.clone(), entry(2, QueueStatus::Waiting, None)];
        assert!(move_up(&entries, a.id).is_none());
    }

    #[test]
    fn move_down_at_back_is_noop() {
        let b = entry(2, QueueStatus::Waiting, None);
        let entries = vec![entry(1, QueueStatus::Waiting, None), b.clone()];
        assert!(move_down(&entries, b.id).is_none());
    }

    #[test]
    fn move_ignores_non_waiting_entries() {
        let busy = entry(1, QueueStatus::InProgress, None);
        let entries = vec![busy.clone(), entry(2, QueueStatus::Waiting, None)];
        assert!(move_up(&entries, busy.id).is_none());
        assert!(move_down(&entries, busy.id).is_none());
    }

    #[test]
    fn move_up_then_down_restores_order() {
        let a = entry(1, QueueStatus::Waiting, None);
        let b = entry(2, QueueStatus::Waiting, None);
        let c = entry(3, QueueStatus::Waiting, None);
        let mut entries = vec![a.clone(), b.clone(), c.clone()];

        let up = move_up(&entries, b.id).unwrap();
        for patch in &up {
            let e = entries.iter_mut().find(|e| e.id == patch.id).unwrap();
            e.position = Some(patch.position);
        }
        let down = move_down(&entries, b.id).unwrap();
        for patch in &down {
            let e = entries.iter_mut().find(|e| e.id == patch.id).unwrap();
            e.position = Some(patch.position);
        }

        display_order(&mut entries);
        assert_eq!(tickets(&entries), vec![1, 2, 3]);
    }

    #[test]
    fn reorder_assigns_sequential_positions() {
        let a = entry(1, QueueStatus::Waiting, None);
        let b = entry(2, QueueStatus::Waiting, None);
        let c = entry(3, QueueStatus::Waiting, None);
        let entries = vec![a.clone(), b.clone(), c.clone()];

        let patches = reorder(&entries, &[c.id, a.id, b.id]);
        assert_eq!(
            patches,
            vec![
                PositionPatch { id: c.id, position: 1 },
                PositionPatch { id: a.id, position: 2 },
                PositionPatch { id: b.id, position: 3 },
            ]
        );
    }

    #[test]
    fn reorder_excludes_resolved_and_unknown_ids() {
        let a = entry(1, QueueStatus::Waiting, None);
        let done = entry(2, QueueStatus::Completed, None);
        let entries = vec![a.clone(), done.clone()];

        let patches = reorder(&entries, &[done.id, Uuid::new_v4(), a.id]);
        assert_eq!(patches, vec![PositionPatch { id: a.id, position: 1 }]);
    }

    #[test]
    fn reorder_is_idempotent() {
        let a = entry(1, QueueStatus::Waiting, None);
        let b = entry(2, QueueStatus::Waiting, None);
        let mut entries = vec![a.clone(), b.clone()];

        let order = [b.id, a.id];
        let first = reorder(&entries, &order);
        for patch in &first {
            let e = entries.iter_mut().find(|e| e.id == patch.id).unwrap();
            e.position = Some(patch.position);
        }
        let second = reorder(&entries, &order);
        assert_eq!(first, second);
    }

    #[test]
    fn overlay_applies_latest_change() {
        let mut overlay = OrderOverlay::new();
        let mut entries = vec![entry(1, QueueStatus::Waiting, None)];
        let id = entries[0].id;

        overlay.stage(id, LocalChange::Status(QueueStatus::InProgress));
        overlay.apply(&mut entries);
        assert_eq!(entries[0].status, QueueStatus::InProgress);
    }

    #[test]
    fn stale_confirm_leaves_later_change_pending() {
        let mut overlay = OrderOverlay::new();
        let id = Uuid::new_v4();

        let first = overlay.stage(id, LocalChange::Position(1));
        let second = overlay.stage(id, LocalChange::Position(2));
        assert!(second > first);

        overlay.confirm(id, first);
        assert_eq!(overlay.len(), 1, "later change must survive a stale confirm");

        overlay.confirm(id, second);
        assert!(overlay.is_empty());
    }

    #[test]
    fn rollback_only_cancels_its_own_change() {
        let mut overlay = OrderOverlay::new();
        let id = Uuid::new_v4();

        let first = overlay.stage(id, LocalChange::Status(QueueStatus::InProgress));
        let _second = overlay.stage(id, LocalChange::Status(QueueStatus::Completed));

        overlay.rollback(id, first);
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn provisional_positions_survive_until_confirmed_by_server() {
        let mut overlay = OrderOverlay::new();
        let mut entries = vec![entry(1, QueueStatus::Waiting, None)];
        let id = entries[0].id;

        let seq = overlay.stage(id, LocalChange::Position(3));
        overlay.mark_provisional(id, seq);
        assert_eq!(overlay.provisional_positions(), vec![(id, 3, seq)]);

        // Server still shows no position: the override stays.
        overlay.discard_confirmed(&entries);
        assert_eq!(overlay.len(), 1);

        // Server caught up: the override is dropped.
        entries[0].position = Some(3);
        overlay.discard_confirmed(&entries);
        assert!(overlay.is_empty());
    }

    #[test]
    fn overrides_for_removed_entries_are_dropped() {
        let mut overlay = OrderOverlay::new();
        let id = Uuid::new_v4();
        overlay.stage(id, LocalChange::Position(1));

        overlay.discard_confirmed(&[]);
        assert!(overlay.is_empty());
    }
}
