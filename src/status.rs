//! Status machine for queue entries.
//!
//! Legal transitions:
//! - `Waiting -> InProgress` (staff claims the next patient)
//! - `InProgress -> Completed`
//! - `Waiting -> NoShow`
//! - `Waiting | InProgress -> Cancelled` (explicit staff removal)
//!
//! Completed, NoShow, and Cancelled are absorbing: once reached, nothing
//! moves an entry out of them.

use crate::models::QueueStatus;
use crate::queue::QueueError;

/// Check a transition against the legal set. Illegal attempts, including
/// any step out of a terminal status and self-transitions, are rejected
/// without touching queue state.
pub fn validate_transition(from: QueueStatus, to: QueueStatus) -> Result<(), QueueError> {
    use crate::models::QueueStatus::*;

    match (from, to) {
        (Waiting, InProgress)
        | (InProgress, Completed)
        | (Waiting, NoShow)
        | (Waiting, Cancelled)
        | (InProgress, Cancelled) => Ok(()),
        (from, to) => Err(QueueError::InvalidTransition { from, to }),
    }
}

/// All statuses legally reachable from `from` in one step.
pub fn reachable_from(from: QueueStatus) -> Vec<QueueStatus> {
    use crate::models::QueueStatus::*;

    [InProgress, Completed, NoShow, Cancelled, Waiting]
        .into_iter()
        .filter(|to| validate_transition(from, *to).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueueStatus::*;

    #[test]
    fn legal_transitions_accepted() {
        for (from, to) in [
            (Waiting, InProgress),
            (InProgress, Completed),
            (Waiting, NoShow),
            (Waiting, Cancelled),
            (InProgress, Cancelled),
        ] {
            assert!(validate_transition(from, to).is_ok(), "{from:?} -> {to:?}");
        }
    }

    #[test]
    fn terminal_statuses_are_absorbing() {
        for from in [Completed, NoShow, Cancelled] {
            for to in [Waiting, InProgress, Completed, NoShow, Cancelled] {
                assert!(
                    validate_transition(from, to).is_err(),
                    "{from:?} -> {to:?} must be rejected"
                );
            }
        }
    }

    #[test]
    fn backward_and_skipping_steps_rejected() {
        for (from, to) in [
            (InProgress, Waiting),
            (Waiting, Completed),
            (InProgress, NoShow),
            (Waiting, Waiting),
            (InProgress, InProgress),
        ] {
            let err = validate_transition(from, to).unwrap_err();
            match err {
                QueueError::InvalidTransition { from: f, to: t } => {
                    assert_eq!(f, from);
                    assert_eq!(t, to);
                }
                other => panic!("Expected InvalidTransition, got: {other}"),
            }
        }
    }

    #[test]
    fn reachable_sets_match_the_graph() {
        assert_eq!(reachable_from(Waiting), vec![InProgress, NoShow, Cancelled]);
        assert_eq!(reachable_from(InProgress), vec![Completed, Cancelled]);
        assert!(reachable_from(Completed).is_empty());
        assert!(reachable_from(NoShow).is_empty());
        assert!(reachable_from(Cancelled).is_empty());
    }
}
