//! Comparison of full snapshots when no incremental history is available.

use crate::sequence::SequenceDescriptor;

/// Whether the `incoming` snapshot should replace the `current` one.
///
/// Only the last entry of each sequence is compared, since the server hands
/// out sequence numbers in increasing order. A missing or empty sequence on
/// either side, or a tie, lets the incoming snapshot win.
#[must_use]
pub fn is_newer_snapshot(
    current: Option<&SequenceDescriptor>,
    incoming: Option<&SequenceDescriptor>,
) -> bool {
    let current = current.and_then(SequenceDescriptor::last_entry);
    let incoming = incoming.and_then(SequenceDescriptor::last_entry);

    match (current, incoming) {
        (Some(current), Some(incoming)) => incoming >= current,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(entries: &[u64]) -> SequenceDescriptor {
        SequenceDescriptor::entries(entries.to_vec())
    }

    #[test]
    fn test_larger_last_entry_wins() {
        assert!(is_newer_snapshot(Some(&entries(&[1, 2])), Some(&entries(&[3]))));
        assert!(!is_newer_snapshot(Some(&entries(&[1, 9])), Some(&entries(&[2, 4]))));
    }

    #[test]
    fn test_only_last_entry_counts() {
        // The first entries would say otherwise.
        assert!(is_newer_snapshot(Some(&entries(&[50, 6])), Some(&entries(&[1, 7]))));
    }

    #[test]
    fn test_ties_and_empties_prefer_incoming() {
        assert!(is_newer_snapshot(Some(&entries(&[4])), Some(&entries(&[4]))));
        assert!(is_newer_snapshot(Some(&entries(&[])), Some(&entries(&[1]))));
        assert!(is_newer_snapshot(Some(&entries(&[8])), Some(&entries(&[]))));
        assert!(is_newer_snapshot(None, Some(&entries(&[1]))));
        assert!(is_newer_snapshot(Some(&entries(&[1])), None));
        // A range without entries says nothing about the latest version.
        assert!(is_newer_snapshot(
            Some(&SequenceDescriptor::range(1, 100)),
            Some(&SequenceDescriptor::range(1, 2))
        ));
    }
}
