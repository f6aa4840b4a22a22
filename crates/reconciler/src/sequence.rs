//! Sequence descriptors and the metadata derived from them for comparison.

use serde::{Deserialize, Serialize};

/// A server-assigned version history of the session object.
///
/// `range_start..=range_end` is a compacted run of versions; `entries` are
/// the individual versions after (or outside) the range. The producer does
/// not guarantee `entries` is sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDescriptor {
    pub range_start: u64,
    pub range_end: u64,
    #[serde(default)]
    pub entries: Vec<u64>,
}

impl SequenceDescriptor {
    #[must_use]
    pub const fn new(range_start: u64, range_end: u64, entries: Vec<u64>) -> Self {
        Self {
            range_start,
            range_end,
            entries,
        }
    }

    /// A sequence made only of a compacted range.
    #[must_use]
    pub const fn range(range_start: u64, range_end: u64) -> Self {
        Self::new(range_start, range_end, Vec::new())
    }

    /// A sequence made only of individual entries.
    #[must_use]
    pub const fn entries(entries: Vec<u64>) -> Self {
        Self::new(0, 0, entries)
    }

    /// No range and no entries: nothing is known about the history yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.range_start == 0 && self.range_end == 0
    }

    /// The entry the server appended last.
    #[must_use]
    pub fn last_entry(&self) -> Option<u64> {
        self.entries.last().copied()
    }
}

/// Bounds extracted from a [`SequenceDescriptor`], plus the entries that
/// are unique to it relative to the sequence it is compared with.
///
/// A zero value stands for "absent": `min` falls back to the first entry when
/// there is no range start, `max` falls back to the range end when there is
/// no last entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SequenceMetadata<'a> {
    pub start: u64,
    pub end: u64,
    pub min: u64,
    pub max: u64,
    pub entries: &'a [u64],
    pub unique: Vec<u64>,
}

impl<'a> SequenceMetadata<'a> {
    pub(crate) fn extract(sequence: &'a SequenceDescriptor) -> Self {
        let first = sequence.entries.first().copied().unwrap_or(0);
        let last = sequence.entries.last().copied().unwrap_or(0);
        let start = sequence.range_start;
        let end = sequence.range_end;

        Self {
            start,
            end,
            min: if start != 0 { start } else { first },
            max: if last != 0 { last } else { end },
            entries: &sequence.entries,
            unique: Vec::new(),
        }
    }

    /// Extracts both sides and computes each side's unique entries against
    /// the other.
    pub(crate) fn pair(
        local: &'a SequenceDescriptor,
        incoming: &'a SequenceDescriptor,
    ) -> (Self, Self) {
        let mut local = Self::extract(local);
        let mut incoming = Self::extract(incoming);

        local.unique = unique_entries(local.entries, &incoming);
        incoming.unique = unique_entries(incoming.entries, &local);

        (local, incoming)
    }

    pub(crate) const fn has_range(&self) -> bool {
        self.start != 0 || self.end != 0
    }

    /// `end - min` as a signed span; a sequence whose entries sit above an
    /// absent range yields a negative span.
    pub(crate) fn span(&self) -> i128 {
        i128::from(self.end) - i128::from(self.min)
    }
}

/// Entries of `entries` that `other` does not list and that fall strictly
/// outside `other`'s range, sorted ascending.
fn unique_entries(entries: &[u64], other: &SequenceMetadata<'_>) -> Vec<u64> {
    let mut unique: Vec<u64> = entries
        .iter()
        .copied()
        .filter(|entry| !other.entries.contains(entry))
        .filter(|&entry| entry < other.start || entry > other.end)
        .collect();

    unique.sort_unstable();
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence() {
        assert!(SequenceDescriptor::default().is_empty());
        assert!(!SequenceDescriptor::range(1, 4).is_empty());
        assert!(!SequenceDescriptor::entries(vec![7]).is_empty());
        assert!(!SequenceDescriptor::range(0, 3).is_empty());
    }

    #[test]
    fn test_metadata_falls_back_to_entries_and_range() {
        let seq = SequenceDescriptor::new(0, 0, vec![5, 9]);
        let meta = SequenceMetadata::extract(&seq);
        assert_eq!(meta.min, 5, "min falls back to first entry");
        assert_eq!(meta.max, 9, "max is the last entry");

        let seq = SequenceDescriptor::range(3, 8);
        let meta = SequenceMetadata::extract(&seq);
        assert_eq!(meta.min, 3, "min is the range start");
        assert_eq!(meta.max, 8, "max falls back to range end");
    }

    #[test]
    fn test_metadata_uses_positional_first_and_last() {
        // Entries are not sorted by the producer; first/last are positional.
        let seq = SequenceDescriptor::entries(vec![12, 4, 10]);
        let meta = SequenceMetadata::extract(&seq);
        assert_eq!(meta.min, 12);
        assert_eq!(meta.max, 10);
    }

    #[test]
    fn test_unique_entries_exclude_shared_and_in_range() {
        let local = SequenceDescriptor::new(1, 10, vec![12, 20, 15]);
        let incoming = SequenceDescriptor::new(1, 15, vec![20]);

        let (local, incoming) = SequenceMetadata::pair(&local, &incoming);

        // 20 is shared, 12 and 15 sit inside incoming's 1..=15 range.
        assert!(local.unique.is_empty(), "got {:?}", local.unique);
        assert!(incoming.unique.is_empty(), "got {:?}", incoming.unique);
    }

    #[test]
    fn test_unique_entries_are_sorted_and_strict() {
        let local = SequenceDescriptor::new(0, 0, vec![40, 10, 30, 25]);
        let incoming = SequenceDescriptor::new(10, 25, vec![]);

        let (local, _) = SequenceMetadata::pair(&local, &incoming);

        // The range bounds themselves count as inside the range.
        assert_eq!(local.unique, vec![30, 40]);
    }

    #[test]
    fn test_span_can_be_negative() {
        let seq = SequenceDescriptor::entries(vec![5]);
        let meta = SequenceMetadata::extract(&seq);
        assert_eq!(meta.span(), -5);
    }
}
