//! Sequence comparison.
//!
//! Two sequences are compared by running an ordered list of rules; the first
//! rule that applies decides. The last rule always applies, so every pair of
//! sequences gets a [`Comparison`].

use core::cmp::Ordering;
use core::fmt;

use crate::sequence::{SequenceDescriptor, SequenceMetadata};

/// How the local sequence relates to the incoming one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    LocalNewer,
    IncomingNewer,
    /// The histories diverged and cannot be ordered incrementally.
    Desync,
}

impl Relation {
    /// The same relationship seen from the other side.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::LocalNewer => Self::IncomingNewer,
            Self::IncomingNewer => Self::LocalNewer,
            Self::Equal => Self::Equal,
            Self::Desync => Self::Desync,
        }
    }
}

/// The rule that produced a [`Comparison`], with its diagnostic code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Rule {
    /// `SO001`
    LocalAfterIncoming,
    /// `SO002`
    IncomingAfterLocal,
    /// `UR001`
    LocalLargerRange,
    /// `UR002`
    IncomingLargerRange,
    /// `UR003`
    SameRange,
    /// `UE001`
    LocalUniqueEntries,
    /// `UE002`
    IncomingUniqueEntries,
    /// `OOS001`
    OutOfSync {
        neither_has_range: bool,
        local_unique_overlap: bool,
        incoming_unique_overlap: bool,
    },
    /// `OOS002`
    LocalUniqueMinGreater,
    /// `OOS003`
    IncomingUniqueMinGreater,
}

impl Rule {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::LocalAfterIncoming => "SO001",
            Self::IncomingAfterLocal => "SO002",
            Self::LocalLargerRange => "UR001",
            Self::IncomingLargerRange => "UR002",
            Self::SameRange => "UR003",
            Self::LocalUniqueEntries => "UE001",
            Self::IncomingUniqueEntries => "UE002",
            Self::OutOfSync { .. } => "OOS001",
            Self::LocalUniqueMinGreater => "OOS002",
            Self::IncomingUniqueMinGreater => "OOS003",
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::LocalAfterIncoming => "sequence-overlap/local",
            Self::IncomingAfterLocal => "sequence-overlap/incoming",
            Self::LocalLargerRange => "unequal-ranges/local",
            Self::IncomingLargerRange => "unequal-ranges/incoming",
            Self::SameRange => "unequal-ranges/equal",
            Self::LocalUniqueEntries => "unique-entries/local",
            Self::IncomingUniqueEntries => "unique-entries/incoming",
            Self::OutOfSync { .. } => "out-of-sync/desync",
            Self::LocalUniqueMinGreater => "out-of-sync/local",
            Self::IncomingUniqueMinGreater => "out-of-sync/incoming",
        }
    }

    /// When this rule fires, in prose.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::LocalAfterIncoming => {
                "The earliest local sequence is more recent than the last incoming sequence."
            }
            Self::IncomingAfterLocal => {
                "The last local sequence is before the earliest incoming sequence."
            }
            Self::LocalLargerRange => {
                "Neither side has unique entries and the local sequence has the larger range."
            }
            Self::IncomingLargerRange => {
                "Neither side has unique entries and the incoming sequence has the larger range."
            }
            Self::SameRange => {
                "Neither side has unique entries and the ranges are absent or of the same size, \
                 so the sequences are equal."
            }
            Self::LocalUniqueEntries => {
                "The local sequence has entries outside the incoming sequence and the incoming \
                 sequence has none outside the local one."
            }
            Self::IncomingUniqueEntries => {
                "The incoming sequence has entries outside the local sequence and the local \
                 sequence has none outside the incoming one."
            }
            Self::OutOfSync { .. } => {
                "Neither sequence has a range, or the unique entries of one side fall inside \
                 the total range of the other."
            }
            Self::LocalUniqueMinGreater => {
                "The smallest local unique entry is greater than the smallest incoming unique entry."
            }
            Self::IncomingUniqueMinGreater => "None of the other rules applied.",
        }
    }

    /// The condition this rule tests.
    #[must_use]
    pub const fn logic(&self) -> &'static str {
        match self {
            Self::LocalAfterIncoming => "local.min > incoming.max",
            Self::IncomingAfterLocal => "local.max < incoming.min",
            Self::LocalLargerRange => "localSpan > incomingSpan",
            Self::IncomingLargerRange => "localSpan < incomingSpan",
            Self::SameRange => "localSpan == incomingSpan",
            Self::LocalUniqueEntries => "localIsUnique && !incomingIsUnique",
            Self::IncomingUniqueEntries => "!localIsUnique && incomingIsUnique",
            Self::OutOfSync { .. } => {
                "neitherHasRange || localUniqueOverlap || incomingUniqueOverlap"
            }
            Self::LocalUniqueMinGreater => "localUniqueMin > incomingUniqueMin",
            Self::IncomingUniqueMinGreater => "else (catch all)",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())?;

        if let Self::OutOfSync {
            neither_has_range,
            local_unique_overlap,
            incoming_unique_overlap,
        } = self
        {
            write!(
                f,
                ":{},{},{}",
                u8::from(*neither_has_range),
                u8::from(*local_unique_overlap),
                u8::from(*incoming_unique_overlap)
            )?;
        }

        Ok(())
    }
}

/// The outcome of comparing two sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub relation: Relation,
    pub rule: Rule,
}

impl Comparison {
    const fn new(relation: Relation, rule: Rule) -> Self {
        Self { relation, rule }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.relation, self.rule)
    }
}

type SequenceRule = fn(&SequenceMetadata<'_>, &SequenceMetadata<'_>) -> Option<Comparison>;

/// Comparison rules in priority order. The last one never returns `None`.
const RULES: [SequenceRule; 4] = [
    check_sequence_overlap,
    check_unequal_ranges,
    check_unique_entries,
    check_out_of_sync,
];

/// Compares the `local` sequence against the `incoming` one.
#[must_use]
pub fn compare_sequences(local: &SequenceDescriptor, incoming: &SequenceDescriptor) -> Comparison {
    let (local, incoming) = SequenceMetadata::pair(local, incoming);

    RULES
        .iter()
        .find_map(|rule| rule(&local, &incoming))
        .unwrap_or_else(|| resolve_out_of_sync(&local, &incoming))
}

/// Rule A: one side's whole history lies after the other's.
fn check_sequence_overlap(
    local: &SequenceMetadata<'_>,
    incoming: &SequenceMetadata<'_>,
) -> Option<Comparison> {
    if local.min > incoming.max {
        return Some(Comparison::new(
            Relation::LocalNewer,
            Rule::LocalAfterIncoming,
        ));
    }

    if local.max < incoming.min {
        return Some(Comparison::new(
            Relation::IncomingNewer,
            Rule::IncomingAfterLocal,
        ));
    }

    None
}

/// Rule B: without unique entries on either side, the wider span wins.
fn check_unequal_ranges(
    local: &SequenceMetadata<'_>,
    incoming: &SequenceMetadata<'_>,
) -> Option<Comparison> {
    if !local.unique.is_empty() || !incoming.unique.is_empty() {
        return None;
    }

    let comparison = match local.span().cmp(&incoming.span()) {
        Ordering::Greater => {
            Comparison::new(Relation::LocalNewer, Rule::LocalLargerRange)
        }
        Ordering::Less => {
            Comparison::new(Relation::IncomingNewer, Rule::IncomingLargerRange)
        }
        Ordering::Equal => Comparison::new(Relation::Equal, Rule::SameRange),
    };

    Some(comparison)
}

/// Rule C: the only side holding unique entries wins.
fn check_unique_entries(
    local: &SequenceMetadata<'_>,
    incoming: &SequenceMetadata<'_>,
) -> Option<Comparison> {
    match (local.unique.is_empty(), incoming.unique.is_empty()) {
        (false, true) => Some(Comparison::new(
            Relation::LocalNewer,
            Rule::LocalUniqueEntries,
        )),
        (true, false) => Some(Comparison::new(
            Relation::IncomingNewer,
            Rule::IncomingUniqueEntries,
        )),
        _ => None,
    }
}

/// Rule D: catch-all.
fn check_out_of_sync(
    local: &SequenceMetadata<'_>,
    incoming: &SequenceMetadata<'_>,
) -> Option<Comparison> {
    Some(resolve_out_of_sync(local, incoming))
}

fn resolve_out_of_sync(
    local: &SequenceMetadata<'_>,
    incoming: &SequenceMetadata<'_>,
) -> Comparison {
    let overlaps = |unique: &[u64], min: u64, max: u64| {
        unique.iter().any(|&entry| min < entry && entry < max)
    };

    let neither_has_range = !local.has_range() && !incoming.has_range();
    let local_unique_overlap = overlaps(&local.unique, incoming.min, incoming.max);
    let incoming_unique_overlap = overlaps(&incoming.unique, local.min, local.max);

    if neither_has_range || local_unique_overlap || incoming_unique_overlap {
        return Comparison::new(
            Relation::Desync,
            Rule::OutOfSync {
                neither_has_range,
                local_unique_overlap,
                incoming_unique_overlap,
            },
        );
    }

    match (local.unique.first(), incoming.unique.first()) {
        (Some(local_min), Some(incoming_min)) if local_min > incoming_min => {
            Comparison::new(Relation::LocalNewer, Rule::LocalUniqueMinGreater)
        }
        _ => Comparison::new(Relation::IncomingNewer, Rule::IncomingUniqueMinGreater),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> SequenceDescriptor {
        SequenceDescriptor::range(start, end)
    }

    fn seq(start: u64, end: u64, entries: &[u64]) -> SequenceDescriptor {
        SequenceDescriptor::new(start, end, entries.to_vec())
    }

    #[test]
    fn test_disjoint_ranges() {
        let result = compare_sequences(&seq(0, 0, &[10, 11]), &seq(0, 0, &[5, 6]));
        assert_eq!(result.relation, Relation::LocalNewer);
        assert_eq!(result.rule, Rule::LocalAfterIncoming);

        let result = compare_sequences(&seq(0, 0, &[5, 6]), &seq(0, 0, &[10, 11]));
        assert_eq!(result.relation, Relation::IncomingNewer);
        assert_eq!(result.rule, Rule::IncomingAfterLocal);
    }

    #[test]
    fn test_wider_range_wins() {
        let result = compare_sequences(&range(1, 4), &range(1, 5));
        assert_eq!(result.relation, Relation::IncomingNewer);
        assert_eq!(result.rule.code(), "UR002");

        let result = compare_sequences(&range(1, 9), &range(1, 5));
        assert_eq!(result.relation, Relation::LocalNewer);
        assert_eq!(result.rule.code(), "UR001");
    }

    #[test]
    fn test_identical_sequences_are_equal() {
        let a = seq(1, 10, &[12, 14]);
        let result = compare_sequences(&a, &a.clone());
        assert_eq!(result.relation, Relation::Equal);
        assert_eq!(result.rule, Rule::SameRange);
    }

    #[test]
    fn test_unique_entries_win() {
        // Incoming knows about 16 which local has never seen.
        let local = seq(1, 10, &[12, 14]);
        let incoming = seq(1, 10, &[12, 14, 16]);

        let result = compare_sequences(&local, &incoming);
        assert_eq!(result.relation, Relation::IncomingNewer);
        assert_eq!(result.rule, Rule::IncomingUniqueEntries);

        let result = compare_sequences(&incoming, &local);
        assert_eq!(result.relation, Relation::LocalNewer);
        assert_eq!(result.rule, Rule::LocalUniqueEntries);
    }

    #[test]
    fn test_entries_only_sequences_desync() {
        // Both sides have unique entries and neither has a range.
        let result = compare_sequences(&seq(0, 0, &[1, 3, 5]), &seq(0, 0, &[1, 4, 5]));
        assert_eq!(result.relation, Relation::Desync);
        assert_eq!(result.to_string(), "Desync:OOS001:1,1,1");
    }

    #[test]
    fn test_unique_overlap_desync() {
        // Local 22 lies past incoming's range but inside its total span
        // 10..30, yet incoming never saw it.
        let local = seq(1, 9, &[22, 40]);
        let incoming = seq(10, 20, &[25, 30]);

        let result = compare_sequences(&local, &incoming);
        assert_eq!(result.relation, Relation::Desync);
        assert!(matches!(
            result.rule,
            Rule::OutOfSync {
                neither_has_range: false,
                local_unique_overlap: true,
                ..
            }
        ));
    }

    #[test]
    fn test_unique_minimum_decides() {
        // Unique entries that stay clear of the other side's total span.
        let local = seq(1, 5, &[20, 6]);
        let incoming = seq(1, 5, &[6, 7]);

        let result = compare_sequences(&local, &incoming);
        assert_eq!(result.relation, Relation::LocalNewer);
        assert_eq!(result.rule, Rule::LocalUniqueMinGreater);

        let result = compare_sequences(&incoming, &local);
        assert_eq!(result.relation, Relation::IncomingNewer);
        assert_eq!(result.rule, Rule::IncomingUniqueMinGreater);
    }

    #[test]
    fn test_comparison_is_symmetric() {
        let samples = [
            SequenceDescriptor::default(),
            range(1, 4),
            range(1, 5),
            range(3, 8),
            seq(1, 10, &[12, 14]),
            seq(1, 10, &[12, 14, 16]),
            seq(1, 9, &[22, 40]),
            seq(10, 20, &[25, 30]),
            seq(0, 0, &[1, 3, 5]),
            seq(0, 0, &[1, 4, 5]),
            seq(1, 5, &[20, 6]),
            seq(1, 5, &[6, 7]),
            seq(0, 0, &[10, 11]),
            seq(0, 0, &[5, 6]),
        ];

        for a in &samples {
            for b in &samples {
                let forward = compare_sequences(a, b).relation;
                let backward = compare_sequences(b, a).relation;
                assert_eq!(
                    forward,
                    backward.reverse(),
                    "compare({a:?}, {b:?}) = {forward:?} but reverse gave {backward:?}"
                );
            }
        }
    }

    #[test]
    fn test_rule_debug_info() {
        let rule = Rule::OutOfSync {
            neither_has_range: false,
            local_unique_overlap: false,
            incoming_unique_overlap: true,
        };
        assert_eq!(rule.to_string(), "OOS001:0,0,1");
        assert_eq!(rule.title(), "out-of-sync/desync");
        assert!(!rule.description().is_empty());
        assert_eq!(Rule::SameRange.logic(), "localSpan == incomingSpan");
    }
}
