//! Turns a sequence comparison into the action the engine takes for a delta.

use core::fmt;

use thiserror::Error;

use crate::compare::{compare_sequences, Comparison, Relation};
use crate::delta::DeltaEvent;

/// What to do with an incoming event relative to the working copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// The incoming event supersedes the working copy.
    UseIncoming,
    /// The working copy is as new or newer; drop the incoming event.
    UseCurrent,
    /// A predecessor of the incoming delta has not arrived yet.
    Wait,
    /// Local and remote history diverged; a full resync is required.
    Desync,
    /// The incoming event is newer and belongs to a different session
    /// object, so identity-scoped state must be reset before adopting it.
    SessionIdentityChanged,
}

impl Action {
    /// Maps a plain sequence comparison onto an action.
    #[must_use]
    pub const fn from_relation(relation: Relation) -> Self {
        match relation {
            Relation::Equal | Relation::LocalNewer => Self::UseCurrent,
            Relation::IncomingNewer => Self::UseIncoming,
            Relation::Desync => Self::Desync,
        }
    }
}

/// Why an action was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Reason {
    /// One side carried no history, anything beats nothing.
    EmptySequence,
    /// Decided by comparing the working copy against the incoming sequence.
    Sequence(Comparison),
    /// Decided by comparing the working copy against the delta's base.
    Base {
        sequence: Comparison,
        base: Comparison,
    },
    /// The delta's base equals its sequence: the server asked for a resync.
    ResyncRequested { base: Comparison },
    /// The newer event carries another session url.
    SessionChanged(Comparison),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySequence => f.write_str("empty-sequence"),
            Self::Sequence(comparison) => write!(f, "sequence={comparison}"),
            Self::Base { sequence, base } => write!(f, "sequence={sequence} base={base}"),
            Self::ResyncRequested { base } => write!(f, "resync-requested base={base}"),
            Self::SessionChanged(comparison) => write!(f, "session-changed sequence={comparison}"),
        }
    }
}

/// The classifier's verdict for one incoming event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub action: Action,
    pub reason: Reason,
}

impl Resolution {
    const fn new(action: Action, reason: Reason) -> Self {
        Self { action, reason }
    }
}

/// Which side of a classification is missing its sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    WorkingCopy,
    Incoming,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkingCopy => f.write_str("working copy"),
            Self::Incoming => f.write_str("incoming event"),
        }
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClassifyError {
    #[error("{side} has no sequence")]
    MissingSequence { side: Side },
}

/// Decides what to do with `incoming` given the current `working_copy`.
pub fn classify<T>(
    working_copy: &DeltaEvent<T>,
    incoming: &DeltaEvent<T>,
) -> Result<Resolution, ClassifyError> {
    let Some(current) = working_copy.sequence.as_ref() else {
        return Err(ClassifyError::MissingSequence {
            side: Side::WorkingCopy,
        });
    };
    let Some(sequence) = incoming.sequence.as_ref() else {
        return Err(ClassifyError::MissingSequence {
            side: Side::Incoming,
        });
    };

    if current.is_empty() || sequence.is_empty() {
        return Ok(Resolution::new(Action::UseIncoming, Reason::EmptySequence));
    }

    let compared = compare_sequences(current, sequence);

    let Some(base) = incoming.base_sequence.as_ref() else {
        return Ok(Resolution::new(
            Action::from_relation(compared.relation),
            Reason::Sequence(compared),
        ));
    };

    if compared.relation != Relation::IncomingNewer {
        return Ok(Resolution::new(
            Action::from_relation(compared.relation),
            Reason::Sequence(compared),
        ));
    }

    if incoming.session_url != working_copy.session_url {
        return Ok(Resolution::new(
            Action::SessionIdentityChanged,
            Reason::SessionChanged(compared),
        ));
    }

    let against_base = compare_sequences(current, base);
    let reason = Reason::Base {
        sequence: compared,
        base: against_base,
    };

    let resolution = match against_base.relation {
        Relation::LocalNewer | Relation::Equal => Resolution::new(Action::UseIncoming, reason),
        Relation::IncomingNewer => {
            if compare_sequences(base, sequence).relation == Relation::Equal {
                Resolution::new(
                    Action::Desync,
                    Reason::ResyncRequested { base: against_base },
                )
            } else {
                Resolution::new(Action::Wait, reason)
            }
        }
        Relation::Desync => Resolution::new(Action::Desync, reason),
    };

    Ok(resolution)
}
