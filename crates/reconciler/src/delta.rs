//! Delta events as delivered by the transport.

use serde::{Deserialize, Serialize};

use crate::sequence::SequenceDescriptor;

/// One update of the session object.
///
/// A delta carries the sequence the server believed the client held before
/// the update (`base_sequence`) and the sequence after it (`sequence`). A
/// full snapshot has no `base_sequence`.
///
/// `payload` holds the domain fields; the reconciler never looks at it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaEvent<T> {
    /// Identity of the session object this event belongs to.
    #[serde(default)]
    pub session_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_sequence: Option<SequenceDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceDescriptor>,

    /// Endpoint that serves the deltas missed since this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resync_url: Option<String>,

    #[serde(default)]
    pub payload: T,
}

impl<T> DeltaEvent<T> {
    /// An incremental update from `base_sequence` to `sequence`.
    pub fn delta(
        session_url: impl Into<String>,
        base_sequence: SequenceDescriptor,
        sequence: SequenceDescriptor,
        payload: T,
    ) -> Self {
        Self {
            session_url: session_url.into(),
            base_sequence: Some(base_sequence),
            sequence: Some(sequence),
            resync_url: None,
            payload,
        }
    }

    /// A complete replacement of the session object.
    pub fn snapshot(session_url: impl Into<String>, sequence: SequenceDescriptor, payload: T) -> Self {
        Self {
            session_url: session_url.into(),
            base_sequence: None,
            sequence: Some(sequence),
            resync_url: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_resync_url(mut self, resync_url: impl Into<String>) -> Self {
        self.resync_url = Some(resync_url.into());
        self
    }

    /// Whether this event is a full snapshot rather than a delta.
    #[must_use]
    pub const fn is_snapshot(&self) -> bool {
        self.base_sequence.is_none()
    }

    /// Whether the event has the fields the reconciler needs.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.sequence.is_some()
    }

    /// An event without a sequence, or with an empty one, carries no history.
    #[must_use]
    pub fn has_empty_sequence(&self) -> bool {
        self.sequence
            .as_ref()
            .map_or(true, SequenceDescriptor::is_empty)
    }

    /// The state the reconciler starts from: no session, no history.
    #[must_use]
    pub fn empty() -> Self
    where
        T: Default,
    {
        Self::snapshot(String::new(), SequenceDescriptor::default(), T::default())
    }
}
