//! Delta reconciliation for a remotely owned session object
//!
//! The server streams updates of a session object as deltas, each tagged
//! with the version history before (`baseSequence`) and after (`sequence`)
//! the update. Deltas may arrive late, out of order or from a history that
//! no longer matches ours. This crate decides, delta by delta, whether to
//! adopt it, drop it, hold it until its predecessor shows up, or give up and
//! ask for a full resync.
//!
//! ## Core Concepts
//!
//! - **SequenceDescriptor**: a compacted range of versions plus loose entries
//! - **compare_sequences**: ordered rule set relating two sequences
//! - **classify**: turns comparisons into an [`Action`] for one delta
//! - **Reconciler**: owns the working copy, pending deltas and recovery timer
//! - **runtime**: runs a `Reconciler` on a tokio task
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application.

pub mod buffer;
pub mod classify;
pub mod compare;
pub mod config;
pub mod delta;
pub mod engine;
pub mod runtime;
pub mod sequence;
pub mod snapshot;
pub mod timer;

pub use buffer::{delta_order, OrderedBuffer};
pub use classify::{classify, Action, ClassifyError, Reason, Resolution, Side};
pub use compare::{compare_sequences, Comparison, Relation, Rule};
pub use config::ReconcilerConfig;
pub use delta::DeltaEvent;
pub use engine::{DeltaHandler, EngineStatus, Reconciler, ReconcilerStats, ResyncTarget};
pub use runtime::{spawn, ReconcilerHandle, RuntimeError};
pub use sequence::SequenceDescriptor;
pub use snapshot::is_newer_snapshot;
pub use timer::RecoveryTimer;
