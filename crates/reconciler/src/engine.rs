//! The reconciliation engine.
//!
//! [`Reconciler`] owns the working copy, the buffer of pending deltas, a
//! status flag and the recovery timer. Every call runs to completion
//! synchronously; the only deferred work is the recovery deadline, which the
//! caller fires through [`Reconciler::poll_recovery`].

use core::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::buffer::OrderedBuffer;
use crate::classify::{classify, Action};
use crate::config::ReconcilerConfig;
use crate::delta::DeltaEvent;
use crate::snapshot::is_newer_snapshot;
use crate::timer::RecoveryTimer;

/// Where the engine is in its processing cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Nothing pending.
    #[default]
    Idle,
    /// Draining the buffer.
    Working,
    /// Waiting for an external resync and a call to `resume`.
    Paused,
    /// The head of the buffer waits for a predecessor that has not arrived.
    Blocked,
}

/// Receives every decision the engine takes.
///
/// For adopted events the handler sees the new working copy; for a forced
/// desync it sees the working copy the engine gave up on.
pub trait DeltaHandler<T> {
    fn handle(&mut self, action: Action, event: &DeltaEvent<T>);
}

impl<T, F> DeltaHandler<T> for F
where
    F: FnMut(Action, &DeltaEvent<T>),
{
    fn handle(&mut self, action: Action, event: &DeltaEvent<T>) {
        self(action, event);
    }
}

/// What the domain layer should fetch to recover from a desync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResyncTarget {
    /// Deltas missed since the working copy, from its resync url.
    Delta(String),
    /// The whole session object.
    Full(String),
}

/// Counters over the engine's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerStats {
    pub received: u64,
    pub accepted: u64,
    pub kept_current: u64,
    pub waits: u64,
    pub desyncs: u64,
    pub forced_desyncs: u64,
    pub discarded: u64,
    pub snapshots_adopted: u64,
    pub snapshots_ignored: u64,
    pub pending: usize,
}

#[derive(Clone, Copy, Debug)]
enum DesyncCause {
    RecoveryTimeout,
    Backlog,
}

fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}

pub struct Reconciler<T, H> {
    config: ReconcilerConfig,
    handler: H,
    working_copy: DeltaEvent<T>,
    pending: OrderedBuffer<DeltaEvent<T>>,
    status: EngineStatus,
    timer: RecoveryTimer,
    stats: ReconcilerStats,
}

impl<T: fmt::Debug, H> fmt::Debug for Reconciler<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("working_copy", &self.working_copy)
            .field("pending", &self.pending)
            .field("status", &self.status)
            .field("timer", &self.timer)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<T, H: DeltaHandler<T>> Reconciler<T, H> {
    /// Creates an idle engine with an empty working copy.
    pub fn new(config: ReconcilerConfig, handler: H) -> Self
    where
        T: Default,
    {
        Self::with_working_copy(config, handler, DeltaEvent::empty())
    }

    /// Creates an idle engine that starts from a known working copy, e.g.
    /// a session object restored from an earlier fetch.
    pub fn with_working_copy(
        config: ReconcilerConfig,
        handler: H,
        working_copy: DeltaEvent<T>,
    ) -> Self {
        Self {
            timer: RecoveryTimer::new(config.recovery_base, config.recovery_jitter),
            config,
            handler,
            working_copy,
            pending: OrderedBuffer::default(),
            status: EngineStatus::Idle,
            stats: ReconcilerStats::default(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> EngineStatus {
        self.status
    }

    #[must_use]
    pub const fn working_copy(&self) -> &DeltaEvent<T> {
        &self.working_copy
    }

    /// Number of deltas waiting in the buffer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn stats(&self) -> ReconcilerStats {
        ReconcilerStats {
            pending: self.pending.len(),
            ..self.stats
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// When the running recovery timer expires, if any.
    #[must_use]
    pub const fn recovery_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Delta resync from the working copy's resync url when it has one,
    /// full resync of the session object otherwise.
    #[must_use]
    pub fn resync_target(&self) -> ResyncTarget {
        self.working_copy.resync_url.as_ref().map_or_else(
            || ResyncTarget::Full(self.working_copy.session_url.clone()),
            |url| ResyncTarget::Delta(url.clone()),
        )
    }

    /// Queues a delta and processes as much as the current status allows.
    pub fn submit(&mut self, event: DeltaEvent<T>) {
        bump(&mut self.stats.received);
        self.pending.enqueue(event);

        match self.status {
            EngineStatus::Idle => {
                self.set_status(EngineStatus::Working);
                self.drain();
            }
            EngineStatus::Blocked => {
                if self.pending.len() > self.config.max_blocked_backlog {
                    self.force_desync(DesyncCause::Backlog);
                    return;
                }

                let _ = self.step();

                if self.status == EngineStatus::Working {
                    self.drain();
                }
            }
            EngineStatus::Working | EngineStatus::Paused => {}
        }
    }

    /// Adopts a full snapshot if it is at least as new as the working copy.
    ///
    /// Returns whether the snapshot replaced the working copy. The status is
    /// left alone; after a resync the caller follows up with [`Self::resume`].
    pub fn submit_full_snapshot(&mut self, snapshot: DeltaEvent<T>) -> bool {
        if !snapshot.is_well_formed() {
            debug!(session_url = %snapshot.session_url, "discarding snapshot without sequence");
            bump(&mut self.stats.discarded);
            return false;
        }

        if !is_newer_snapshot(
            self.working_copy.sequence.as_ref(),
            snapshot.sequence.as_ref(),
        ) {
            info!(session_url = %snapshot.session_url, "ignoring outdated snapshot");
            bump(&mut self.stats.snapshots_ignored);
            self.handler.handle(Action::UseCurrent, &snapshot);
            return false;
        }

        info!(session_url = %snapshot.session_url, "adopting snapshot");
        bump(&mut self.stats.snapshots_adopted);
        self.working_copy = snapshot;
        self.handler.handle(Action::UseIncoming, &self.working_copy);

        true
    }

    /// Stops processing until [`Self::resume`].
    pub fn pause(&mut self) {
        info!(status = ?self.status, pending = self.pending.len(), "pausing reconciler");
        self.cancel_recovery();
        self.set_status(EngineStatus::Paused);
    }

    /// Restarts processing and drains whatever queued up meanwhile.
    pub fn resume(&mut self) {
        info!(status = ?self.status, pending = self.pending.len(), "resuming reconciler");
        self.set_status(EngineStatus::Working);
        self.drain();
    }

    /// Fires the recovery timer if its deadline has passed.
    ///
    /// Returns whether it fired.
    pub fn poll_recovery(&mut self, now: Instant) -> bool {
        if !self.timer.is_expired(now) {
            return false;
        }

        self.on_recovery_timeout();
        true
    }

    /// The recovery timer expired: give up waiting if still blocked.
    pub fn on_recovery_timeout(&mut self) {
        let _ = self.timer.cancel();

        if self.status != EngineStatus::Blocked {
            debug!(status = ?self.status, "recovery timer expired while not blocked");
            return;
        }

        self.force_desync(DesyncCause::RecoveryTimeout);
    }

    fn drain(&mut self) {
        while self.status == EngineStatus::Working {
            if !self.step() {
                break;
            }
        }

        if self.status == EngineStatus::Working && self.pending.is_empty() {
            self.cancel_recovery();
            self.set_status(EngineStatus::Idle);
        }
    }

    /// Classifies the head of the buffer. Returns `false` if it was empty.
    fn step(&mut self) -> bool {
        let Some(event) = self.pending.dequeue() else {
            return false;
        };

        let resolution = match classify(&self.working_copy, &event) {
            Ok(resolution) => resolution,
            Err(err) => {
                debug!(session_url = %event.session_url, %err, "discarding malformed delta");
                bump(&mut self.stats.discarded);
                return true;
            }
        };

        debug!(
            session_url = %event.session_url,
            action = ?resolution.action,
            reason = %resolution.reason,
            pending = self.pending.len(),
            "classified delta"
        );

        self.apply(resolution.action, event);

        true
    }

    fn apply(&mut self, action: Action, event: DeltaEvent<T>) {
        match action {
            Action::UseIncoming | Action::SessionIdentityChanged => {
                self.cancel_recovery();
                self.unblock();
                bump(&mut self.stats.accepted);
                self.working_copy = event;
                self.handler.handle(action, &self.working_copy);
            }
            Action::UseCurrent => {
                // Nothing moved forward, so a blocked head keeps its deadline.
                self.unblock();
                bump(&mut self.stats.kept_current);
                self.handler.handle(action, &event);
            }
            Action::Desync => {
                self.cancel_recovery();
                self.set_status(EngineStatus::Paused);
                bump(&mut self.stats.desyncs);
                self.handler.handle(action, &event);
            }
            Action::Wait => {
                bump(&mut self.stats.waits);
                self.handler.handle(action, &event);
                self.pending.enqueue(event);
                self.set_status(EngineStatus::Blocked);

                if self.timer.start(Instant::now()) {
                    debug!(deadline = ?self.timer.deadline(), "recovery timer started");
                }
            }
        }
    }

    fn force_desync(&mut self, cause: DesyncCause) {
        self.cancel_recovery();
        self.set_status(EngineStatus::Paused);
        bump(&mut self.stats.forced_desyncs);

        warn!(
            session_url = %self.working_copy.session_url,
            ?cause,
            pending = self.pending.len(),
            "forcing desync"
        );

        self.handler.handle(Action::Desync, &self.working_copy);
    }

    fn unblock(&mut self) {
        if self.status == EngineStatus::Blocked {
            self.set_status(EngineStatus::Working);
        }
    }

    fn cancel_recovery(&mut self) {
        if self.timer.cancel() {
            debug!("recovery timer cancelled");
        }
    }

    fn set_status(&mut self, status: EngineStatus) {
        if self.status == status {
            return;
        }

        match status {
            EngineStatus::Paused | EngineStatus::Blocked => {
                info!(from = ?self.status, to = ?status, pending = self.pending.len(), "status changed");
            }
            EngineStatus::Idle | EngineStatus::Working => {
                debug!(from = ?self.status, to = ?status, "status changed");
            }
        }

        self.status = status;
    }
}
