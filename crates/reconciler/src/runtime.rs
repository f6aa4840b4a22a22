//! Drives a [`Reconciler`] from a tokio task.
//!
//! The engine is moved into the task and fed through a command channel; the
//! task also sleeps until the engine's recovery deadline so a blocked engine
//! gives up on its own.

use core::fmt;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::delta::DeltaEvent;
use crate::engine::{DeltaHandler, EngineStatus, Reconciler, ReconcilerStats};

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("reconciler task is no longer running")]
    Closed,
}

enum Command<T> {
    Submit(DeltaEvent<T>),
    SubmitFullSnapshot(DeltaEvent<T>, oneshot::Sender<bool>),
    Pause,
    Resume,
    Status(oneshot::Sender<EngineStatus>),
    Stats(oneshot::Sender<ReconcilerStats>),
}

/// Cloneable access to a spawned reconciler.
///
/// The task stops once every handle is dropped.
pub struct ReconcilerHandle<T> {
    tx: mpsc::Sender<Command<T>>,
}

impl<T> Clone for ReconcilerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for ReconcilerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerHandle")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T> ReconcilerHandle<T> {
    pub async fn submit(&self, event: DeltaEvent<T>) -> Result<(), RuntimeError> {
        self.send(Command::Submit(event)).await
    }

    /// Returns whether the snapshot replaced the working copy.
    pub async fn submit_full_snapshot(&self, snapshot: DeltaEvent<T>) -> Result<bool, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SubmitFullSnapshot(snapshot, reply))
            .await?;
        response.await.map_err(|_| RuntimeError::Closed)
    }

    pub async fn pause(&self) -> Result<(), RuntimeError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RuntimeError> {
        self.send(Command::Resume).await
    }

    pub async fn status(&self) -> Result<EngineStatus, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status(reply)).await?;
        response.await.map_err(|_| RuntimeError::Closed)
    }

    pub async fn stats(&self) -> Result<ReconcilerStats, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Stats(reply)).await?;
        response.await.map_err(|_| RuntimeError::Closed)
    }

    async fn send(&self, command: Command<T>) -> Result<(), RuntimeError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::Closed)
    }
}

/// Moves `engine` into a new task.
///
/// The returned [`JoinHandle`] yields the engine back after the last
/// [`ReconcilerHandle`] is dropped.
pub fn spawn<T, H>(engine: Reconciler<T, H>) -> (ReconcilerHandle<T>, JoinHandle<Reconciler<T, H>>)
where
    T: Send + 'static,
    H: DeltaHandler<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(engine.config().command_capacity.max(1));
    let task = tokio::spawn(run(engine, rx));

    (ReconcilerHandle { tx }, task)
}

async fn run<T, H>(
    mut engine: Reconciler<T, H>,
    mut rx: mpsc::Receiver<Command<T>>,
) -> Reconciler<T, H>
where
    H: DeltaHandler<T>,
{
    loop {
        let deadline = engine.recovery_deadline();

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    debug!("all reconciler handles dropped, stopping");
                    break;
                };

                execute(&mut engine, command);
            }
            () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let _ = engine.poll_recovery(Instant::now());
            }
        }
    }

    engine
}

fn execute<T, H>(engine: &mut Reconciler<T, H>, command: Command<T>)
where
    H: DeltaHandler<T>,
{
    match command {
        Command::Submit(event) => engine.submit(event),
        Command::SubmitFullSnapshot(snapshot, reply) => {
            let _ = reply.send(engine.submit_full_snapshot(snapshot));
        }
        Command::Pause => engine.pause(),
        Command::Resume => engine.resume(),
        Command::Status(reply) => {
            let _ = reply.send(engine.status());
        }
        Command::Stats(reply) => {
            let _ = reply.send(engine.stats());
        }
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use super::*;
    use crate::classify::Action;
    use crate::config::ReconcilerConfig;
    use crate::sequence::SequenceDescriptor;

    const URL: &str = "https://example.com/loci/1";

    fn delta(base: (u64, u64), seq: (u64, u64)) -> DeltaEvent<()> {
        DeltaEvent::delta(
            URL,
            SequenceDescriptor::range(base.0, base.1),
            SequenceDescriptor::range(seq.0, seq.1),
            (),
        )
    }

    type Spawned = (
        ReconcilerHandle<()>,
        JoinHandle<Reconciler<(), Box<dyn FnMut(Action, &DeltaEvent<()>) + Send>>>,
        UnboundedReceiver<Action>,
    );

    fn spawn_recording() -> Spawned {
        let (actions_tx, actions_rx) = unbounded_channel();

        let handler: Box<dyn FnMut(Action, &DeltaEvent<()>) + Send> =
            Box::new(move |action, _event: &DeltaEvent<()>| {
                let _ = actions_tx.send(action);
            });

        let (handle, task) = spawn(Reconciler::new(ReconcilerConfig::default(), handler));

        (handle, task, actions_rx)
    }

    fn drain_actions(rx: &mut UnboundedReceiver<Action>) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Ok(action) = rx.try_recv() {
            actions.push(action);
        }
        actions
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_engine_desyncs_after_recovery_timeout() {
        let (handle, _task, mut actions) = spawn_recording();

        handle.submit(delta((1, 3), (1, 4))).await.unwrap();
        handle.submit(delta((1, 7), (1, 8))).await.unwrap();

        assert_eq!(handle.status().await.unwrap(), EngineStatus::Blocked);
        assert_eq!(drain_actions(&mut actions), vec![Action::UseIncoming, Action::Wait]);

        time::sleep(Duration::from_millis(9_999)).await;
        assert_eq!(
            handle.status().await.unwrap(),
            EngineStatus::Blocked,
            "must not give up before the base delay"
        );
        assert!(drain_actions(&mut actions).is_empty());

        time::sleep(Duration::from_millis(5_002)).await;
        assert_eq!(
            handle.status().await.unwrap(),
            EngineStatus::Paused,
            "must give up within base + jitter"
        );
        assert_eq!(drain_actions(&mut actions), vec![Action::Desync]);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.forced_desyncs, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_delta_cancels_recovery() {
        let (handle, _task, mut actions) = spawn_recording();

        handle.submit(delta((1, 3), (1, 4))).await.unwrap();
        handle.submit(delta((1, 5), (1, 6))).await.unwrap();
        assert_eq!(handle.status().await.unwrap(), EngineStatus::Blocked);

        time::sleep(Duration::from_secs(5)).await;
        handle.submit(delta((1, 4), (1, 5))).await.unwrap();
        assert_eq!(handle.status().await.unwrap(), EngineStatus::Idle);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.status().await.unwrap(), EngineStatus::Idle);
        assert_eq!(
            drain_actions(&mut actions),
            vec![
                Action::UseIncoming,
                Action::Wait,
                Action::UseIncoming,
                Action::UseIncoming
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_through_handle() {
        let (handle, _task, mut actions) = spawn_recording();

        handle.submit(delta((1, 3), (1, 4))).await.unwrap();
        handle.submit(delta((1, 8), (1, 8))).await.unwrap();
        assert_eq!(handle.status().await.unwrap(), EngineStatus::Paused);

        let snapshot =
            DeltaEvent::snapshot(URL, SequenceDescriptor::new(1, 8, vec![9]), ());
        assert!(handle.submit_full_snapshot(snapshot).await.unwrap());

        handle.resume().await.unwrap();
        handle
            .submit(DeltaEvent::delta(
                URL,
                SequenceDescriptor::new(1, 8, vec![9]),
                SequenceDescriptor::new(1, 8, vec![9, 10]),
                (),
            ))
            .await
            .unwrap();
        assert_eq!(handle.status().await.unwrap(), EngineStatus::Idle);

        assert_eq!(
            drain_actions(&mut actions),
            vec![
                Action::UseIncoming,
                Action::Desync,
                Action::UseIncoming,
                Action::UseIncoming
            ]
        );
    }

    #[tokio::test]
    async fn test_task_returns_engine_when_handles_drop() {
        let (handle, task, _actions) = spawn_recording();

        handle.submit(delta((1, 3), (1, 4))).await.unwrap();
        handle.pause().await.unwrap();
        handle.submit(delta((1, 4), (1, 5))).await.unwrap();

        let other = handle.clone();
        drop(handle);
        assert_eq!(other.status().await.unwrap(), EngineStatus::Paused);
        drop(other);

        let engine = task.await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Paused);
        assert_eq!(engine.pending(), 1);
        assert_eq!(
            engine.working_copy().sequence,
            Some(SequenceDescriptor::range(1, 4))
        );
    }

    #[tokio::test]
    async fn test_closed_handle() {
        let (handle, task, _actions) = spawn_recording();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(handle.status().await, Err(RuntimeError::Closed));
        assert_eq!(handle.submit(delta((1, 3), (1, 4))).await, Err(RuntimeError::Closed));
    }
}
