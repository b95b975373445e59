//! Driver runs the session tracker on a tokio runtime
//!
//! The tracker's poll blocks on the transport for up to one frame period, so each
//! poll runs on the blocking pool. Between polls the driver forwards queued
//! broadcast commands and publishes snapshots and configuration text through
//! watch channels.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::broadcast::{BroadcastMessage, CommandArg};
use crate::session::{PollResult, SessionTracker, Snapshot};
use crate::{Result, TrackerConfig};
use crate::transport::Transport;

const COMMAND_QUEUE_DEPTH: usize = 64;

/// A broadcast command queued for the driver.
#[derive(Debug)]
pub struct CommandRequest {
    pub kind: i32,
    pub arg1: CommandArg,
    pub arg2: Option<CommandArg>,
    pub arg3: Option<CommandArg>,
    /// Receives the encoded message, or why it was rejected or not sent
    pub reply: Option<oneshot::Sender<Result<BroadcastMessage>>>,
}

impl CommandRequest {
    pub fn new(
        kind: impl Into<i32>,
        arg1: impl Into<CommandArg>,
        arg2: Option<CommandArg>,
        arg3: Option<CommandArg>,
    ) -> Self {
        Self { kind: kind.into(), arg1: arg1.into(), arg2, arg3, reply: None }
    }

    /// Ask the driver to report the outcome of this command.
    pub fn with_reply(mut self) -> (Self, oneshot::Receiver<Result<BroadcastMessage>>) {
        let (tx, rx) = oneshot::channel();
        self.reply = Some(tx);
        (self, rx)
    }
}

/// Result of spawning the driver task
pub struct DriverChannels<T> {
    /// Latest decodable frame, `None` while disconnected or between layouts
    pub snapshots: watch::Receiver<Option<Snapshot>>,
    /// Decoded session configuration text, republished on version changes
    pub session_config: watch::Receiver<Option<Arc<str>>>,
    /// Queue for outbound broadcast commands
    pub commands: mpsc::Sender<CommandRequest>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves to the tracker once the driver stops (`None` if a poll panicked)
    pub task: JoinHandle<Option<SessionTracker<T>>>,
}

/// Spawns and manages the poll loop
pub struct Driver;

impl Driver {
    /// Spawn the poll loop for `tracker`. Must be called inside a tokio runtime.
    pub fn spawn<T>(tracker: SessionTracker<T>, config: TrackerConfig) -> DriverChannels<T>
    where
        T: Transport + Send + 'static,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (config_tx, config_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::poll_task(
            tracker,
            config,
            snapshot_tx,
            config_tx,
            command_rx,
            cancel.clone(),
        ));

        DriverChannels {
            snapshots: snapshot_rx,
            session_config: config_rx,
            commands: command_tx,
            cancel,
            task,
        }
    }

    async fn poll_task<T>(
        mut tracker: SessionTracker<T>,
        config: TrackerConfig,
        snapshot_tx: watch::Sender<Option<Snapshot>>,
        config_tx: watch::Sender<Option<Arc<str>>>,
        mut commands: mpsc::Receiver<CommandRequest>,
        cancel: CancellationToken,
    ) -> Option<SessionTracker<T>>
    where
        T: Transport + Send + 'static,
    {
        info!(?config, "Driver started");
        let timeout = config.poll_timeout();
        let mut frame_count = 0u64;
        let mut error_count = 0u32;
        let mut published_config: Option<(u64, i32)> = None;

        loop {
            if cancel.is_cancelled() {
                info!("Driver cancelled");
                break;
            }

            while let Ok(request) = commands.try_recv() {
                let CommandRequest { kind, arg1, arg2, arg3, reply } = request;
                let result = tracker.broadcast(kind, arg1, arg2, arg3);
                if let Err(e) = &result {
                    warn!(error = %e, kind, "Broadcast command failed");
                }
                if let Some(reply) = reply {
                    // The caller may have stopped waiting
                    let _ = reply.send(result);
                }
            }

            let joined = tokio::task::spawn_blocking(move || {
                let result = tracker.poll(timeout);
                (tracker, result)
            })
            .await;

            let result = match joined {
                Ok((returned, result)) => {
                    tracker = returned;
                    result
                }
                Err(e) => {
                    error!(error = %e, "Poll task failed, driver stopping");
                    snapshot_tx.send_replace(None);
                    config_tx.send_replace(None);
                    return None;
                }
            };

            match result {
                Ok(PollResult::Stable) => {
                    frame_count += 1;
                    error_count = 0;
                    trace!(frame_count, generation = tracker.connection_generation(), "Frame");

                    let current =
                        (tracker.connection_generation(), tracker.transport().config_version());
                    if published_config != Some(current) {
                        let text = tracker.session_config_text();
                        debug!(
                            generation = current.0,
                            version = current.1,
                            "Publishing session configuration"
                        );
                        config_tx.send_replace(Some(text));
                        published_config = Some(current);
                    }

                    if snapshot_tx.send(tracker.snapshot()).is_err() {
                        debug!("Snapshot receiver dropped, shutting down");
                        break;
                    }
                }
                Ok(PollResult::Timeout) => {
                    error_count = 0;
                }
                Ok(PollResult::LayoutChanged) => {
                    error_count = 0;
                    snapshot_tx.send_replace(None);
                    config_tx.send_replace(None);
                    published_config = None;
                }
                Ok(PollResult::ConnectionLost) => {
                    error_count = 0;
                    if snapshot_tx.borrow().is_some() {
                        info!(frame_count, "Connection lost, waiting for producer");
                    }
                    snapshot_tx.send_replace(None);
                    config_tx.send_replace(None);
                    published_config = None;

                    if !Self::pause(&cancel, config.reconnect_delay()).await {
                        break;
                    }
                }
                Err(e) => {
                    error_count += 1;
                    warn!(
                        error = %e,
                        error_count,
                        max = config.max_consecutive_errors,
                        retryable = e.is_retryable(),
                        "Poll failed"
                    );

                    if error_count >= config.max_consecutive_errors {
                        error!(error_count, "Too many consecutive poll errors, driver stopping");
                        snapshot_tx.send_replace(None);
                        config_tx.send_replace(None);
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    if !Self::pause(&cancel, backoff).await {
                        break;
                    }
                }
            }
        }

        tracker.stop();
        info!(frame_count, "Driver stopped");
        Some(tracker)
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(cancel: &CancellationToken, delay: Duration) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockTransport, sample_layout};
    use crate::{BroadcastKind, SessionTracker, TelemetryError};
    use futures::StreamExt;
    use tokio_stream::wrappers::WatchStream;

    const WAIT: Duration = Duration::from_secs(5);

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn tracker_with_frames(frames: usize) -> SessionTracker<MockTransport> {
        let (vars, frame_len) = sample_layout(4);
        let mut transport = MockTransport::new(vars, frame_len);
        for tick in 0..frames {
            let mut frame = vec![0u8; frame_len];
            frame[8..12].copy_from_slice(&(tick as i32).to_le_bytes());
            transport.push_frame(frame);
        }
        SessionTracker::new(transport)
    }

    fn quick_config() -> TrackerConfig {
        TrackerConfig { poll_timeout_ms: 1, reconnect_delay_ms: 10, max_consecutive_errors: 3 }
    }

    async fn shut_down(channels: DriverChannels<MockTransport>) -> SessionTracker<MockTransport> {
        channels.cancel.cancel();
        tokio::time::timeout(WAIT, channels.task)
            .await
            .expect("driver did not stop")
            .expect("driver task panicked")
            .expect("tracker lost")
    }

    #[tokio::test]
    async fn publishes_snapshots() {
        init_tracing();
        let channels = Driver::spawn(tracker_with_frames(3), quick_config());
        let mut snapshots = channels.snapshots.clone();

        let snapshot = tokio::time::timeout(WAIT, snapshots.wait_for(|s| s.is_some()))
            .await
            .unwrap()
            .unwrap()
            .clone()
            .unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert!(snapshot.get::<i32>("SessionTick").is_ok());

        let tracker = shut_down(channels).await;
        assert!(!tracker.is_running());
    }

    #[tokio::test]
    async fn publishes_session_config_once_per_version() {
        init_tracing();
        let mut tracker = tracker_with_frames(5);
        tracker.transport_mut().set_config(3, b"WeekendInfo:\n TrackName: spa\n");

        let channels = Driver::spawn(tracker, quick_config());
        let mut session_config = channels.session_config.clone();
        let text = tokio::time::timeout(WAIT, session_config.wait_for(|t| t.is_some()))
            .await
            .unwrap()
            .unwrap()
            .clone()
            .unwrap();
        assert_eq!(&*text, "WeekendInfo:\n TrackName: spa\n");

        // Wait for the last queued frame
        let mut ticks = WatchStream::new(channels.snapshots.clone())
            .map(|s| s.and_then(|s| s.get::<i32>("SessionTick").ok()));
        tokio::time::timeout(WAIT, async {
            while let Some(tick) = ticks.next().await {
                if tick == Some(4) {
                    break;
                }
            }
        })
        .await
        .unwrap();

        let tracker = shut_down(channels).await;
        assert_eq!(tracker.transport().config_fetches, 1);
    }

    #[tokio::test]
    async fn forwards_queued_commands() {
        init_tracing();
        let channels = Driver::spawn(tracker_with_frames(1), quick_config());

        channels
            .commands
            .send(CommandRequest::new(
                BroadcastKind::CamSwitchNum,
                12,
                Some(0.into()),
                Some(0.into()),
            ))
            .await
            .unwrap();
        channels
            .commands
            .send(CommandRequest::new(BroadcastKind::PitCommand, 3, None, None))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let tracker = shut_down(channels).await;

        let sent = &tracker.transport().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, BroadcastKind::CamSwitchNum);
    }

    #[tokio::test]
    async fn replies_with_command_outcome() {
        init_tracing();
        let mut tracker = tracker_with_frames(1);
        tracker.transport_mut().failing_sends = 1;
        let channels = Driver::spawn(tracker, quick_config());

        let (first, first_reply) =
            CommandRequest::new(BroadcastKind::ReplaySearch, 0, None, None).with_reply();
        let (second, second_reply) =
            CommandRequest::new(BroadcastKind::ReplaySearch, 1, None, None).with_reply();
        let (rejected, rejected_reply) =
            CommandRequest::new(BroadcastKind::PitCommand, 3, None, None).with_reply();
        for request in [first, second, rejected] {
            channels.commands.send(request).await.unwrap();
        }

        let first = tokio::time::timeout(WAIT, first_reply).await.unwrap().unwrap();
        assert!(matches!(first, Err(TelemetryError::Connection { .. })));
        let second = tokio::time::timeout(WAIT, second_reply).await.unwrap().unwrap();
        assert_eq!(second.unwrap().kind, BroadcastKind::ReplaySearch);
        let rejected = tokio::time::timeout(WAIT, rejected_reply).await.unwrap().unwrap();
        assert!(matches!(rejected, Err(TelemetryError::Rejected { .. })));

        let tracker = shut_down(channels).await;
        assert_eq!(tracker.transport().sent.len(), 1);
    }

    #[tokio::test]
    async fn stops_after_consecutive_errors() {
        init_tracing();
        let mut tracker = tracker_with_frames(0);
        tracker.transport_mut().failing_waits = 100;

        let channels = Driver::spawn(tracker, quick_config());
        let tracker = tokio::time::timeout(WAIT, channels.task)
            .await
            .expect("driver kept running")
            .unwrap()
            .unwrap();

        assert_eq!(tracker.transport().failing_waits, 97);
        assert!(channels.snapshots.borrow().is_none());
    }

    #[tokio::test]
    async fn connection_loss_clears_snapshot() {
        init_tracing();
        let mut tracker = tracker_with_frames(0);
        tracker.transport_mut().connect_succeeds = false;

        let channels = Driver::spawn(tracker, quick_config());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(channels.snapshots.borrow().is_none());
        assert!(channels.session_config.borrow().is_none());

        let tracker = shut_down(channels).await;
        assert_eq!(tracker.connection_generation(), 0);
    }
}
