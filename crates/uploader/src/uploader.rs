//! Tokio driver for upload sessions.
//!
//! Each upload runs as one task that owns its [`Session`] and feeds it
//! inputs one at a time from a single queue: caller commands, WebSocket
//! events, chunk read completions and retry timer expiries. Effects the
//! session asks for are carried out by [`DriverIo`], which spawns the
//! corresponding tasks and tags their results so stale ones can be
//! recognised.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bytes::Bytes;
use incoming_protocol::ClientMessage;
use incoming_transfer::{ByteRange, ChunkSource, FileChunkSource};

use crate::config::UploaderConfig;
use crate::error::UploaderError;
use crate::observer::UploadObserver;
use crate::retry::spawn_retry_timer;
use crate::session::{Effects, Input, Session};
use crate::types::{ConnectionId, PauseMode, ReadId, RetryToken, SessionSnapshot};
use crate::ws_client::{ChannelOptions, WsChannel};

const INPUT_QUEUE: usize = 64;

/// Spawns upload sessions against one server.
#[derive(Debug, Clone)]
pub struct Uploader {
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(config: UploaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Creates a session for `source` and spawns its driver task.
    ///
    /// The session stays in [`NotStarted`](crate::UploadState::NotStarted)
    /// until [`UploaderHandle::start`] is called. Must be called from
    /// within a Tokio runtime.
    pub fn spawn<S: ChunkSource>(
        &self,
        id: impl Into<String>,
        source: Arc<S>,
        observer: impl UploadObserver + 'static,
    ) -> UploaderHandle {
        let session = Session::new(id, source.size(), self.config.retry_delay())
            .with_observer(observer);
        let (inputs_tx, inputs_rx) = mpsc::channel(INPUT_QUEUE);
        let (snapshots_tx, snapshots_rx) = watch::channel(session.snapshot());

        let io = DriverIo {
            source,
            options: ChannelOptions {
                url: self.config.endpoint_url(),
                keepalive: self.config.keepalive_interval(),
                idle_timeout: self.config.idle_timeout(),
            },
            inputs: inputs_tx.downgrade(),
            channels: HashMap::new(),
            reads: HashMap::new(),
            retries: HashMap::new(),
        };
        tokio::spawn(drive(session, io, inputs_rx, snapshots_tx));

        UploaderHandle {
            inputs: inputs_tx,
            snapshots: snapshots_rx,
        }
    }

    /// Opens the file at `path` and spawns a session uploading it.
    pub async fn upload_file(
        &self,
        id: impl Into<String>,
        path: &Path,
        observer: impl UploadObserver + 'static,
    ) -> Result<UploaderHandle, UploaderError> {
        let source = FileChunkSource::open(path).await?;
        info!(path = %path.display(), bytes = source.size(), "opened upload source");
        Ok(self.spawn(id, Arc::new(source), observer))
    }
}

/// Caller side of a running upload.
///
/// Cheap to clone. Commands are queued behind any events already pending
/// for the session. Once the session has ended and released its
/// connection, commands fail with [`UploaderError::Closed`].
#[derive(Debug, Clone)]
pub struct UploaderHandle {
    inputs: mpsc::Sender<Input>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl UploaderHandle {
    pub async fn start(&self) -> Result<(), UploaderError> {
        self.send(Input::Start).await
    }

    pub async fn pause(&self, mode: PauseMode) -> Result<(), UploaderError> {
        self.send(Input::Pause(mode)).await
    }

    pub async fn cancel(&self, reason: impl Into<String>) -> Result<(), UploaderError> {
        self.send(Input::Cancel(reason.into())).await
    }

    /// State as of the last processed input.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that sees a new snapshot after every processed input.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Waits until the session reaches a terminal state.
    pub async fn wait(&self) -> SessionSnapshot {
        let mut rx = self.snapshots.clone();
        let reached = rx
            .wait_for(|s| s.state.is_terminal())
            .await
            .map(|s| s.clone());
        // The driver is gone; its last snapshot is final.
        reached.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Waits until the driver task has exited.
    pub async fn closed(&self) {
        self.inputs.closed().await;
    }

    async fn send(&self, input: Input) -> Result<(), UploaderError> {
        self.inputs
            .send(input)
            .await
            .map_err(|_| UploaderError::Closed)
    }
}

async fn drive<S: ChunkSource>(
    mut session: Session,
    mut io: DriverIo<S>,
    mut inputs: mpsc::Receiver<Input>,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    debug!(upload = session.id(), bytes = session.total_bytes(), "upload driver started");

    while let Some(input) = inputs.recv().await {
        io.forget(&input);
        session.handle(input, &mut io);
        snapshots.send_replace(session.snapshot());
        if session.is_done() {
            break;
        }
    }

    info!(upload = session.id(), state = ?session.state(), "upload driver stopped");
    io.shutdown();
}

/// Carries out session effects on the Tokio runtime.
struct DriverIo<S> {
    source: Arc<S>,
    options: ChannelOptions,
    /// Weak so the driver exits once every handle and task is gone.
    inputs: mpsc::WeakSender<Input>,
    channels: HashMap<ConnectionId, WsChannel>,
    reads: HashMap<ReadId, JoinHandle<()>>,
    retries: HashMap<RetryToken, CancellationToken>,
}

impl<S: ChunkSource> DriverIo<S> {
    /// Drops bookkeeping for tasks that reported back on their own.
    fn forget(&mut self, input: &Input) {
        match input {
            Input::ChunkRead(read, _) => {
                self.reads.remove(read);
            }
            Input::RetryElapsed(token) => {
                self.retries.remove(token);
            }
            Input::ChannelClosed(conn) => {
                self.channels.remove(conn);
            }
            _ => {}
        }
    }

    fn shutdown(&mut self) {
        for (_, read) in self.reads.drain() {
            read.abort();
        }
        for (_, timer) in self.retries.drain() {
            timer.cancel();
        }
        for (_, channel) in self.channels.drain() {
            channel.close();
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Input>> {
        let sender = self.inputs.upgrade();
        if sender.is_none() {
            debug!("all upload handles dropped");
        }
        sender
    }
}

impl<S: ChunkSource> Effects for DriverIo<S> {
    fn open_channel(&mut self, conn: ConnectionId) {
        let Some(inputs) = self.sender() else {
            return;
        };
        let channel = WsChannel::open(conn, self.options.clone(), inputs);
        self.channels.insert(channel.id(), channel);
    }

    fn send_record(&mut self, conn: ConnectionId, record: ClientMessage) {
        let Some(channel) = self.channels.get(&conn) else {
            debug!(connection = conn.0, "record for a closed connection dropped");
            return;
        };
        if let Err(e) = channel.send_record(&record) {
            warn!(connection = conn.0, msg_type = %record.msg_type(), "failed to queue record: {e}");
        }
    }

    fn send_chunk(&mut self, conn: ConnectionId, data: Bytes) {
        let Some(channel) = self.channels.get(&conn) else {
            debug!(connection = conn.0, "chunk for a closed connection dropped");
            return;
        };
        if let Err(e) = channel.send_binary(data) {
            warn!(connection = conn.0, "failed to queue chunk: {e}");
        }
    }

    fn close_channel(&mut self, conn: ConnectionId) {
        if let Some(channel) = self.channels.remove(&conn) {
            channel.close();
        }
    }

    fn read_chunk(&mut self, read: ReadId, range: ByteRange) {
        let Some(inputs) = self.sender() else {
            return;
        };
        let source = self.source.clone();
        let task = tokio::spawn(async move {
            let result = source.read_range(range).await;
            let _ = inputs.send(Input::ChunkRead(read, result)).await;
        });
        self.reads.insert(read, task);
    }

    fn abort_read(&mut self, read: ReadId) {
        if let Some(task) = self.reads.remove(&read) {
            task.abort();
        }
    }

    fn arm_retry(&mut self, token: RetryToken, delay: std::time::Duration) {
        let Some(inputs) = self.sender() else {
            return;
        };
        let timer = spawn_retry_timer(token, delay, inputs);
        self.retries.insert(token, timer);
    }

    fn disarm_retry(&mut self, token: RetryToken) {
        if let Some(timer) = self.retries.remove(&token) {
            timer.cancel();
        }
    }
}
