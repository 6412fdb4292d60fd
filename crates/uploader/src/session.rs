//! Upload session state machine.
//!
//! [`Session`] is I/O-free: it consumes one [`Input`] at a time through
//! [`Session::handle`] and asks for I/O through the [`Effects`] trait. The
//! driver in [`crate::uploader`] wires it to a real WebSocket, chunk source
//! and timers; tests wire it to a recorder.
//!
//! Incoming records are dispatched by the current [`UploadState`]. While
//! cancelling, every record is first checked for the cancel acknowledgement
//! and otherwise handled by the state that was interrupted by the cancel,
//! so chunk acknowledgements that cross the cancel on the wire are still
//! accounted for.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use incoming_protocol::{ClientMessage, ServerMessage, UploadParams};
use incoming_transfer::{ByteRange, TransferError};

use crate::flow::FlowController;
use crate::observer::UploadObserver;
use crate::retry::RetryScheduler;
use crate::types::{
    ConnectionId, ERROR_CODE_PROTOCOL, ERROR_CODE_READ, ERROR_CODE_UNCONFIRMED_CANCEL, PauseMode,
    ReadId, RetryToken, SessionError, SessionSnapshot, UploadState,
};

/// Everything that can happen to a session.
#[derive(Debug)]
pub enum Input {
    /// Caller: (re)connect and resume.
    Start,
    /// Caller: pause, unpause or toggle.
    Pause(PauseMode),
    /// Caller: abort with a reason.
    Cancel(String),
    /// The channel opened by [`Effects::open_channel`] is ready.
    ChannelOpened(ConnectionId),
    /// A decoded record arrived.
    Message(ConnectionId, ServerMessage),
    /// A frame arrived that could not be decoded.
    Undecodable(ConnectionId, String),
    /// The channel closed, failed, or could not be opened.
    ChannelClosed(ConnectionId),
    /// A read requested by [`Effects::read_chunk`] completed.
    ChunkRead(ReadId, Result<Bytes, TransferError>),
    /// A timer armed by [`Effects::arm_retry`] expired.
    RetryElapsed(RetryToken),
}

/// I/O requested by the session.
///
/// Sends are fire-and-forget; a broken channel reports itself through
/// [`Input::ChannelClosed`].
pub trait Effects {
    fn open_channel(&mut self, conn: ConnectionId);
    fn send_record(&mut self, conn: ConnectionId, record: ClientMessage);
    fn send_chunk(&mut self, conn: ConnectionId, data: Bytes);
    fn close_channel(&mut self, conn: ConnectionId);
    fn read_chunk(&mut self, read: ReadId, range: ByteRange);
    fn abort_read(&mut self, read: ReadId);
    fn arm_retry(&mut self, token: RetryToken, delay: Duration);
    fn disarm_retry(&mut self, token: RetryToken);
}

#[derive(Debug, Clone, Copy)]
struct Channel {
    id: ConnectionId,
    open: bool,
}

/// Client side of one file upload.
pub struct Session {
    id: String,
    total_bytes: u64,
    bytes_transmitted: u64,
    bytes_acknowledged: u64,
    chunks_sent: u64,
    chunks_acked: u64,
    state: UploadState,
    paused: bool,
    can_pause: bool,
    can_cancel: bool,
    error: Option<SessionError>,
    cancel_reason: Option<String>,
    /// Reason sent with our Cancel record, adopted once confirmed.
    pending_cancel_reason: Option<String>,
    /// State whose handler serves records that arrive while cancelling.
    interrupted: Option<UploadState>,
    flow: Option<FlowController>,
    channel: Option<Channel>,
    next_connection: u64,
    read: Option<(ReadId, ByteRange)>,
    next_read: u64,
    retry: RetryScheduler,
    retry_delay: Duration,
    observer: Box<dyn UploadObserver>,
}

impl Session {
    pub fn new(id: impl Into<String>, total_bytes: u64, retry_delay: Duration) -> Self {
        Self {
            id: id.into(),
            total_bytes,
            bytes_transmitted: 0,
            bytes_acknowledged: 0,
            chunks_sent: 0,
            chunks_acked: 0,
            state: UploadState::NotStarted,
            paused: false,
            can_pause: false,
            can_cancel: false,
            error: None,
            cancel_reason: None,
            pending_cancel_reason: None,
            interrupted: None,
            flow: None,
            channel: None,
            next_connection: 0,
            read: None,
            next_read: 0,
            retry: RetryScheduler::default(),
            retry_delay,
            observer: Box::new(()),
        }
    }

    /// Replaces the observer that receives notifications.
    pub fn with_observer(mut self, observer: impl UploadObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Processes one input to completion.
    pub fn handle(&mut self, input: Input, fx: &mut dyn Effects) {
        match input {
            Input::Start => self.start(fx),
            Input::Pause(mode) => self.pause(mode, fx),
            Input::Cancel(reason) => self.cancel(reason, fx),
            Input::ChannelOpened(conn) => self.on_channel_opened(conn, fx),
            Input::Message(conn, msg) => self.on_message(conn, msg, fx),
            Input::Undecodable(conn, detail) => {
                if self.is_open(conn) {
                    self.protocol_violation(detail, fx);
                }
            }
            Input::ChannelClosed(conn) => self.on_channel_closed(conn, fx),
            Input::ChunkRead(read, result) => self.on_chunk_read(read, result, fx),
            Input::RetryElapsed(token) => {
                if self.retry.fire(token) {
                    debug!(upload = %self.id, "retry timer expired");
                    self.start(fx);
                } else {
                    trace!(upload = %self.id, token = token.0, "ignoring stale retry timer");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Caller operations
    // -----------------------------------------------------------------------

    /// Opens a fresh channel and resumes from the acknowledged offset.
    ///
    /// Used for the first start, for reconnects and for unpausing.
    pub fn start(&mut self, fx: &mut dyn Effects) {
        if self.state.is_terminal() || self.state == UploadState::Cancelling {
            debug!(upload = %self.id, state = ?self.state, "start ignored");
            return;
        }
        if self.paused {
            debug!(upload = %self.id, "start ignored while paused");
            return;
        }

        self.disarm_retry(fx);
        self.abort_read(fx);
        if let Some(old) = self.channel.take() {
            fx.close_channel(old.id);
        }

        self.bytes_transmitted = self.bytes_acknowledged;
        if let Some(flow) = self.flow.as_mut() {
            flow.reset();
        }
        self.chunks_sent = 0;
        self.chunks_acked = 0;
        self.can_cancel = true;
        self.can_pause = false;

        self.next_connection += 1;
        let conn = ConnectionId(self.next_connection);
        self.channel = Some(Channel {
            id: conn,
            open: false,
        });
        self.set_state(UploadState::Connecting);
        info!(
            upload = %self.id,
            connection = conn.0,
            offset = self.bytes_acknowledged,
            "connecting"
        );
        fx.open_channel(conn);
    }

    /// Pauses, unpauses or toggles the upload.
    pub fn pause(&mut self, mode: PauseMode, fx: &mut dyn Effects) {
        if matches!(
            self.state,
            UploadState::Finished
                | UploadState::Cancelled
                | UploadState::Errored
                | UploadState::Cancelling
        ) {
            debug!(upload = %self.id, state = ?self.state, "pause ignored");
            return;
        }
        let target = mode.resolve(self.paused);
        if target == self.paused {
            return;
        }

        if target {
            self.paused = true;
            self.abort_read(fx);
            self.disarm_retry(fx);
            if let Some(ch) = self.channel.take() {
                if ch.open {
                    fx.send_record(ch.id, ClientMessage::Pause);
                }
                fx.close_channel(ch.id);
            }
            self.can_cancel = false;
            self.set_state(UploadState::Paused);
            info!(upload = %self.id, acknowledged = self.bytes_acknowledged, "paused");
            self.notify_progress();
        } else {
            self.paused = false;
            info!(upload = %self.id, "unpausing");
            self.start(fx);
        }
    }

    /// Aborts the upload.
    ///
    /// With an open channel the server is asked to cancel and the session
    /// waits in [`UploadState::Cancelling`] for its confirmation. Without
    /// one the session is cancelled immediately and an error is reported,
    /// since the server cannot know about it yet.
    pub fn cancel(&mut self, reason: impl Into<String>, fx: &mut dyn Effects) {
        if self.state == UploadState::Cancelled || !self.can_cancel {
            debug!(upload = %self.id, state = ?self.state, "cancel ignored");
            return;
        }
        let interrupted = self.state;
        self.begin_cancel(reason.into(), interrupted, fx);
    }

    // -----------------------------------------------------------------------
    // Observable state
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_transmitted(&self) -> u64 {
        self.bytes_transmitted
    }

    pub fn bytes_acknowledged(&self) -> u64 {
        self.bytes_acknowledged
    }

    pub fn can_pause(&self) -> bool {
        self.can_pause
    }

    pub fn can_cancel(&self) -> bool {
        self.can_cancel
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Returns `true` once the session ended and holds no channel.
    pub fn is_done(&self) -> bool {
        self.state.is_terminal() && self.channel.is_none()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let flow = self.flow.as_ref();
        SessionSnapshot {
            id: self.id.clone(),
            state: self.state,
            total_bytes: self.total_bytes,
            bytes_transmitted: self.bytes_transmitted,
            bytes_acknowledged: self.bytes_acknowledged,
            chunk_size: flow.map(FlowController::chunk_size),
            send_ahead_limit: flow.map(FlowController::send_ahead_limit),
            chunks_in_flight: flow.map_or(0, FlowController::chunks_in_flight),
            bytes_in_flight: flow.map_or(0, FlowController::bytes_in_flight),
            chunks_sent_this_connection: self.chunks_sent,
            chunks_acked_this_connection: self.chunks_acked,
            paused: self.paused,
            can_pause: self.can_pause,
            can_cancel: self.can_cancel,
            connected: self.channel.is_some_and(|c| c.open),
            retry_pending: self.retry.is_armed(),
            error: self.error.clone(),
            cancel_reason: self.cancel_reason.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Channel events
    // -----------------------------------------------------------------------

    fn on_channel_opened(&mut self, conn: ConnectionId, fx: &mut dyn Effects) {
        let Some(ch) = self.channel.as_mut().filter(|c| c.id == conn) else {
            trace!(upload = %self.id, connection = conn.0, "ignoring open of stale connection");
            return;
        };
        ch.open = true;
        self.set_state(UploadState::Handshaking);
        fx.send_record(
            conn,
            ClientMessage::UploadRequest {
                id: self.id.clone(),
                total_bytes: self.total_bytes,
            },
        );
    }

    fn on_message(&mut self, conn: ConnectionId, msg: ServerMessage, fx: &mut dyn Effects) {
        if !self.is_open(conn) {
            trace!(upload = %self.id, connection = conn.0, kind = msg.kind(), "ignoring record from stale connection");
            return;
        }
        trace!(upload = %self.id, state = ?self.state, kind = msg.kind(), "received record");

        if self.state == UploadState::Cancelling {
            match msg {
                ServerMessage::CancelAck => self.finish_cancel(fx),
                other => {
                    let interrupted = self.interrupted.unwrap_or(UploadState::Transferring);
                    self.dispatch(interrupted, other, fx);
                }
            }
        } else {
            self.dispatch(self.state, msg, fx);
        }
    }

    fn dispatch(&mut self, handler: UploadState, msg: ServerMessage, fx: &mut dyn Effects) {
        match handler {
            UploadState::Handshaking => self.handshake_message(msg, fx),
            UploadState::Transferring => self.transfer_message(msg, fx),
            UploadState::AwaitingCompletion => self.completion_message(msg, fx),
            other => debug!(upload = %self.id, state = ?other, kind = msg.kind(), "record ignored"),
        }
    }

    fn on_channel_closed(&mut self, conn: ConnectionId, fx: &mut dyn Effects) {
        if !self.channel.is_some_and(|c| c.id == conn) {
            trace!(upload = %self.id, connection = conn.0, "ignoring close of stale connection");
            return;
        }
        self.channel = None;
        self.abort_read(fx);

        match self.state {
            UploadState::Cancelling => {
                warn!(upload = %self.id, "connection closed before cancellation was confirmed");
                self.cancel_reason = self.pending_cancel_reason.take();
                self.interrupted = None;
                self.disarm_retry(fx);
                self.set_state(UploadState::Cancelled);
                self.notify_cancelled();
                if self.error.is_none() {
                    self.error = Some(SessionError::new(
                        ERROR_CODE_UNCONFIRMED_CANCEL,
                        "connection closed before the server confirmed the cancellation",
                    ));
                    self.notify_error();
                }
            }
            UploadState::Paused
            | UploadState::Finished
            | UploadState::Cancelled
            | UploadState::Errored
            | UploadState::NotStarted => self.notify_progress(),
            UploadState::Connecting
            | UploadState::Handshaking
            | UploadState::Transferring
            | UploadState::AwaitingCompletion => {
                info!(
                    upload = %self.id,
                    state = ?self.state,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "connection lost, scheduling reconnect"
                );
                self.can_pause = true;
                self.notify_progress();
                self.arm_retry(fx);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-state record handlers
    // -----------------------------------------------------------------------

    fn handshake_message(&mut self, msg: ServerMessage, fx: &mut dyn Effects) {
        match msg {
            ServerMessage::UploadConfig(params) => self.on_upload_config(params, fx),
            ServerMessage::Error { code, message } => {
                self.fail_and_cancel(SessionError::new(code, message), fx)
            }
            ServerMessage::Cancel { reason } => self.on_server_cancel(reason, fx),
            other => self.protocol_violation(
                format!("unexpected {} record during handshake", other.kind()),
                fx,
            ),
        }
    }

    fn transfer_message(&mut self, msg: ServerMessage, fx: &mut dyn Effects) {
        match msg {
            ServerMessage::ChunkAck { size } => self.on_chunk_ack(size, fx),
            ServerMessage::Error { code, message } => {
                self.fail_and_cancel(SessionError::new(code, message), fx)
            }
            ServerMessage::Cancel { reason } => self.on_server_cancel(reason, fx),
            other => self.protocol_violation(
                format!("unexpected {} record during transfer", other.kind()),
                fx,
            ),
        }
    }

    fn completion_message(&mut self, msg: ServerMessage, fx: &mut dyn Effects) {
        match msg {
            ServerMessage::AllDone => {
                info!(upload = %self.id, bytes = self.total_bytes, "upload finished");
                self.set_state(UploadState::Finished);
                self.shut_down(fx);
                self.notify_finished();
            }
            ServerMessage::Error { code, message } => {
                warn!(upload = %self.id, code, %message, "server failed to complete upload");
                self.error = Some(SessionError::new(code, message));
                self.set_state(UploadState::Errored);
                self.shut_down(fx);
                self.notify_error();
            }
            ServerMessage::Cancel { reason } => self.on_server_cancel(reason, fx),
            other => self.protocol_violation(
                format!("unexpected {} record while awaiting completion", other.kind()),
                fx,
            ),
        }
    }

    fn on_upload_config(&mut self, params: UploadParams, fx: &mut dyn Effects) {
        if params.resume_offset > self.total_bytes {
            self.protocol_violation(
                format!(
                    "resume offset {} beyond file size {}",
                    params.resume_offset, self.total_bytes
                ),
                fx,
            );
            return;
        }
        if params.resume_offset < self.bytes_acknowledged {
            warn!(
                upload = %self.id,
                acknowledged = self.bytes_acknowledged,
                resume_offset = params.resume_offset,
                "server resumes behind previously acknowledged offset"
            );
        }

        self.bytes_acknowledged = params.resume_offset;
        self.bytes_transmitted = params.resume_offset;
        self.flow = Some(FlowController::new(params.chunk_size, params.send_ahead));

        if self.state == UploadState::Cancelling {
            self.notify_progress();
            return;
        }
        let Some(conn) = self.open_connection() else {
            return;
        };

        info!(
            upload = %self.id,
            chunk_size = params.chunk_size,
            resume_offset = params.resume_offset,
            send_ahead = params.send_ahead,
            "upload config received"
        );
        fx.send_record(conn, ClientMessage::Ack);

        if params.resume_offset == self.total_bytes {
            self.can_cancel = false;
            self.can_pause = false;
            self.set_state(UploadState::AwaitingCompletion);
        } else {
            self.set_state(UploadState::Transferring);
            self.can_pause = true;
            self.request_next_chunk(fx);
        }
        self.notify_progress();
    }

    fn on_chunk_ack(&mut self, size: u64, fx: &mut dyn Effects) {
        let Some(flow) = self.flow.as_mut() else {
            self.protocol_violation("chunk acknowledged before upload config".into(), fx);
            return;
        };
        if let Err(e) = flow.on_acked(size) {
            self.protocol_violation(e.to_string(), fx);
            return;
        }
        self.bytes_acknowledged += size;
        self.chunks_acked += 1;
        trace!(
            upload = %self.id,
            size,
            acknowledged = self.bytes_acknowledged,
            "chunk acknowledged"
        );

        if self.bytes_acknowledged == self.total_bytes {
            if self.state == UploadState::Transferring {
                debug!(upload = %self.id, "all bytes acknowledged");
                self.set_state(UploadState::AwaitingCompletion);
            }
        } else {
            self.request_next_chunk(fx);
        }
        self.notify_progress();
    }

    // -----------------------------------------------------------------------
    // Chunk pipeline
    // -----------------------------------------------------------------------

    fn request_next_chunk(&mut self, fx: &mut dyn Effects) {
        let cancelling = match self.state {
            UploadState::Transferring => false,
            UploadState::Cancelling => true,
            _ => return,
        };
        if self.open_connection().is_none() {
            return;
        }
        let Some(flow) = self.flow.as_mut() else {
            return;
        };
        if let Some(range) = flow.admit(self.bytes_transmitted, self.total_bytes, cancelling) {
            self.next_read += 1;
            let read = ReadId(self.next_read);
            self.read = Some((read, range));
            trace!(upload = %self.id, offset = range.offset, len = range.len, "reading chunk");
            fx.read_chunk(read, range);
        }
    }

    fn on_chunk_read(
        &mut self,
        read: ReadId,
        result: Result<Bytes, TransferError>,
        fx: &mut dyn Effects,
    ) {
        let range = match self.read {
            Some((current, range)) if current == read => range,
            _ => {
                trace!(upload = %self.id, read = read.0, "ignoring stale chunk read");
                return;
            }
        };
        self.read = None;
        if let Some(flow) = self.flow.as_mut() {
            flow.read_finished();
        }

        let data = match result {
            Ok(data) if data.len() as u64 == range.len => data,
            Ok(data) => {
                let detail = format!("short read: {} of {} bytes", data.len(), range.len);
                self.on_read_failure(detail, fx);
                return;
            }
            Err(e) => {
                self.on_read_failure(e.to_string(), fx);
                return;
            }
        };

        if self.state != UploadState::Transferring {
            trace!(upload = %self.id, state = ?self.state, "dropping chunk read outside transfer");
            return;
        }
        let Some(conn) = self.open_connection() else {
            return;
        };

        let len = data.len() as u64;
        fx.send_chunk(conn, data);
        self.bytes_transmitted += len;
        self.chunks_sent += 1;
        if let Some(flow) = self.flow.as_mut() {
            flow.on_sent(len);
        }
        trace!(
            upload = %self.id,
            offset = range.offset,
            len,
            transmitted = self.bytes_transmitted,
            "chunk sent"
        );
        if self.bytes_transmitted == self.total_bytes {
            debug!(upload = %self.id, "last chunk sent");
            self.can_cancel = false;
            self.can_pause = false;
        }
        self.notify_progress();
        self.request_next_chunk(fx);
    }

    fn on_read_failure(&mut self, detail: String, fx: &mut dyn Effects) {
        if matches!(
            self.state,
            UploadState::Cancelling | UploadState::Paused
        ) || self.state.is_terminal()
        {
            debug!(upload = %self.id, %detail, "ignoring read failure");
            return;
        }
        warn!(upload = %self.id, %detail, "chunk read failed");
        self.fail_with_reason(
            SessionError::new(ERROR_CODE_READ, format!("unexpected read error: {detail}")),
            "unexpected read error".into(),
            fx,
        );
    }

    // -----------------------------------------------------------------------
    // Endings
    // -----------------------------------------------------------------------

    /// Records a server error, reports it, then cancels.
    fn fail_and_cancel(&mut self, error: SessionError, fx: &mut dyn Effects) {
        warn!(upload = %self.id, code = error.code, message = %error.message, "server reported error");
        let reason = format!("server error: {}", error.message);
        self.fail_with_reason(error, reason, fx);
    }

    fn fail_with_reason(&mut self, error: SessionError, reason: String, fx: &mut dyn Effects) {
        let interrupted = self.state;
        self.error = Some(error);
        if interrupted == UploadState::Cancelling {
            // Already on the way out; keep waiting for the acknowledgement.
            self.notify_error();
            return;
        }
        self.set_state(UploadState::Errored);
        self.notify_error();

        if self.can_cancel {
            self.begin_cancel(reason, interrupted, fx);
        } else {
            self.shut_down(fx);
        }
    }

    fn begin_cancel(&mut self, reason: String, interrupted: UploadState, fx: &mut dyn Effects) {
        self.disarm_retry(fx);
        self.abort_read(fx);
        self.can_cancel = false;
        self.can_pause = false;

        match self.channel {
            Some(ch) if ch.open => {
                info!(upload = %self.id, %reason, "cancelling");
                self.interrupted = Some(interrupted);
                self.pending_cancel_reason = Some(reason.clone());
                self.set_state(UploadState::Cancelling);
                fx.send_record(ch.id, ClientMessage::Cancel { reason });
            }
            _ => {
                if let Some(ch) = self.channel.take() {
                    fx.close_channel(ch.id);
                }
                warn!(upload = %self.id, %reason, "cancelled while disconnected, server not notified");
                self.cancel_reason = Some(reason);
                self.set_state(UploadState::Cancelled);
                self.notify_cancelled();
                if self.error.is_none() {
                    self.error = Some(SessionError::new(
                        ERROR_CODE_UNCONFIRMED_CANCEL,
                        "upload cancelled while disconnected; the server was not notified",
                    ));
                    self.notify_error();
                }
            }
        }
    }

    fn finish_cancel(&mut self, fx: &mut dyn Effects) {
        self.cancel_reason = self.pending_cancel_reason.take();
        self.interrupted = None;
        info!(upload = %self.id, reason = ?self.cancel_reason, "cancellation confirmed");
        self.set_state(UploadState::Cancelled);
        self.shut_down(fx);
        self.notify_cancelled();
    }

    fn on_server_cancel(&mut self, reason: String, fx: &mut dyn Effects) {
        warn!(upload = %self.id, %reason, "server cancelled the upload");
        self.cancel_reason = Some(reason);
        self.pending_cancel_reason = None;
        self.interrupted = None;
        self.set_state(UploadState::Cancelled);
        self.shut_down(fx);
        self.notify_cancelled();
    }

    fn protocol_violation(&mut self, detail: String, fx: &mut dyn Effects) {
        warn!(upload = %self.id, state = ?self.state, %detail, "protocol violation");
        self.error = Some(SessionError::new(
            ERROR_CODE_PROTOCOL,
            format!("protocol violation: {detail}"),
        ));
        self.pending_cancel_reason = None;
        self.interrupted = None;
        self.set_state(UploadState::Errored);
        self.shut_down(fx);
        self.notify_error();
    }

    /// Releases every resource of a session that has ended.
    fn shut_down(&mut self, fx: &mut dyn Effects) {
        self.disarm_retry(fx);
        self.abort_read(fx);
        self.can_cancel = false;
        self.can_pause = false;
        if let Some(ch) = self.channel.take() {
            fx.close_channel(ch.id);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_state(&mut self, state: UploadState) {
        if self.state != state {
            debug!(upload = %self.id, from = ?self.state, to = ?state, "state change");
            self.state = state;
        }
    }

    fn is_open(&self, conn: ConnectionId) -> bool {
        self.channel.is_some_and(|c| c.id == conn && c.open)
    }

    fn open_connection(&self) -> Option<ConnectionId> {
        self.channel.filter(|c| c.open).map(|c| c.id)
    }

    fn abort_read(&mut self, fx: &mut dyn Effects) {
        if let Some((read, _)) = self.read.take() {
            fx.abort_read(read);
        }
        if let Some(flow) = self.flow.as_mut() {
            flow.read_finished();
        }
    }

    fn arm_retry(&mut self, fx: &mut dyn Effects) {
        let (token, replaced) = self.retry.arm();
        if let Some(old) = replaced {
            fx.disarm_retry(old);
        }
        fx.arm_retry(token, self.retry_delay);
    }

    fn disarm_retry(&mut self, fx: &mut dyn Effects) {
        if let Some(token) = self.retry.disarm() {
            fx.disarm_retry(token);
        }
    }

    fn notify_progress(&mut self) {
        let snapshot = self.snapshot();
        self.observer.on_progress(&snapshot);
    }

    fn notify_finished(&mut self) {
        let snapshot = self.snapshot();
        self.observer.on_finished(&snapshot);
    }

    fn notify_cancelled(&mut self) {
        let snapshot = self.snapshot();
        self.observer.on_cancelled(&snapshot);
    }

    fn notify_error(&mut self) {
        let snapshot = self.snapshot();
        self.observer.on_error(&snapshot);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("total_bytes", &self.total_bytes)
            .field("bytes_transmitted", &self.bytes_transmitted)
            .field("bytes_acknowledged", &self.bytes_acknowledged)
            .finish_non_exhaustive()
    }
}
