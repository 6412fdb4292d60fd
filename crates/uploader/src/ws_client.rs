//! WebSocket transport for one upload connection.
//!
//! A [`WsChannel`] owns a background task that connects, reports
//! [`Input::ChannelOpened`], runs the read/write/ping pumps, and finally
//! reports [`Input::ChannelClosed`]. A failed connect reports only the
//! close.

use std::sync::Once;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use incoming_protocol::constants::WS_MAX_MESSAGE_SIZE;
use incoming_protocol::{ClientMessage, ProtocolError};

use crate::session::Input;
use crate::types::ConnectionId;

/// Errors from the WebSocket channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed")]
    Closed,
}

/// Per-connection transport settings.
#[derive(Debug, Clone)]
pub(crate) struct ChannelOptions {
    pub url: String,
    pub keepalive: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

/// Handle to one connection attempt.
///
/// Dropping the handle closes the connection gracefully: queued frames are
/// flushed, then a close frame is sent.
pub(crate) struct WsChannel {
    id: ConnectionId,
    write_tx: mpsc::UnboundedSender<tungstenite::Message>,
    cancel: CancellationToken,
}

impl WsChannel {
    /// Starts connecting in the background.
    pub(crate) fn open(
        id: ConnectionId,
        options: ChannelOptions,
        inputs: mpsc::Sender<Input>,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_connection(
            id,
            options,
            write_rx,
            write_tx.clone(),
            inputs,
            cancel.clone(),
        ));
        Self {
            id,
            write_tx,
            cancel,
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a control record as a text frame.
    pub(crate) fn send_record(&self, record: &ClientMessage) -> Result<(), ChannelError> {
        let text = record.encode()?;
        self.write_tx
            .send(tungstenite::Message::Text(text.into()))
            .map_err(|_| ChannelError::Closed)
    }

    /// Queues a file chunk as a binary frame.
    pub(crate) fn send_binary(&self, data: Bytes) -> Result<(), ChannelError> {
        self.write_tx
            .send(tungstenite::Message::Binary(data))
            .map_err(|_| ChannelError::Closed)
    }

    /// Closes the connection after flushing queued frames.
    pub(crate) fn close(self) {
        // Drop does the work.
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Installs ring as the process-wide rustls provider for `wss://` URLs,
/// unless the embedding application already installed one.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

async fn connect(
    url: &str,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, ChannelError> {
    install_crypto_provider();
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
    let (ws_stream, _) =
        tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
    Ok(ws_stream)
}

async fn run_connection(
    id: ConnectionId,
    options: ChannelOptions,
    write_rx: mpsc::UnboundedReceiver<tungstenite::Message>,
    write_tx: mpsc::UnboundedSender<tungstenite::Message>,
    inputs: mpsc::Sender<Input>,
    cancel: CancellationToken,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => {
            trace!(connection = id.0, "connect abandoned");
            return;
        }
        result = connect(&options.url) => match result {
            Ok(stream) => stream,
            Err(e) => {
                warn!(connection = id.0, url = %options.url, "connect failed: {e}");
                let _ = inputs.send(Input::ChannelClosed(id)).await;
                return;
            }
        }
    };

    debug!(connection = id.0, url = %options.url, "connected");
    if inputs.send(Input::ChannelOpened(id)).await.is_err() {
        return;
    }

    let (write, read) = stream.split();
    let writer = tokio::spawn(crate::pumps::write::write_pump(
        write,
        write_rx,
        cancel.clone(),
    ));
    let pinger = options.keepalive.map(|period| {
        tokio::spawn(crate::pumps::ping::ping_pump(
            write_tx.clone(),
            period,
            cancel.clone(),
        ))
    });

    crate::pumps::read::read_pump(
        id,
        read,
        inputs.clone(),
        write_tx,
        options.idle_timeout,
        cancel.clone(),
    )
    .await;

    cancel.cancel();
    let _ = writer.await;
    if let Some(pinger) = pinger {
        let _ = pinger.await;
    }
    debug!(connection = id.0, "connection closed");
    let _ = inputs.send(Input::ChannelClosed(id)).await;
}
