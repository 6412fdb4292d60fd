//! WebSocket read pump: decodes incoming records and forwards them to the
//! session in arrival order.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use incoming_protocol::ServerMessage;

use crate::session::Input;
use crate::types::ConnectionId;

/// Reads frames until the stream ends, the peer closes, the connection is
/// cancelled, or the session stops listening.
///
/// With an `idle_timeout`, any incoming frame (not just Pong) resets the
/// deadline; a connection that stays silent past it is dropped.
pub(crate) async fn read_pump<S>(
    conn: ConnectionId,
    mut read: S,
    inputs: mpsc::Sender<Input>,
    write_tx: mpsc::UnboundedSender<tungstenite::Message>,
    idle_timeout: Option<Duration>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let idle = idle_timeout.unwrap_or_default();
    let deadline = tokio::time::sleep(idle);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline, if idle_timeout.is_some() => {
                warn!(connection = conn.0, "no traffic for {idle:?}, dropping connection");
                break;
            }

            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(connection = conn.0, "WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!(connection = conn.0, "WebSocket stream ended");
                        break;
                    }
                };
                if idle_timeout.is_some() {
                    deadline.as_mut().reset(tokio::time::Instant::now() + idle);
                }

                let input = match msg {
                    tungstenite::Message::Text(text) => Some(decode_text(conn, &text)),
                    tungstenite::Message::Binary(data) => Some(Input::Undecodable(
                        conn,
                        format!("unexpected binary frame of {} bytes", data.len()),
                    )),
                    tungstenite::Message::Ping(data) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data));
                        None
                    }
                    tungstenite::Message::Pong(_) => {
                        trace!("received pong");
                        None
                    }
                    tungstenite::Message::Close(frame) => {
                        debug!(connection = conn.0, ?frame, "received close frame");
                        break;
                    }
                    tungstenite::Message::Frame(_) => None,
                };

                if let Some(input) = input {
                    if inputs.send(input).await.is_err() {
                        debug!(connection = conn.0, "session gone, stopping reader");
                        break;
                    }
                }
            }
        }
    }
}

fn decode_text(conn: ConnectionId, text: &str) -> Input {
    match ServerMessage::decode(text) {
        Ok(msg) => {
            trace!(connection = conn.0, kind = msg.kind(), "received record");
            Input::Message(conn, msg)
        }
        Err(e) => {
            warn!(connection = conn.0, "failed to decode record: {e}");
            Input::Undecodable(conn, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use incoming_protocol::UploadParams;

    fn text(msg: &ServerMessage) -> Result<tungstenite::Message, tungstenite::Error> {
        Ok(tungstenite::Message::Text(msg.encode().unwrap().into()))
    }

    async fn drain(rx: &mut mpsc::Receiver<Input>) -> Vec<Input> {
        let mut out = Vec::new();
        while let Some(input) = rx.recv().await {
            out.push(input);
        }
        out
    }

    #[tokio::test]
    async fn forwards_records_in_order() {
        let conn = ConnectionId(3);
        let frames = stream::iter(vec![
            text(&ServerMessage::UploadConfig(UploadParams {
                chunk_size: 1024,
                resume_offset: 0,
                send_ahead: 2,
            })),
            text(&ServerMessage::ChunkAck { size: 1024 }),
            text(&ServerMessage::AllDone),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::unbounded_channel();

        read_pump(conn, frames, tx, write_tx, None, CancellationToken::new()).await;

        let inputs = drain(&mut rx).await;
        assert_eq!(inputs.len(), 3);
        assert!(matches!(
            inputs[0],
            Input::Message(c, ServerMessage::UploadConfig(p)) if c == conn && p.chunk_size == 1024
        ));
        assert!(matches!(
            inputs[1],
            Input::Message(_, ServerMessage::ChunkAck { size: 1024 })
        ));
        assert!(matches!(inputs[2], Input::Message(_, ServerMessage::AllDone)));
    }

    #[tokio::test]
    async fn malformed_and_binary_frames_are_reported() {
        let frames = stream::iter(vec![
            Ok(tungstenite::Message::Text("not valid json {{{".to_string().into())),
            Ok(tungstenite::Message::Binary(vec![0u8; 4].into())),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::unbounded_channel();

        read_pump(
            ConnectionId(1),
            frames,
            tx,
            write_tx,
            None,
            CancellationToken::new(),
        )
        .await;

        let inputs = drain(&mut rx).await;
        assert!(matches!(inputs[0], Input::Undecodable(ConnectionId(1), _)));
        assert!(matches!(&inputs[1], Input::Undecodable(_, d) if d.contains("binary")));
    }

    #[tokio::test]
    async fn answers_ping_with_pong() {
        let frames = stream::iter(vec![Ok(tungstenite::Message::Ping(vec![7u8].into()))]);
        let (tx, _rx) = mpsc::channel(16);
        let (write_tx, mut write_rx) = mpsc::unbounded_channel();

        read_pump(
            ConnectionId(1),
            frames,
            tx,
            write_tx,
            None,
            CancellationToken::new(),
        )
        .await;

        match write_rx.recv().await {
            Some(tungstenite::Message::Pong(data)) => assert_eq!(&data[..], &[7u8]),
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_frame_stops_reading() {
        let frames = stream::iter(vec![
            Ok(tungstenite::Message::Close(None)),
            text(&ServerMessage::AllDone),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::unbounded_channel();

        read_pump(
            ConnectionId(1),
            frames,
            tx,
            write_tx,
            None,
            CancellationToken::new(),
        )
        .await;

        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn silence_past_idle_timeout_ends_reader() {
        tokio::time::pause();
        let (tx, _rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let silent = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();

        tokio::time::timeout(
            Duration::from_secs(120),
            read_pump(
                ConnectionId(1),
                silent,
                tx,
                write_tx,
                Some(Duration::from_secs(30)),
                CancellationToken::new(),
            ),
        )
        .await
        .expect("idle timeout should end the reader");
    }

    #[tokio::test]
    async fn traffic_resets_idle_deadline() {
        tokio::time::pause();
        let start = tokio::time::Instant::now();
        let (tx, mut rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::unbounded_channel();

        let idle = Duration::from_secs(30);
        let delayed = stream::once(async move {
            tokio::time::sleep(idle - Duration::from_secs(1)).await;
            text(&ServerMessage::ChunkAck { size: 1 })
        });
        let frames = Box::pin(delayed.chain(stream::pending()));

        read_pump(
            ConnectionId(1),
            frames,
            tx,
            write_tx,
            Some(idle),
            CancellationToken::new(),
        )
        .await;

        assert!(start.elapsed() >= idle * 2 - Duration::from_secs(1));
        assert!(matches!(
            rx.recv().await,
            Some(Input::Message(_, ServerMessage::ChunkAck { size: 1 }))
        ));
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let (tx, _rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        read_pump(
            ConnectionId(1),
            stream::pending::<Result<tungstenite::Message, tungstenite::Error>>(),
            tx,
            write_tx,
            None,
            cancel,
        )
        .await;
    }
}
