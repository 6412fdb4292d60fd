//! WebSocket write pump: serialises outbound frames.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Writes frames to the WebSocket in queue order.
///
/// On cancellation the frames already queued are still written before the
/// close frame, so a Pause or Cancel record queued just before closing
/// reaches the server.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::UnboundedReceiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            warn!("WebSocket write error: {e}");
                            cancel.cancel();
                            return;
                        }
                    }
                    None => break,
                }
            }
            _ = cancel.cancelled() => {
                while let Ok(m) = write_rx.try_recv() {
                    if write.send(m).await.is_err() {
                        return;
                    }
                }
                break;
            }
        }
    }

    trace!("sending close frame");
    let _ = write.send(tungstenite::Message::Close(None)).await;
}
