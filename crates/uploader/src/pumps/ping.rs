//! WebSocket ping pump: periodic keepalive pings.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

/// Queues a ping every `period` until cancelled.
pub(crate) async fn ping_pump(
    write_tx: mpsc::UnboundedSender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(Vec::new().into());
                if write_tx.send(ping).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_pump_stops_on_cancel() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(5), cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test]
    async fn pings_every_period() {
        tokio::time::pause();
        let start = tokio::time::Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(5), cancel.clone()));

        // Paused time auto-advances while the test waits.
        for n in 1..=2u32 {
            let msg = rx.recv().await.unwrap();
            assert!(matches!(msg, tungstenite::Message::Ping(_)));
            assert!(start.elapsed() >= Duration::from_secs(5) * n);
        }

        cancel.cancel();
        handle.await.unwrap();
    }
}
