//! Send-ahead window accounting.
//!
//! Bounds the number of chunks that are sent but not yet acknowledged so
//! the wire never buffers more than `send_ahead_limit` chunks, while still
//! pipelining reads, sends and acknowledgements.

use incoming_transfer::ByteRange;

/// An acknowledgement that does not match anything in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("acknowledged {acked} bytes with {chunks_in_flight} chunks / {bytes_in_flight} bytes in flight")]
pub struct UnexpectedAck {
    pub acked: u64,
    pub chunks_in_flight: u32,
    pub bytes_in_flight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowController {
    chunk_size: u64,
    send_ahead_limit: u32,
    chunks_in_flight: u32,
    bytes_in_flight: u64,
    read_pending: bool,
}

impl FlowController {
    pub fn new(chunk_size: u64, send_ahead_limit: u32) -> Self {
        Self {
            chunk_size,
            send_ahead_limit,
            chunks_in_flight: 0,
            bytes_in_flight: 0,
            read_pending: false,
        }
    }

    /// Decides whether the next chunk may be read.
    ///
    /// On admission the returned range is marked as a pending read; no
    /// further range is admitted until [`read_finished`](Self::read_finished).
    pub fn admit(
        &mut self,
        bytes_transmitted: u64,
        total_bytes: u64,
        cancelling: bool,
    ) -> Option<ByteRange> {
        let open = self.chunks_in_flight < self.send_ahead_limit
            && !self.read_pending
            && bytes_transmitted < total_bytes
            && !cancelling;
        if !open {
            return None;
        }
        let end = bytes_transmitted
            .saturating_add(self.chunk_size)
            .min(total_bytes);
        self.read_pending = true;
        Some(ByteRange::new(bytes_transmitted, end - bytes_transmitted))
    }

    /// The pending read completed, failed, or was abandoned.
    pub fn read_finished(&mut self) {
        self.read_pending = false;
    }

    /// A chunk of `len` bytes was handed to the channel.
    pub fn on_sent(&mut self, len: u64) {
        self.chunks_in_flight += 1;
        self.bytes_in_flight += len;
    }

    /// The server acknowledged a chunk of `len` bytes.
    pub fn on_acked(&mut self, len: u64) -> Result<(), UnexpectedAck> {
        if self.chunks_in_flight == 0 || len > self.bytes_in_flight {
            return Err(UnexpectedAck {
                acked: len,
                chunks_in_flight: self.chunks_in_flight,
                bytes_in_flight: self.bytes_in_flight,
            });
        }
        self.chunks_in_flight -= 1;
        self.bytes_in_flight -= len;
        Ok(())
    }

    /// Forgets everything in flight (new connection).
    pub fn reset(&mut self) {
        self.chunks_in_flight = 0;
        self.bytes_in_flight = 0;
        self.read_pending = false;
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn send_ahead_limit(&self) -> u32 {
        self.send_ahead_limit
    }

    pub fn chunks_in_flight(&self) -> u32 {
        self.chunks_in_flight
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_window() {
        let mut flow = FlowController::new(4, 2);

        let r1 = flow.admit(0, 10, false).unwrap();
        assert_eq!(r1, ByteRange::new(0, 4));
        // Read still pending.
        assert_eq!(flow.admit(0, 10, false), None);
        flow.read_finished();
        flow.on_sent(4);

        let r2 = flow.admit(4, 10, false).unwrap();
        assert_eq!(r2, ByteRange::new(4, 4));
        flow.read_finished();
        flow.on_sent(4);

        // Window full.
        assert_eq!(flow.admit(8, 10, false), None);
        assert_eq!(flow.chunks_in_flight(), 2);
        assert_eq!(flow.bytes_in_flight(), 8);

        flow.on_acked(4).unwrap();
        let r3 = flow.admit(8, 10, false).unwrap();
        assert_eq!(r3, ByteRange::new(8, 2));
    }

    #[test]
    fn nothing_admitted_when_done_or_cancelling() {
        let mut flow = FlowController::new(4, 2);
        assert_eq!(flow.admit(10, 10, false), None);
        assert_eq!(flow.admit(0, 10, true), None);
        // A refused admission leaves no read pending.
        assert_eq!(flow.admit(0, 10, false), Some(ByteRange::new(0, 4)));
    }

    #[test]
    fn last_chunk_is_clamped() {
        let mut flow = FlowController::new(1024, 1);
        assert_eq!(flow.admit(1000, 1010, false), Some(ByteRange::new(1000, 10)));
    }

    #[test]
    fn unexpected_acks_rejected() {
        let mut flow = FlowController::new(4, 2);
        assert!(flow.on_acked(4).is_err());
        flow.on_sent(4);
        let err = flow.on_acked(5).unwrap_err();
        assert_eq!(err.bytes_in_flight, 4);
        assert_eq!(flow.chunks_in_flight(), 1);
        flow.on_acked(4).unwrap();
        assert_eq!(flow.bytes_in_flight(), 0);
    }

    #[test]
    fn reset_clears_in_flight() {
        let mut flow = FlowController::new(4, 2);
        flow.admit(0, 10, false);
        flow.on_sent(4);
        flow.reset();
        assert_eq!(flow.chunks_in_flight(), 0);
        assert_eq!(flow.bytes_in_flight(), 0);
        assert_eq!(flow.admit(0, 10, false), Some(ByteRange::new(0, 4)));
        assert_eq!(flow.chunk_size(), 4);
        assert_eq!(flow.send_ahead_limit(), 2);
    }
}
