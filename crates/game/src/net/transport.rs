use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
}

/// Room channel seen from the client: a write-only sink for outgoing frames
/// and a read-only source of incoming ones. Implementations never touch the
/// session's buffers.
pub trait Transport {
    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Everything that arrived since the last call, in arrival order.
    fn receive(&mut self) -> Vec<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// In-memory transport. Outgoing frames pile up in an outbox for the other
/// side to collect; incoming frames are injected with [`deliver`].
///
/// [`deliver`]: QueuedTransport::deliver
#[derive(Debug, Default)]
pub struct QueuedTransport {
    outbox: VecDeque<Vec<u8>>,
    inbox: VecDeque<Vec<u8>>,
    stats: TrafficStats,
    closed: bool,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&mut self, frame: Vec<u8>) {
        self.inbox.push_back(frame);
    }

    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        self.outbox.drain(..).collect()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }
}

impl Transport for QueuedTransport {
    fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;
        self.outbox.push_back(frame);
        Ok(())
    }

    fn receive(&mut self) -> Vec<Vec<u8>> {
        let frames: Vec<Vec<u8>> = self.inbox.drain(..).collect();
        self.stats.packets_received += frames.len() as u64;
        self.stats.bytes_received += frames.iter().map(|f| f.len() as u64).sum::<u64>();
        frames
    }
}
