use super::stats::RoundTrip;

const DEFAULT_CORRECTION_RATE: f64 = 0.1;

/// Estimate of `server_time - local_time`, used to express local render time
/// in the timestamp domain of authoritative snapshots.
#[derive(Debug, Clone)]
pub struct ServerClock {
    offset_ms: f64,
    correction_rate: f64,
    synced: bool,
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new(DEFAULT_CORRECTION_RATE)
    }
}

impl ServerClock {
    pub fn new(correction_rate: f64) -> Self {
        Self {
            offset_ms: 0.0,
            correction_rate: correction_rate.clamp(0.0, 1.0),
            synced: false,
        }
    }

    /// Refine the offset from a ping/pong exchange, assuming a symmetric path.
    pub fn observe_round_trip(&mut self, round_trip: &RoundTrip) {
        let sample =
            round_trip.server_time_ms + round_trip.rtt_ms() / 2.0 - round_trip.client_receive_ms;
        if !sample.is_finite() {
            return;
        }
        if self.synced {
            self.offset_ms += (sample - self.offset_ms) * self.correction_rate;
        } else {
            self.offset_ms = sample;
            self.synced = true;
        }
    }

    /// Rough bootstrap from the first snapshot, before any pong arrived.
    pub fn observe_snapshot(&mut self, server_time_ms: f64, local_time_ms: f64) {
        if !self.synced && server_time_ms.is_finite() {
            self.offset_ms = server_time_ms - local_time_ms;
            self.synced = true;
        }
    }

    pub fn to_server_time(&self, local_time_ms: f64) -> f64 {
        local_time_ms + self.offset_ms
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }
}
