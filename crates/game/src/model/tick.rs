use serde::{Deserialize, Serialize};

use super::transform::Transform;

/// Tick metadata attached to every authoritative update.
///
/// The `last_processed_input_*` fields are only present on snapshots for
/// entities the receiving session controls.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TickInfo {
    pub tick: u32,
    pub timestamp_ms: f64,
    pub last_processed_input_tick: Option<u32>,
    pub last_processed_input_timestamp_ms: Option<f64>,
}

impl TickInfo {
    pub fn new(tick: u32, timestamp_ms: f64) -> Self {
        Self {
            tick,
            timestamp_ms,
            last_processed_input_tick: None,
            last_processed_input_timestamp_ms: None,
        }
    }

    pub fn with_ack(mut self, input_tick: u32, input_timestamp_ms: f64) -> Self {
        self.last_processed_input_tick = Some(input_tick);
        self.last_processed_input_timestamp_ms = Some(input_timestamp_ms);
        self
    }

    /// Highest input tick the server has incorporated. Falls back to the
    /// snapshot tick when no explicit ack is carried.
    pub fn ack_cutoff(&self) -> u32 {
        match self.last_processed_input_tick {
            Some(acked) if acked > self.tick => {
                log::warn!(
                    "ack tick {} ahead of snapshot tick {}, clamping",
                    acked,
                    self.tick
                );
                self.tick
            }
            Some(acked) => acked,
            None => self.tick,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    pub transform: Transform,
    pub tick: TickInfo,
}

impl TransformSnapshot {
    pub fn new(transform: Transform, tick: TickInfo) -> Self {
        Self { transform, tick }
    }

    #[inline]
    pub fn timestamp_ms(&self) -> f64 {
        self.tick.timestamp_ms
    }
}
