use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::interpolation::InterpolationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// EMA factor applied to latency, jitter and the interpolation delay.
    pub smoothing: f32,
    /// Number of quality scores averaged into the reported quality.
    pub window: usize,
    pub min_latency_ms: f32,
    /// Latency at which the latency half of the score reaches zero.
    pub latency_ceiling_ms: f32,
    /// Jitter at which the jitter half of the score reaches zero.
    pub jitter_ceiling_ms: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.1,
            window: 20,
            min_latency_ms: 1.0,
            latency_ceiling_ms: 500.0,
            jitter_ceiling_ms: 100.0,
        }
    }
}

/// One ping/pong exchange, all times in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTrip {
    pub client_send_ms: f64,
    pub client_receive_ms: f64,
    pub server_time_ms: f64,
    /// One-way latency as measured by the server, if it reports one.
    pub reported_latency_ms: Option<f32>,
}

impl RoundTrip {
    pub fn rtt_ms(&self) -> f64 {
        (self.client_receive_ms - self.client_send_ms).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetworkStats {
    pub rtt_ms: f32,
    pub latency_ms: f32,
    pub jitter_ms: f32,
    /// Rolling mean of per-sample quality scores, in `[0, 1]`.
    pub quality: f32,
    pub target_delay_ms: f32,
    pub interpolation_delay_ms: f32,
    pub samples: u64,
}

/// Instantaneous quality of a latency/jitter pair, in `[0, 1]`.
pub fn quality_score(latency_ms: f32, jitter_ms: f32, config: &QualityConfig) -> f32 {
    let latency_score = (1.0 - latency_ms / config.latency_ceiling_ms).clamp(0.0, 1.0);
    let jitter_score = (1.0 - jitter_ms / config.jitter_ceiling_ms).clamp(0.0, 1.0);
    (latency_score + jitter_score) / 2.0
}

fn smooth(previous: f32, sample: f32, alpha: f32) -> f32 {
    if previous == 0.0 {
        sample
    } else {
        alpha * sample + (1.0 - alpha) * previous
    }
}

/// Turns round-trip samples into smoothed latency, jitter, quality and the
/// render delay applied to remote entities.
#[derive(Debug)]
pub struct NetworkQualityEstimator {
    config: QualityConfig,
    min_delay_ms: f32,
    max_delay_ms: f32,
    rtt_ms: f32,
    latency_ms: f32,
    jitter_ms: f32,
    scores: VecDeque<f32>,
    target_delay_ms: f32,
    delay_ms: f32,
    samples: u64,
}

impl NetworkQualityEstimator {
    pub fn new(config: QualityConfig, interpolation: &InterpolationConfig) -> Self {
        let window = config.window.max(1);
        let delay = interpolation
            .default_delay_ms
            .clamp(interpolation.min_delay_ms, interpolation.max_delay_ms);
        Self {
            config: QualityConfig { window, ..config },
            min_delay_ms: interpolation.min_delay_ms,
            max_delay_ms: interpolation.max_delay_ms,
            rtt_ms: 0.0,
            latency_ms: 0.0,
            jitter_ms: 0.0,
            scores: VecDeque::with_capacity(window),
            target_delay_ms: delay,
            delay_ms: delay,
            samples: 0,
        }
    }

    /// Fold in one ping/pong exchange. Samples with non-finite timing are
    /// ignored.
    pub fn record_round_trip(&mut self, round_trip: &RoundTrip) -> Option<NetworkStats> {
        let rtt = round_trip.rtt_ms() as f32;
        if !rtt.is_finite() {
            log::warn!("ignoring round trip with non-finite timing: {:?}", round_trip);
            return None;
        }
        let half_rtt = rtt / 2.0;

        // A server-reported latency wins over our own RTT/2 estimate.
        let one_way = match round_trip.reported_latency_ms {
            Some(reported) if reported.is_finite() && reported >= 0.0 => {
                reported.max(self.config.min_latency_ms)
            }
            _ => half_rtt.max(self.config.min_latency_ms),
        };
        let jitter_sample = if self.samples == 0 {
            0.0
        } else {
            (half_rtt - self.latency_ms).abs()
        };

        let alpha = self.config.smoothing;
        self.rtt_ms = smooth(self.rtt_ms, rtt, alpha);
        self.latency_ms = smooth(self.latency_ms, one_way, alpha);
        self.jitter_ms = smooth(self.jitter_ms, jitter_sample, alpha);
        self.samples += 1;

        if self.scores.len() >= self.config.window {
            self.scores.pop_front();
        }
        self.scores
            .push_back(quality_score(self.latency_ms, self.jitter_ms, &self.config));

        let quality = self.quality();
        let base_delay = self.latency_ms * 1.5;
        self.target_delay_ms = (base_delay * (1.0 + (1.0 - quality * 0.5)))
            .clamp(self.min_delay_ms, self.max_delay_ms);
        self.delay_ms = (alpha * self.target_delay_ms + (1.0 - alpha) * self.delay_ms)
            .clamp(self.min_delay_ms, self.max_delay_ms);

        log::debug!(
            "rtt {:.1}ms latency {:.1}ms jitter {:.1}ms quality {:.2} delay {:.1}ms",
            rtt,
            self.latency_ms,
            self.jitter_ms,
            quality,
            self.delay_ms
        );

        Some(self.stats())
    }

    /// Rolling mean of the recorded quality scores; 1.0 before any sample.
    pub fn quality(&self) -> f32 {
        if self.scores.is_empty() {
            return 1.0;
        }
        self.scores.iter().sum::<f32>() / self.scores.len() as f32
    }

    pub fn interpolation_delay_ms(&self) -> f32 {
        self.delay_ms
    }

    pub fn latency_ms(&self) -> f32 {
        self.latency_ms
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            rtt_ms: self.rtt_ms,
            latency_ms: self.latency_ms,
            jitter_ms: self.jitter_ms,
            quality: self.quality(),
            target_delay_ms: self.target_delay_ms,
            interpolation_delay_ms: self.delay_ms,
            samples: self.samples,
        }
    }
}
