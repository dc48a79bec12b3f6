use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Impairments applied to one direction of the simulated link.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkConditions {
    pub loss_percent: f32,
    pub latency_ms: f64,
    pub jitter_ms: f64,
}

impl LinkConditions {
    pub fn is_clean(&self) -> bool {
        self.loss_percent <= 0.0 && self.latency_ms <= 0.0 && self.jitter_ms <= 0.0
    }
}

#[derive(Debug)]
struct DelayedFrame {
    release_ms: f64,
    sequence: u64,
    frame: Vec<u8>,
}

impl PartialEq for DelayedFrame {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedFrame {}

impl PartialOrd for DelayedFrame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedFrame {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on release time.
        other
            .release_ms
            .total_cmp(&self.release_ms)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
    pub delivered: u64,
}

/// One direction of a lossy, latent link on simulated time. Jitter may
/// reorder frames.
#[derive(Debug)]
pub struct LinkSimulator {
    conditions: LinkConditions,
    rng: StdRng,
    queue: BinaryHeap<DelayedFrame>,
    sequence: u64,
    stats: LinkStats,
}

impl LinkSimulator {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: StdRng::seed_from_u64(seed),
            queue: BinaryHeap::new(),
            sequence: 0,
            stats: LinkStats::default(),
        }
    }

    pub fn send(&mut self, frame: Vec<u8>, now_ms: f64) {
        self.stats.sent += 1;
        if self.should_drop() {
            self.stats.dropped += 1;
            return;
        }

        let release_ms = now_ms + self.delay_ms();
        self.queue.push(DelayedFrame {
            release_ms,
            sequence: self.sequence,
            frame,
        });
        self.sequence += 1;
    }

    /// Frames whose delay has elapsed by `now_ms`, in release order.
    pub fn take_due(&mut self, now_ms: f64) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|delayed| delayed.release_ms <= now_ms)
        {
            if let Some(delayed) = self.queue.pop() {
                frames.push(delayed.frame);
            }
        }
        self.stats.delivered += frames.len() as u64;
        frames
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn should_drop(&mut self) -> bool {
        let loss = self.conditions.loss_percent;
        loss > 0.0 && self.rng.gen_range(0.0..100.0) < loss
    }

    fn delay_ms(&mut self) -> f64 {
        let jitter = if self.conditions.jitter_ms > 0.0 {
            self.rng
                .gen_range(-self.conditions.jitter_ms..=self.conditions.jitter_ms)
        } else {
            0.0
        };
        (self.conditions.latency_ms + jitter).max(0.0)
    }
}
