use std::ops::Range;

pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_MAX_CATCHUP_STEPS: u32 = 3;

/// Fixed-rate tick accumulator. A long frame runs at most `max_catchup_steps`
/// ticks and the remaining backlog is dropped instead of spiralling.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: f32,
    accumulator: f32,
    max_catchup_steps: u32,
    tick: u32,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE, DEFAULT_MAX_CATCHUP_STEPS)
    }
}

impl FixedTimestep {
    pub fn new(tick_rate: u32, max_catchup_steps: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
            max_catchup_steps: max_catchup_steps.max(1),
            tick: 0,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Number of the next tick to run.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Adds `delta` seconds and returns the ticks due this frame, consuming
    /// them from the accumulator.
    pub fn advance(&mut self, delta: f32) -> Range<u32> {
        if delta.is_finite() && delta > 0.0 {
            self.accumulator += delta;
        }

        let mut due = (self.accumulator / self.dt) as u32;
        if due > self.max_catchup_steps {
            log::debug!("dropping {} ticks of backlog", due - self.max_catchup_steps);
            due = self.max_catchup_steps;
            self.accumulator = self.accumulator.rem_euclid(self.dt);
        } else {
            self.accumulator = (self.accumulator - due as f32 * self.dt).max(0.0);
        }

        let start = self.tick;
        self.tick = self.tick.wrapping_add(due);
        start..start.wrapping_add(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_timestep_accumulation() {
        let mut ts = FixedTimestep::new(60, 3);

        assert_eq!(ts.advance(1.0 / 30.0 + 1e-4), 0..2);
        assert_eq!(ts.advance(0.0), 2..2);
        assert_eq!(ts.tick(), 2);
    }

    #[test]
    fn one_frame_one_tick() {
        let mut ts = FixedTimestep::new(60, 3);

        for tick in 0..100 {
            assert_eq!(ts.advance(1.0 / 60.0), tick..tick + 1);
        }
    }

    #[test]
    fn long_frame_is_capped() {
        let mut ts = FixedTimestep::new(60, 3);

        assert_eq!(ts.advance(0.505).len(), 3);
        // Backlog beyond the cap is gone, only the partial tick is kept.
        assert_eq!(ts.advance(0.0).len(), 0);
        assert_eq!(ts.advance(1.0 / 60.0).len(), 1);
    }

    #[test]
    fn ignores_bad_deltas() {
        let mut ts = FixedTimestep::default();

        assert!(ts.advance(f32::NAN).is_empty());
        assert!(ts.advance(-1.0).is_empty());
    }
}
