use std::collections::VecDeque;

use dogfight::FrameReport;

const SAMPLE_COUNT: usize = 60;

/// Rolling view over the session's frame reports, for the status line.
#[derive(Debug, Default)]
pub struct SessionStats {
    frame_times: VecDeque<f32>,
    corrections: VecDeque<f32>,
    fps: f32,
    pub frames: u64,
    pub steps: u64,
    pub inputs_sent: u64,
    pub reconciliations: u64,
    pub stale_snapshots: u64,
    pub rejected_packets: u64,
    pub pings_sent: u64,
    pub max_correction: f32,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, dt: f32, report: &FrameReport) {
        self.frames += 1;
        self.steps += report.steps as u64;
        self.inputs_sent += report.inputs_sent as u64;
        self.reconciliations += report.reconciliations as u64;
        self.stale_snapshots += report.stale_snapshots as u64;
        self.rejected_packets += report.rejected_packets as u64;
        self.pings_sent += report.pings_sent as u64;

        if report.reconciliations > 0 {
            if self.corrections.len() >= SAMPLE_COUNT {
                self.corrections.pop_front();
            }
            self.corrections.push_back(report.max_correction);
            self.max_correction = self.max_correction.max(report.max_correction);
        }

        if dt <= 0.0 {
            return;
        }
        if self.frame_times.len() >= SAMPLE_COUNT {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);

        let avg_dt: f32 = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.fps = 1.0 / avg_dt;
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Mean correction over the recent reconciliations, in world units.
    pub fn recent_correction(&self) -> f32 {
        if self.corrections.is_empty() {
            return 0.0;
        }
        self.corrections.iter().sum::<f32>() / self.corrections.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_recent_corrections() {
        let mut stats = SessionStats::new();
        for correction in [0.5, 1.5] {
            let report = FrameReport {
                steps: 1,
                reconciliations: 1,
                max_correction: correction,
                ..Default::default()
            };
            stats.record_frame(1.0 / 60.0, &report);
        }
        stats.record_frame(1.0 / 60.0, &FrameReport::default());

        assert_eq!(stats.recent_correction(), 1.0);
        assert_eq!(stats.max_correction, 1.5);
        assert_eq!(stats.steps, 2);
        assert!((stats.fps() - 60.0).abs() < 0.01);
    }
}
