use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{EntityId, EntityKind, Transform, TransformError, TransformSnapshot};
use crate::snapshot::StateBuffer;

pub const DEFAULT_INTERPOLATION_DELAY_MS: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub min_delay_ms: f32,
    pub default_delay_ms: f32,
    pub max_delay_ms: f32,
    /// How far past the newest snapshot a remote entity may be dead-reckoned
    /// before it freezes.
    pub max_extrapolation_ms: f64,
    pub buffer_capacity: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 50.0,
            default_delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            max_delay_ms: 200.0,
            max_extrapolation_ms: 250.0,
            buffer_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleMode {
    /// Between two buffered snapshots.
    Interpolated { t: f32 },
    /// Past the newest snapshot, within the extrapolation window.
    Extrapolated { ahead_ms: f64 },
    /// Past the extrapolation window; pinned to the newest snapshot.
    Frozen { ahead_ms: f64 },
    /// Before the oldest snapshot; pinned to it.
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteSample {
    pub transform: Transform,
    pub mode: SampleMode,
}

impl RemoteSample {
    pub fn is_stale(&self) -> bool {
        matches!(self.mode, SampleMode::Frozen { .. })
    }
}

/// Render-time poses for entities this session does not control.
#[derive(Debug)]
pub struct InterpolationEngine {
    config: InterpolationConfig,
    tracks: HashMap<EntityId, StateBuffer>,
}

impl Default for InterpolationEngine {
    fn default() -> Self {
        Self::new(InterpolationConfig::default())
    }
}

impl InterpolationEngine {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
        }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn push(
        &mut self,
        entity_id: &EntityId,
        snapshot: TransformSnapshot,
    ) -> Result<(), TransformError> {
        let capacity = self.config.buffer_capacity;
        self.tracks
            .entry(entity_id.clone())
            .or_insert_with(|| StateBuffer::new(capacity))
            .push(snapshot)
    }

    /// Pose of `entity_id` at `target_time_ms` (server clock). `None` while
    /// fewer than two snapshots are buffered; the caller keeps the last pose.
    pub fn sample(
        &mut self,
        entity_id: &EntityId,
        kind: EntityKind,
        target_time_ms: f64,
    ) -> Option<RemoteSample> {
        let buffer = self.tracks.get_mut(entity_id)?;
        if buffer.len() < 2 {
            return None;
        }
        sample_buffer(buffer, kind, target_time_ms, self.config.max_extrapolation_ms)
    }

    pub fn buffered(&self, entity_id: &EntityId) -> usize {
        self.tracks.get(entity_id).map_or(0, StateBuffer::len)
    }

    pub fn remove(&mut self, entity_id: &EntityId) {
        self.tracks.remove(entity_id);
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Index `i` such that `buffer[i] <= target <= buffer[i + 1]`. Ephemeral
/// entities take the newest matching pair, persistent ones the oldest, which
/// settles snapshots sharing a timestamp.
fn find_bracket(buffer: &StateBuffer, kind: EntityKind, target_time_ms: f64) -> Option<usize> {
    let brackets = |i: &usize| {
        let (Some(a), Some(b)) = (buffer.get(*i), buffer.get(*i + 1)) else {
            return false;
        };
        a.timestamp_ms() <= target_time_ms && target_time_ms <= b.timestamp_ms()
    };

    let mut candidates = 0..buffer.len().saturating_sub(1);
    if kind.is_ephemeral() {
        candidates.rev().find(brackets)
    } else {
        candidates.find(brackets)
    }
}

fn sample_buffer(
    buffer: &mut StateBuffer,
    kind: EntityKind,
    target_time_ms: f64,
    max_extrapolation_ms: f64,
) -> Option<RemoteSample> {
    let oldest = *buffer.oldest()?;
    let latest = *buffer.latest()?;
    let previous = *buffer.previous()?;

    if target_time_ms < oldest.timestamp_ms() {
        return Some(RemoteSample {
            transform: oldest.transform,
            mode: SampleMode::Holding,
        });
    }

    if let Some(index) = find_bracket(buffer, kind, target_time_ms) {
        let a = *buffer.get(index)?;
        let b = *buffer.get(index + 1)?;
        let span = b.timestamp_ms() - a.timestamp_ms();
        let t = if span > 0.0 {
            ((target_time_ms - a.timestamp_ms()) / span).clamp(0.0, 1.0) as f32
        } else if kind.is_ephemeral() {
            1.0
        } else {
            0.0
        };

        let mut transform = Transform::interpolate(&a.transform, &b.transform, t);
        if !transform.is_finite() {
            log::warn!("interpolation produced a non-finite pose, using authority");
            transform = b.transform;
        }

        buffer.evict_before(a.timestamp_ms());
        return Some(RemoteSample {
            transform,
            mode: SampleMode::Interpolated { t },
        });
    }

    let ahead_ms = target_time_ms - latest.timestamp_ms();
    buffer.evict_before(previous.timestamp_ms());

    if ahead_ms > max_extrapolation_ms {
        return Some(RemoteSample {
            transform: latest.transform,
            mode: SampleMode::Frozen { ahead_ms },
        });
    }

    let span_secs = (latest.timestamp_ms() - previous.timestamp_ms()) / 1000.0;
    let velocity = if span_secs > 0.0 {
        (latest.transform.position - previous.transform.position) / span_secs as f32
    } else {
        latest.transform.linear_velocity
    };

    let mut transform = latest
        .transform
        .extrapolated(velocity, (ahead_ms / 1000.0) as f32);
    if !transform.is_finite() {
        log::warn!("extrapolation produced a non-finite pose, using authority");
        transform = latest.transform;
    }

    Some(RemoteSample {
        transform,
        mode: SampleMode::Extrapolated { ahead_ms },
    })
}
