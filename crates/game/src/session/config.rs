use serde::{Deserialize, Serialize};

use crate::interpolation::InterpolationConfig;
use crate::net::QualityConfig;
use crate::prediction::{DEFAULT_PENDING_CAPACITY, VehicleConfig};
use crate::simulation::{DEFAULT_MAX_CATCHUP_STEPS, DEFAULT_TICK_RATE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub tick_rate: u32,
    pub max_catchup_steps: u32,
    pub pending_capacity: usize,
    pub ping_interval_ms: f64,
    /// Locally predicted projectiles the server never confirms are dropped
    /// after this long.
    pub projectile_lifetime_ms: f64,
    pub quality: QualityConfig,
    pub interpolation: InterpolationConfig,
    pub vehicle: VehicleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_catchup_steps: DEFAULT_MAX_CATCHUP_STEPS,
            pending_capacity: DEFAULT_PENDING_CAPACITY,
            ping_interval_ms: 1000.0,
            projectile_lifetime_ms: 3000.0,
            quality: QualityConfig::default(),
            interpolation: InterpolationConfig::default(),
            vehicle: VehicleConfig::default(),
        }
    }
}
