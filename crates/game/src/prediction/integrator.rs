use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::model::{Buttons, EntityKind, InputCommand, Transform};

/// Advances one body by one fixed step. Implementations must be
/// deterministic: the same transform, input and `dt` always produce the same
/// result, or replay-based reconciliation diverges.
pub trait Integrator {
    fn advance(&self, kind: EntityKind, transform: &mut Transform, input: &InputCommand, dt: f32);

    /// Spawn pose of a projectile fired by `shooter`.
    fn muzzle_transform(&self, shooter: &Transform) -> Transform {
        Transform {
            angular_velocity: Vec3::ZERO,
            ..*shooter
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub thrust_acceleration: f32,
    pub strafe_acceleration: f32,
    pub lift_acceleration: f32,
    pub boost_multiplier: f32,
    pub max_speed: f32,
    pub boost_max_speed: f32,
    /// Fraction of velocity bled per second with no input.
    pub linear_damping: f32,
    /// Radians per unit of mouse delta.
    pub mouse_sensitivity: f32,
    /// Radians per second.
    pub roll_rate: f32,

    pub projectile_speed: f32,
    pub projectile_spawn_offset: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            thrust_acceleration: 40.0,
            strafe_acceleration: 25.0,
            lift_acceleration: 25.0,
            boost_multiplier: 1.8,
            max_speed: 60.0,
            boost_max_speed: 95.0,
            linear_damping: 1.5,
            mouse_sensitivity: 0.0025,
            roll_rate: 2.5,

            projectile_speed: 180.0,
            projectile_spawn_offset: 2.0,
        }
    }
}

/// Arcade flight model shared by client prediction and the authority.
#[derive(Debug, Clone, Default)]
pub struct FlightIntegrator {
    config: VehicleConfig,
}

impl FlightIntegrator {
    pub fn new(config: VehicleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    fn advance_vehicle(&self, transform: &mut Transform, input: &InputCommand, dt: f32) {
        let config = &self.config;
        let boosting = input.pressed(Buttons::BOOST);

        let yaw = -input.mouse_delta.x * config.mouse_sensitivity;
        let pitch = -input.mouse_delta.y * config.mouse_sensitivity;
        let roll = input.roll_axis() * config.roll_rate * dt;

        transform.rotation = (Quat::from_rotation_y(yaw)
            * transform.rotation
            * Quat::from_rotation_x(pitch)
            * Quat::from_rotation_z(roll))
        .normalize();
        transform.angular_velocity = if dt > 0.0 {
            Vec3::new(pitch, yaw, roll) / dt
        } else {
            Vec3::ZERO
        };

        let axes = input.move_axes();
        let mut local_accel = Vec3::new(
            axes.x * config.strafe_acceleration,
            axes.y * config.lift_acceleration,
            axes.z * config.thrust_acceleration,
        );
        if boosting {
            local_accel *= config.boost_multiplier;
        }

        let mut velocity = transform.linear_velocity + (transform.rotation * local_accel) * dt;
        velocity /= 1.0 + config.linear_damping * dt;

        let max_speed = if boosting {
            config.boost_max_speed
        } else {
            config.max_speed
        };
        velocity = velocity.clamp_length_max(max_speed);

        transform.linear_velocity = velocity;
        transform.position += velocity * dt;
    }
}

impl Integrator for FlightIntegrator {
    fn advance(&self, kind: EntityKind, transform: &mut Transform, input: &InputCommand, dt: f32) {
        match kind {
            EntityKind::Vehicle => self.advance_vehicle(transform, input, dt),
            EntityKind::Projectile => {
                transform.position += transform.linear_velocity * dt;
            }
            EntityKind::Flag => {}
        }
    }

    /// Ahead of the nose, moving along it on top of the shooter's own
    /// velocity.
    fn muzzle_transform(&self, shooter: &Transform) -> Transform {
        let forward = shooter.rotation * Vec3::NEG_Z;
        Transform {
            position: shooter.position + forward * self.config.projectile_spawn_offset,
            rotation: shooter.rotation,
            linear_velocity: shooter.linear_velocity + forward * self.config.projectile_speed,
            angular_velocity: Vec3::ZERO,
        }
    }
}
