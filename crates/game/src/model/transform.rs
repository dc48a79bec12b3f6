use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("non-finite position {0:?}")]
    Position(Vec3),
    #[error("non-finite rotation {0:?}")]
    Rotation(Quat),
    #[error("non-finite linear velocity {0:?}")]
    LinearVelocity(Vec3),
    #[error("non-finite angular velocity {0:?}")]
    AngularVelocity(Vec3),
    #[error("degenerate rotation (length {0})")]
    DegenerateRotation(f32),
}

/// Kinematic state of a networked body.
///
/// `rotation` is kept unit length: every operation here that produces a new
/// rotation renormalises it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        if !self.position.is_finite() {
            return Err(TransformError::Position(self.position));
        }
        if !self.rotation.is_finite() {
            return Err(TransformError::Rotation(self.rotation));
        }
        let length = self.rotation.length();
        if length < 1e-6 {
            return Err(TransformError::DegenerateRotation(length));
        }
        if !self.linear_velocity.is_finite() {
            return Err(TransformError::LinearVelocity(self.linear_velocity));
        }
        if !self.angular_velocity.is_finite() {
            return Err(TransformError::AngularVelocity(self.angular_velocity));
        }
        Ok(())
    }

    pub fn renormalize(&mut self) {
        self.rotation = self.rotation.normalize();
    }

    /// Blend between two poses. Position and velocities are lerped
    /// component-wise, rotation is slerped along the shortest arc.
    pub fn interpolate(from: &Transform, to: &Transform, t: f32) -> Transform {
        let t = t.clamp(0.0, 1.0);

        let from_rot = from.rotation.normalize();
        let mut to_rot = to.rotation.normalize();
        if from_rot.dot(to_rot) < 0.0 {
            to_rot = -to_rot;
        }

        Transform {
            position: from.position.lerp(to.position, t),
            rotation: from_rot.slerp(to_rot, t).normalize(),
            linear_velocity: from.linear_velocity.lerp(to.linear_velocity, t),
            angular_velocity: from.angular_velocity.lerp(to.angular_velocity, t),
        }
    }

    /// Dead-reckon forward by `dt` seconds using `velocity` for translation
    /// and the body's own angular velocity for rotation.
    pub fn extrapolated(&self, velocity: Vec3, dt: f32) -> Transform {
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        Transform {
            position: self.position + velocity * dt,
            rotation: (spin * self.rotation).normalize(),
            linear_velocity: velocity,
            angular_velocity: self.angular_velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_nan_fields() {
        let mut transform = Transform::at(Vec3::new(1.0, 2.0, 3.0));
        assert!(transform.is_finite());

        transform.linear_velocity.y = f32::NAN;
        assert!(matches!(
            transform.validate(),
            Err(TransformError::LinearVelocity(_))
        ));

        let zero_rot = Transform {
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
            ..Default::default()
        };
        assert!(matches!(
            zero_rot.validate(),
            Err(TransformError::DegenerateRotation(_))
        ));
    }

    #[test]
    fn interpolation_midpoint() {
        let a = Transform::at(Vec3::ZERO);
        let b = Transform {
            position: Vec3::new(10.0, 20.0, 30.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            linear_velocity: Vec3::new(2.0, 0.0, 0.0),
            angular_velocity: Vec3::ZERO,
        };

        let mid = Transform::interpolate(&a, &b, 0.5);

        assert!((mid.position - Vec3::new(5.0, 10.0, 15.0)).length() < 1e-5);
        assert!((mid.linear_velocity.x - 1.0).abs() < 1e-5);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.rotation.angle_between(expected) < 1e-3);
        assert!((mid.rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn interpolation_takes_shortest_arc() {
        let a = Transform::default();
        let b = Transform {
            rotation: -Quat::from_rotation_z(0.2),
            ..Default::default()
        };

        let mid = Transform::interpolate(&a, &b, 0.5);
        assert!(mid.rotation.angle_between(Quat::from_rotation_z(0.1)) < 1e-3);
    }

    #[test]
    fn extrapolation_spins_and_stays_normalized() {
        let transform = Transform {
            angular_velocity: Vec3::new(0.0, 1.0, 0.0),
            ..Transform::at(Vec3::new(1.0, 0.0, 0.0))
        };

        let ahead = transform.extrapolated(Vec3::new(4.0, 0.0, 0.0), 0.5);

        assert!((ahead.position.x - 3.0).abs() < 1e-5);
        assert!(ahead.rotation.angle_between(Quat::from_rotation_y(0.5)) < 1e-3);
        assert!((ahead.rotation.length() - 1.0).abs() < 1e-6);
    }
}
