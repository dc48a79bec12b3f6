use bitflags::bitflags;
use glam::Vec2;

use super::entity::EntityId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u16 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const ASCEND = 1 << 4;
        const DESCEND = 1 << 5;
        const ROLL_LEFT = 1 << 6;
        const ROLL_RIGHT = 1 << 7;
        const BOOST = 1 << 8;
        const FIRE = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionKind {
    Fire = 0,
}

impl TryFrom<u8> for ActionKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fire),
            other => Err(other),
        }
    }
}

/// Discrete one-shot action, correlated to the entity it spawned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionToken {
    pub kind: ActionKind,
    pub projectile_id: EntityId,
}

/// One tick worth of pilot input, stamped with the local tick it was
/// generated on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputCommand {
    pub buttons: Buttons,
    pub mouse_delta: Vec2,
    pub tick: u32,
    pub timestamp_ms: f64,
    pub action: Option<ActionToken>,
}

impl InputCommand {
    pub fn new(tick: u32, timestamp_ms: f64) -> Self {
        Self {
            tick,
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_mouse_delta(mut self, delta: Vec2) -> Self {
        self.mouse_delta = delta;
        self
    }

    #[inline]
    pub fn pressed(&self, button: Buttons) -> bool {
        self.buttons.contains(button)
    }

    /// An idle command changes nothing on the server, so it is neither sent
    /// nor kept for replay.
    pub fn is_idle(&self) -> bool {
        self.buttons.is_empty() && self.mouse_delta == Vec2::ZERO && self.action.is_none()
    }

    /// Movement intent in body space: x = strafe, y = lift, z = thrust
    /// (negative z is forward).
    pub fn move_axes(&self) -> glam::Vec3 {
        let axis = |pos: Buttons, neg: Buttons| -> f32 {
            match (self.pressed(pos), self.pressed(neg)) {
                (true, false) => 1.0,
                (false, true) => -1.0,
                _ => 0.0,
            }
        };
        glam::Vec3::new(
            axis(Buttons::RIGHT, Buttons::LEFT),
            axis(Buttons::ASCEND, Buttons::DESCEND),
            axis(Buttons::BACKWARD, Buttons::FORWARD),
        )
    }

    pub fn roll_axis(&self) -> f32 {
        match (
            self.pressed(Buttons::ROLL_LEFT),
            self.pressed(Buttons::ROLL_RIGHT),
        ) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_detection() {
        let idle = InputCommand::new(1, 16.0);
        assert!(idle.is_idle());

        assert!(!idle.clone().with_buttons(Buttons::FORWARD).is_idle());
        assert!(!idle.clone().with_mouse_delta(Vec2::new(0.0, 0.5)).is_idle());

        let mut firing = idle;
        firing.action = Some(ActionToken {
            kind: ActionKind::Fire,
            projectile_id: EntityId::from("p-1"),
        });
        assert!(!firing.is_idle());
    }

    #[test]
    fn opposing_buttons_cancel() {
        let command = InputCommand::new(0, 0.0)
            .with_buttons(Buttons::FORWARD | Buttons::BACKWARD | Buttons::RIGHT);
        let axes = command.move_axes();
        assert_eq!(axes.z, 0.0);
        assert_eq!(axes.x, 1.0);
    }
}
