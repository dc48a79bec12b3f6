use dogfight::{Buttons, InputFrame, InputSource};
use glam::Vec2;

/// Deterministic flight script: climbs, banks, coasts idle and fires in
/// bursts, cycling every few seconds of ticks.
#[derive(Debug, Default)]
pub struct ScriptedPilot {
    tick: u32,
}

const CYCLE_TICKS: u32 = 600;

impl ScriptedPilot {
    pub fn new() -> Self {
        Self::default()
    }

    fn frame_at(tick: u32) -> InputFrame {
        let phase = tick % CYCLE_TICKS;
        match phase {
            // Full throttle climb.
            0..120 => InputFrame {
                buttons: Buttons::FORWARD | Buttons::ASCEND,
                ..Default::default()
            },
            // Banking turn with the mouse.
            120..240 => InputFrame {
                buttons: Buttons::FORWARD | Buttons::ROLL_LEFT,
                mouse_delta: Vec2::new(6.0, -1.0),
                ..Default::default()
            },
            // Coast with hands off.
            240..330 => InputFrame::default(),
            // Strafing run, a shot every 15 ticks.
            330..450 => InputFrame {
                buttons: Buttons::FORWARD | Buttons::BOOST | Buttons::RIGHT,
                fire: phase % 15 == 0,
                ..Default::default()
            },
            // Level out and descend.
            450..540 => InputFrame {
                buttons: Buttons::FORWARD | Buttons::DESCEND | Buttons::ROLL_RIGHT,
                mouse_delta: Vec2::new(-6.0, 1.0),
                ..Default::default()
            },
            _ => InputFrame::default(),
        }
    }
}

impl InputSource for ScriptedPilot {
    fn poll(&mut self) -> InputFrame {
        let frame = Self::frame_at(self.tick);
        self.tick = self.tick.wrapping_add(1);
        frame
    }
}
