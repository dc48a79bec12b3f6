use glam::Vec2;

use crate::model::{Buttons, InputCommand};

/// Raw pilot input for one tick, before it is stamped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub buttons: Buttons,
    pub mouse_delta: Vec2,
    pub fire: bool,
}

impl InputFrame {
    pub fn to_command(&self, tick: u32, timestamp_ms: f64) -> InputCommand {
        let mut buttons = self.buttons;
        buttons.set(Buttons::FIRE, self.fire);

        let mouse_delta = if self.mouse_delta.is_finite() {
            self.mouse_delta
        } else {
            Vec2::ZERO
        };

        InputCommand::new(tick, timestamp_ms)
            .with_buttons(buttons)
            .with_mouse_delta(mouse_delta)
    }
}

/// Keyboard/mouse collaborator, polled once per simulation tick.
pub trait InputSource {
    fn poll(&mut self) -> InputFrame;
}

impl<F> InputSource for F
where
    F: FnMut() -> InputFrame,
{
    fn poll(&mut self) -> InputFrame {
        self()
    }
}
