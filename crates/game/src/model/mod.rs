mod entity;
mod input;
mod tick;
mod transform;

pub use entity::{Entity, EntityId, EntityKind, GameState, SessionId};
pub use input::{ActionKind, ActionToken, Buttons, InputCommand};
pub use tick::{TickInfo, TransformSnapshot};
pub use transform::{Transform, TransformError};
