mod buffer;
mod world;

pub use buffer::StateBuffer;
pub use world::{EntityHandle, EntityStore};
