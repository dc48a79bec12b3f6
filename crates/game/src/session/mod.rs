mod client;
mod config;
mod input;

pub use client::{ClientSession, FrameReport, RoutedSnapshot, SessionError};
pub use config::ClientConfig;
pub use input::{InputFrame, InputSource};
