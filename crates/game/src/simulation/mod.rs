mod tick;

pub use tick::{DEFAULT_MAX_CATCHUP_STEPS, DEFAULT_TICK_RATE, FixedTimestep};
