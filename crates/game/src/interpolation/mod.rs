mod engine;

pub use engine::{
    DEFAULT_INTERPOLATION_DELAY_MS, InterpolationConfig, InterpolationEngine, RemoteSample,
    SampleMode,
};
