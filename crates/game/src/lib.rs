pub mod interpolation;
pub mod model;
pub mod net;
pub mod prediction;
pub mod session;
pub mod simulation;
pub mod snapshot;

pub use interpolation::{InterpolationConfig, InterpolationEngine, RemoteSample, SampleMode};
pub use model::{
    ActionKind, ActionToken, Buttons, Entity, EntityId, EntityKind, GameState, InputCommand,
    SessionId, TickInfo, Transform, TransformError, TransformSnapshot,
};
pub use net::{
    ClientEvent, Message, NetworkQualityEstimator, NetworkStats, Packet, PacketHeader, Pong,
    ProtocolError, QualityConfig, QueuedTransport, RoundTrip, ServerClock, ServerEvent,
    TransformUpdate, Transport, TransportError, decode_client, decode_server, encode,
    quality_score,
};
pub use prediction::{
    FlightIntegrator, Integrator, PendingInputQueue, ReconcileOutcome, ReconcileReport,
    ReconcileState, Reconciler, VehicleConfig,
};
pub use session::{
    ClientConfig, ClientSession, FrameReport, InputFrame, InputSource, RoutedSnapshot,
    SessionError,
};
pub use simulation::FixedTimestep;
pub use snapshot::{EntityHandle, EntityStore, StateBuffer};
