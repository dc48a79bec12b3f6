mod clock;
mod protocol;
mod stats;
mod transport;

pub use clock::ServerClock;
pub use protocol::{
    ClientEvent, MAX_PACKET_SIZE, Message, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet, PacketHeader,
    Pong, ProtocolError, ServerEvent, TransformUpdate, WireGameState, WireInput, WireTickInfo,
    WireTransform, decode_client, decode_server, encode,
};
pub use stats::{NetworkQualityEstimator, NetworkStats, QualityConfig, RoundTrip, quality_score};
pub use transport::{QueuedTransport, TrafficStats, Transport, TransportError};
