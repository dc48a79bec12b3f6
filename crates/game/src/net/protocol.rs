use glam::{Quat, Vec2, Vec3};
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::model::{
    ActionKind, ActionToken, Buttons, Entity, EntityId, EntityKind, GameState, InputCommand,
    SessionId, TickInfo, Transform, TransformError, TransformSnapshot,
};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x444F_4746;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("bad packet header (magic {magic:#x}, version {version})")]
    InvalidHeader { magic: u32, version: u32 },
    #[error("entity {entity_id}: {source}")]
    Transform {
        entity_id: String,
        #[source]
        source: TransformError,
    },
    #[error("unknown action kind {0}")]
    UnknownAction(u8),
    #[error("unknown entity kind {0}")]
    UnknownKind(u8),
    #[error("{0} is not valid in this direction")]
    UnexpectedMessage(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
        }
    }
}

impl PacketHeader {
    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireTransform {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub linear_velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
}

impl From<&Transform> for WireTransform {
    fn from(transform: &Transform) -> Self {
        Self {
            position: transform.position.into(),
            rotation: transform.rotation.into(),
            linear_velocity: transform.linear_velocity.into(),
            angular_velocity: transform.angular_velocity.into(),
        }
    }
}

impl WireTransform {
    pub fn decode(&self) -> Result<Transform, TransformError> {
        let rotation = Quat::from_array(self.rotation);
        let transform = Transform {
            position: Vec3::from(self.position),
            rotation,
            linear_velocity: Vec3::from(self.linear_velocity),
            angular_velocity: Vec3::from(self.angular_velocity),
        };
        transform.validate()?;
        Ok(Transform {
            rotation: rotation.normalize(),
            ..transform
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireTickInfo {
    pub tick: u32,
    pub timestamp_ms: f64,
    pub last_processed_input_tick: Option<u32>,
    pub last_processed_input_timestamp_ms: Option<f64>,
}

impl From<&TickInfo> for WireTickInfo {
    fn from(info: &TickInfo) -> Self {
        Self {
            tick: info.tick,
            timestamp_ms: info.timestamp_ms,
            last_processed_input_tick: info.last_processed_input_tick,
            last_processed_input_timestamp_ms: info.last_processed_input_timestamp_ms,
        }
    }
}

impl From<&WireTickInfo> for TickInfo {
    fn from(wire: &WireTickInfo) -> Self {
        Self {
            tick: wire.tick,
            timestamp_ms: wire.timestamp_ms,
            last_processed_input_tick: wire.last_processed_input_tick,
            last_processed_input_timestamp_ms: wire.last_processed_input_timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireAction {
    pub kind: u8,
    pub projectile_id: String,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireInput {
    pub buttons: u16,
    pub mouse_delta: [f32; 2],
    pub tick: u32,
    pub timestamp_ms: f64,
    pub action: Option<WireAction>,
}

impl From<&InputCommand> for WireInput {
    fn from(command: &InputCommand) -> Self {
        Self {
            buttons: command.buttons.bits(),
            mouse_delta: command.mouse_delta.into(),
            tick: command.tick,
            timestamp_ms: command.timestamp_ms,
            action: command.action.as_ref().map(|action| WireAction {
                kind: action.kind as u8,
                projectile_id: action.projectile_id.0.clone(),
            }),
        }
    }
}

impl WireInput {
    pub fn decode(self) -> Result<InputCommand, ProtocolError> {
        let action = match self.action {
            Some(action) => Some(ActionToken {
                kind: ActionKind::try_from(action.kind).map_err(ProtocolError::UnknownAction)?,
                projectile_id: EntityId(action.projectile_id),
            }),
            None => None,
        };
        let mouse_delta = Vec2::from(self.mouse_delta);

        Ok(InputCommand {
            buttons: Buttons::from_bits_truncate(self.buttons),
            mouse_delta: if mouse_delta.is_finite() {
                mouse_delta
            } else {
                Vec2::ZERO
            },
            tick: self.tick,
            timestamp_ms: self.timestamp_ms,
            action,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireGameState {
    pub health: f32,
    pub team: u8,
    pub score: u32,
    pub carrying_flag: Option<String>,
    pub alive: bool,
}

impl From<&GameState> for WireGameState {
    fn from(state: &GameState) -> Self {
        Self {
            health: state.health,
            team: state.team,
            score: state.score,
            carrying_flag: state.carrying_flag.as_ref().map(|id| id.0.clone()),
            alive: state.alive,
        }
    }
}

impl From<WireGameState> for GameState {
    fn from(wire: WireGameState) -> Self {
        Self {
            health: wire.health,
            team: wire.team,
            score: wire.score,
            carrying_flag: wire.carrying_flag.map(EntityId),
            alive: wire.alive,
        }
    }
}

/// Every record the room channel carries, in both directions.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Message {
    TransformUpdate {
        entity_id: String,
        kind: u8,
        owner: Option<String>,
        transform: WireTransform,
        tick: WireTickInfo,
    },
    GameStateUpdate {
        entity_id: String,
        state: WireGameState,
    },
    OwnerUpdate {
        entity_id: String,
        owner: Option<String>,
    },
    EntityRemoved {
        entity_id: String,
    },
    Pong {
        client_time_ms: f64,
        server_time_ms: f64,
        latency_ms: Option<f32>,
    },
    Command(WireInput),
    Ping {
        client_time_ms: f64,
    },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransformUpdate { .. } => "transform-update",
            Self::GameStateUpdate { .. } => "gamestate-update",
            Self::OwnerUpdate { .. } => "owner-update",
            Self::EntityRemoved { .. } => "entity-removed",
            Self::Pong { .. } => "pong",
            Self::Command(_) => "command",
            Self::Ping { .. } => "ping",
        }
    }

    pub fn transform_update(entity: &Entity, tick: &TickInfo) -> Self {
        Self::TransformUpdate {
            entity_id: entity.id.0.clone(),
            kind: entity.kind as u8,
            owner: entity.owner.as_ref().map(|owner| owner.0.clone()),
            transform: WireTransform::from(&entity.transform),
            tick: WireTickInfo::from(tick),
        }
    }

    pub fn game_state_update(entity: &Entity) -> Self {
        Self::GameStateUpdate {
            entity_id: entity.id.0.clone(),
            state: WireGameState::from(&entity.game_state),
        }
    }

    pub fn command(command: &InputCommand) -> Self {
        Self::Command(WireInput::from(command))
    }

    /// Decode a server-originated record into its typed event.
    pub fn into_server_event(self) -> Result<ServerEvent, ProtocolError> {
        match self {
            Self::TransformUpdate {
                entity_id,
                kind,
                owner,
                transform,
                tick,
            } => {
                let kind = EntityKind::try_from(kind).map_err(ProtocolError::UnknownKind)?;
                let transform = transform
                    .decode()
                    .map_err(|source| ProtocolError::Transform {
                        entity_id: entity_id.clone(),
                        source,
                    })?;
                Ok(ServerEvent::Transform(TransformUpdate {
                    entity_id: EntityId(entity_id),
                    kind,
                    owner: owner.map(SessionId),
                    snapshot: TransformSnapshot::new(transform, TickInfo::from(&tick)),
                }))
            }
            Self::GameStateUpdate { entity_id, state } => Ok(ServerEvent::GameState {
                entity_id: EntityId(entity_id),
                state: state.into(),
            }),
            Self::OwnerUpdate { entity_id, owner } => Ok(ServerEvent::Owner {
                entity_id: EntityId(entity_id),
                owner: owner.map(SessionId),
            }),
            Self::EntityRemoved { entity_id } => Ok(ServerEvent::Removed {
                entity_id: EntityId(entity_id),
            }),
            Self::Pong {
                client_time_ms,
                server_time_ms,
                latency_ms,
            } => Ok(ServerEvent::Pong(Pong {
                client_time_ms,
                server_time_ms,
                latency_ms,
            })),
            other => Err(ProtocolError::UnexpectedMessage(other.name())),
        }
    }

    /// Decode a client-originated record.
    pub fn into_client_event(self) -> Result<ClientEvent, ProtocolError> {
        match self {
            Self::Command(input) => Ok(ClientEvent::Command(input.decode()?)),
            Self::Ping { client_time_ms } => Ok(ClientEvent::Ping { client_time_ms }),
            other => Err(ProtocolError::UnexpectedMessage(other.name())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformUpdate {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub owner: Option<SessionId>,
    pub snapshot: TransformSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pong {
    pub client_time_ms: f64,
    pub server_time_ms: f64,
    pub latency_ms: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Transform(TransformUpdate),
    GameState {
        entity_id: EntityId,
        state: GameState,
    },
    Owner {
        entity_id: EntityId,
        owner: Option<SessionId>,
    },
    Removed {
        entity_id: EntityId,
    },
    Pong(Pong),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Command(InputCommand),
    Ping { client_time_ms: f64 },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Message,
}

impl Packet {
    pub fn new(payload: Message) -> Self {
        Self {
            header: PacketHeader::default(),
            payload,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(ProtocolError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let packet = rkyv::from_bytes::<Self, rancor::Error>(&aligned)
            .map_err(ProtocolError::Deserialize)?;
        if !packet.header.is_valid() {
            return Err(ProtocolError::InvalidHeader {
                magic: packet.header.magic,
                version: packet.header.version,
            });
        }
        Ok(packet)
    }
}

pub fn encode(message: Message) -> Result<Vec<u8>, ProtocolError> {
    let bytes = Packet::new(message).serialize()?;
    if bytes.len() > MAX_PACKET_SIZE {
        log::warn!("packet of {} bytes exceeds MTU budget", bytes.len());
    }
    Ok(bytes)
}

pub fn decode_server(data: &[u8]) -> Result<ServerEvent, ProtocolError> {
    Packet::deserialize(data)?.payload.into_server_event()
}

pub fn decode_client(data: &[u8]) -> Result<ClientEvent, ProtocolError> {
    Packet::deserialize(data)?.payload.into_client_event()
}
