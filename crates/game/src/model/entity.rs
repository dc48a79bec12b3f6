use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::transform::Transform;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one connected client inside the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EntityKind {
    #[default]
    Vehicle = 0,
    Projectile = 1,
    Flag = 2,
}

impl TryFrom<u8> for EntityKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Vehicle),
            1 => Ok(Self::Projectile),
            2 => Ok(Self::Flag),
            other => Err(other),
        }
    }
}

impl EntityKind {
    /// Ephemeral entities have their authoritative state replaced faster than
    /// the render cadence.
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Projectile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub health: f32,
    pub team: u8,
    pub score: u32,
    pub carrying_flag: Option<EntityId>,
    pub alive: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            health: 100.0,
            team: 0,
            score: 0,
            carrying_flag: None,
            alive: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub owner: Option<SessionId>,
    pub transform: Transform,
    pub game_state: GameState,
    /// Set while a remote entity is frozen past the extrapolation window.
    pub stale: bool,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            owner: None,
            transform: Transform::default(),
            game_state: GameState::default(),
            stale: false,
        }
    }

    pub fn vehicle(id: EntityId, owner: SessionId, spawn_position: Vec3) -> Self {
        Self {
            owner: Some(owner),
            transform: Transform::at(spawn_position),
            ..Self::new(id, EntityKind::Vehicle)
        }
    }

    pub fn is_owned_by(&self, session: &SessionId) -> bool {
        self.owner.as_ref() == Some(session)
    }
}
