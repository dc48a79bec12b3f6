use std::collections::{HashMap, VecDeque};

use dogfight::{
    ActionKind, ClientEvent, Entity, EntityId, EntityKind, EntityStore, FixedTimestep,
    FlightIntegrator, InputCommand, Integrator, Message, ProtocolError, SessionId, TickInfo,
    Transform, VehicleConfig, decode_client, encode,
};
use glam::{Quat, Vec3};

const DRONE_CENTER: Vec3 = Vec3::new(0.0, 20.0, -60.0);
const DRONE_RADIUS: f32 = 40.0;
/// Radians per second.
const DRONE_ANGULAR_SPEED: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    pub tick_rate: u32,
    pub snapshot_rate: u32,
    /// Answer pings with a server-side one-way latency estimate.
    pub report_latency: bool,
    /// The server clock runs this far ahead of the client's.
    pub clock_offset_ms: f64,
    pub projectile_lifetime_ms: f64,
    pub command_buffer: usize,
    pub vehicle: VehicleConfig,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            snapshot_rate: 20,
            report_latency: false,
            clock_offset_ms: 5_000.0,
            projectile_lifetime_ms: 2_000.0,
            command_buffer: 64,
            vehicle: VehicleConfig::default(),
        }
    }
}

/// Commands waiting for their server tick, oldest first.
#[derive(Debug)]
struct CommandBuffer {
    commands: VecDeque<InputCommand>,
    max_size: usize,
}

impl CommandBuffer {
    fn new(max_size: usize) -> Self {
        Self {
            commands: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    /// Inserted in tick order; jitter on the link may deliver them shuffled.
    fn push(&mut self, command: InputCommand) {
        let index = self
            .commands
            .partition_point(|queued| queued.tick <= command.tick);
        self.commands.insert(index, command);
        while self.commands.len() > self.max_size {
            self.commands.pop_front();
        }
    }

    fn pop(&mut self) -> Option<InputCommand> {
        self.commands.pop_front()
    }
}

#[derive(Debug, Clone, Copy)]
struct Ack {
    tick: u32,
    timestamp_ms: f64,
}

/// In-process authoritative server for a single client session: applies its
/// commands with the shared flight model, flies a scripted drone and
/// broadcasts snapshots at a fixed rate.
pub struct AuthorityStub {
    config: AuthorityConfig,
    integrator: FlightIntegrator,
    timestep: FixedTimestep,
    entities: EntityStore,
    session: SessionId,
    vehicle_id: EntityId,
    drone_id: EntityId,
    commands: CommandBuffer,
    last_processed: Option<Ack>,
    projectiles: HashMap<EntityId, f64>,
    latency_ms: Option<f32>,
    outbox: Vec<Message>,
    joined: bool,
    score: u32,
}

impl AuthorityStub {
    pub fn new(config: AuthorityConfig, session: SessionId) -> Self {
        Self {
            integrator: FlightIntegrator::new(config.vehicle.clone()),
            timestep: FixedTimestep::new(config.tick_rate, u32::MAX),
            entities: EntityStore::new(),
            vehicle_id: EntityId(format!("{session}:vehicle")),
            drone_id: EntityId::from("drone"),
            commands: CommandBuffer::new(config.command_buffer),
            last_processed: None,
            projectiles: HashMap::new(),
            latency_ms: None,
            outbox: Vec::new(),
            joined: false,
            score: 0,
            session,
            config,
        }
    }

    pub fn vehicle(&self) -> Option<&Entity> {
        self.entities.get_by_id(&self.vehicle_id)
    }

    fn server_time(&self, now_ms: f64) -> f64 {
        now_ms + self.config.clock_offset_ms
    }

    pub fn receive(&mut self, frame: &[u8], now_ms: f64) -> Result<(), ProtocolError> {
        match decode_client(frame)? {
            ClientEvent::Command(command) => {
                let sample = (now_ms - command.timestamp_ms) as f32;
                if sample.is_finite() && sample >= 0.0 {
                    self.latency_ms = Some(match self.latency_ms {
                        Some(latency) => latency * 0.9 + sample * 0.1,
                        None => sample,
                    });
                }

                if self
                    .last_processed
                    .is_some_and(|ack| command.tick <= ack.tick)
                {
                    log::debug!("authority: late command {} ignored", command.tick);
                    return Ok(());
                }
                self.commands.push(command);
            }
            ClientEvent::Ping { client_time_ms } => {
                self.outbox.push(Message::Pong {
                    client_time_ms,
                    server_time_ms: self.server_time(now_ms),
                    latency_ms: self.latency_ms.filter(|_| self.config.report_latency),
                });
            }
        }
        Ok(())
    }

    /// Run the server ticks due by `now_ms` and return the encoded frames to
    /// put on the downlink.
    pub fn advance(&mut self, delta_secs: f32, now_ms: f64) -> Result<Vec<Vec<u8>>, ProtocolError> {
        if !self.joined {
            self.join();
        }

        for tick in self.timestep.advance(delta_secs) {
            self.step(tick, now_ms);
        }

        std::mem::take(&mut self.outbox)
            .into_iter()
            .map(encode)
            .collect()
    }

    fn join(&mut self) {
        let vehicle = Entity::vehicle(
            self.vehicle_id.clone(),
            self.session.clone(),
            Vec3::new(0.0, 10.0, 0.0),
        );
        self.outbox.push(Message::OwnerUpdate {
            entity_id: vehicle.id.0.clone(),
            owner: Some(self.session.0.clone()),
        });
        self.entities.insert(vehicle);

        let mut drone = Entity::new(self.drone_id.clone(), EntityKind::Vehicle);
        drone.owner = Some(SessionId::from("ai"));
        drone.game_state.team = 1;
        self.entities.insert(drone);

        let mut flag = Entity::new(EntityId::from("flag:red"), EntityKind::Flag);
        flag.transform = Transform::at(Vec3::new(30.0, 2.0, -90.0));
        self.entities.insert(flag);

        self.joined = true;
        log::info!("authority: {} joined as {}", self.session, self.vehicle_id);
    }

    fn step(&mut self, tick: u32, now_ms: f64) {
        let dt = self.timestep.dt();
        let server_time = self.server_time(now_ms);

        let command = match self.commands.pop() {
            Some(command) => {
                self.last_processed = Some(Ack {
                    tick: command.tick,
                    timestamp_ms: command.timestamp_ms,
                });
                command
            }
            None => InputCommand::default(),
        };

        if let Some(action) = &command.action {
            if action.kind == ActionKind::Fire {
                self.spawn_projectile(action.projectile_id.clone(), server_time);
            }
        }

        for entity in self.entities.iter_mut() {
            match entity.kind {
                EntityKind::Vehicle if entity.id == self.vehicle_id => {
                    self.integrator
                        .advance(entity.kind, &mut entity.transform, &command, dt);
                }
                EntityKind::Vehicle if entity.id == self.drone_id => {
                    entity.transform = drone_transform(server_time / 1000.0);
                }
                kind => self
                    .integrator
                    .advance(kind, &mut entity.transform, &command, dt),
            }
        }

        self.expire_projectiles(server_time);

        let snapshot_every = (self.config.tick_rate / self.config.snapshot_rate.max(1)).max(1);
        if tick % snapshot_every == 0 {
            self.broadcast(tick, server_time);
        }
        if tick % self.config.tick_rate.max(1) == 0 {
            self.score += 1;
            if let Some(vehicle) = self.entities.get_by_id_mut(&self.vehicle_id) {
                vehicle.game_state.score = self.score;
                self.outbox.push(Message::game_state_update(vehicle));
            }
        }
    }

    fn spawn_projectile(&mut self, id: EntityId, server_time: f64) {
        let Some(shooter) = self.entities.get_by_id(&self.vehicle_id) else {
            return;
        };
        let projectile = Entity {
            owner: Some(self.session.clone()),
            transform: self.integrator.muzzle_transform(&shooter.transform),
            ..Entity::new(id.clone(), EntityKind::Projectile)
        };
        self.entities.insert(projectile);
        self.projectiles.insert(id, server_time);
    }

    fn expire_projectiles(&mut self, server_time: f64) {
        let lifetime = self.config.projectile_lifetime_ms;
        let expired: Vec<EntityId> = self
            .projectiles
            .iter()
            .filter(|(_, spawned)| server_time - **spawned > lifetime)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            self.projectiles.remove(&id);
            self.entities.remove_by_id(&id);
            self.outbox.push(Message::EntityRemoved { entity_id: id.0 });
        }
    }

    fn broadcast(&mut self, tick: u32, server_time: f64) {
        let mut info = TickInfo::new(tick, server_time);
        if let Some(ack) = self.last_processed {
            info = info.with_ack(ack.tick, ack.timestamp_ms);
        }
        for entity in self.entities.iter() {
            self.outbox.push(Message::transform_update(entity, &info));
        }
    }
}

fn drone_transform(time_secs: f64) -> Transform {
    let angle = (time_secs * DRONE_ANGULAR_SPEED as f64 % std::f64::consts::TAU) as f32;
    let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * DRONE_RADIUS;
    let velocity =
        Vec3::new(-angle.sin(), 0.0, angle.cos()) * DRONE_RADIUS * DRONE_ANGULAR_SPEED;

    Transform {
        position: DRONE_CENTER + offset,
        rotation: Quat::from_rotation_y(-angle),
        linear_velocity: velocity,
        angular_velocity: Vec3::new(0.0, -DRONE_ANGULAR_SPEED, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use dogfight::{Buttons, ServerEvent, decode_server};

    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn events(frames: Vec<Vec<u8>>) -> Vec<ServerEvent> {
        frames
            .iter()
            .map(|frame| decode_server(frame).unwrap())
            .collect()
    }

    #[test]
    fn acks_processed_commands() {
        let mut authority = AuthorityStub::new(AuthorityConfig::default(), SessionId::from("me"));
        for tick in 0..3 {
            let command = InputCommand::new(tick, tick as f64 * 16.0).with_buttons(Buttons::FORWARD);
            authority
                .receive(&encode(Message::command(&command)).unwrap(), 0.0)
                .unwrap();
        }

        // The first tick broadcasts a snapshot.
        let events = events(authority.advance(FRAME, 16.0).unwrap());

        let acked = events.iter().find_map(|event| match event {
            ServerEvent::Transform(update) if update.entity_id == authority.vehicle_id => {
                Some(update.snapshot.tick.last_processed_input_tick)
            }
            _ => None,
        });
        assert_eq!(acked, Some(Some(0)));
        assert_eq!(authority.commands.commands.len(), 2);
    }

    #[test]
    fn late_commands_are_ignored() {
        let mut authority = AuthorityStub::new(AuthorityConfig::default(), SessionId::from("me"));
        let command = InputCommand::new(5, 0.0).with_buttons(Buttons::FORWARD);
        authority
            .receive(&encode(Message::command(&command)).unwrap(), 0.0)
            .unwrap();
        authority.advance(FRAME, 16.0).unwrap();

        let late = InputCommand::new(4, 0.0).with_buttons(Buttons::FORWARD);
        authority
            .receive(&encode(Message::command(&late)).unwrap(), 20.0)
            .unwrap();

        assert_eq!(authority.commands.commands.len(), 0);
    }

    #[test]
    fn pong_carries_server_time() {
        let config = AuthorityConfig {
            clock_offset_ms: 1_000.0,
            ..Default::default()
        };
        let mut authority = AuthorityStub::new(config, SessionId::from("me"));
        authority
            .receive(
                &encode(Message::Ping {
                    client_time_ms: 40.0,
                })
                .unwrap(),
                60.0,
            )
            .unwrap();

        let events = events(authority.advance(0.0, 60.0).unwrap());

        assert!(events.iter().any(|event| matches!(
            event,
            ServerEvent::Pong(pong)
                if pong.client_time_ms == 40.0
                    && pong.server_time_ms == 1_060.0
                    && pong.latency_ms.is_none()
        )));
    }

    #[test]
    fn drone_flies_a_circle() {
        for t in [0.0, 1.3, 7.9, 100.0] {
            let transform = drone_transform(t);
            let radius = (transform.position - DRONE_CENTER).length();
            assert!((radius - DRONE_RADIUS).abs() < 1e-3);
            assert!(transform.is_finite());
        }
    }
}
