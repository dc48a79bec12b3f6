use std::collections::HashMap;

use crate::interpolation::InterpolationEngine;
use crate::model::{
    ActionKind, ActionToken, Entity, EntityId, EntityKind, InputCommand, SessionId, Transform,
};
use crate::net::{
    Message, NetworkQualityEstimator, NetworkStats, Pong, ProtocolError, RoundTrip, ServerClock,
    ServerEvent, Transport, TransportError, TransformUpdate, decode_server, encode,
};
use crate::prediction::{
    FlightIntegrator, Integrator, PendingInputQueue, ReconcileOutcome, Reconciler,
};
use crate::simulation::FixedTimestep;
use crate::snapshot::EntityStore;

use super::config::ClientConfig;
use super::input::InputSource;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A transform update after the one local-or-remote decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedSnapshot {
    Local(TransformUpdate),
    Remote(TransformUpdate),
}

impl RoutedSnapshot {
    pub fn classify(update: TransformUpdate, session: &SessionId) -> Self {
        if update.owner.as_ref() == Some(session) {
            Self::Local(update)
        } else {
            Self::Remote(update)
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub steps: u32,
    pub inputs_sent: u32,
    pub reconciliations: u32,
    pub stale_snapshots: u32,
    /// Largest prediction correction applied this frame, in world units.
    pub max_correction: f32,
    pub pings_sent: u32,
    pub rejected_packets: u32,
    pub remotes_sampled: u32,
    pub remotes_frozen: u32,
}

/// Client side of one room connection: predicts the entities this session
/// owns, reconciles them against the server and interpolates everyone else.
pub struct ClientSession<I: Integrator = FlightIntegrator> {
    session_id: SessionId,
    config: ClientConfig,
    integrator: I,
    entities: EntityStore,
    local_entity: Option<EntityId>,
    pending: PendingInputQueue,
    reconcilers: HashMap<EntityId, Reconciler>,
    inbound_local: Vec<TransformUpdate>,
    predicted_projectiles: HashMap<EntityId, f64>,
    next_projectile: u32,
    interpolation: InterpolationEngine,
    estimator: NetworkQualityEstimator,
    clock: ServerClock,
    timestep: FixedTimestep,
    last_ping_ms: Option<f64>,
}

impl ClientSession<FlightIntegrator> {
    pub fn with_flight_model(session_id: SessionId, config: ClientConfig) -> Self {
        let integrator = FlightIntegrator::new(config.vehicle.clone());
        Self::new(session_id, config, integrator)
    }
}

impl<I: Integrator> ClientSession<I> {
    pub fn new(session_id: SessionId, config: ClientConfig, integrator: I) -> Self {
        Self {
            entities: EntityStore::new(),
            local_entity: None,
            pending: PendingInputQueue::new(config.pending_capacity),
            reconcilers: HashMap::new(),
            inbound_local: Vec::new(),
            predicted_projectiles: HashMap::new(),
            next_projectile: 0,
            interpolation: InterpolationEngine::new(config.interpolation.clone()),
            estimator: NetworkQualityEstimator::new(config.quality.clone(), &config.interpolation),
            clock: ServerClock::default(),
            timestep: FixedTimestep::new(config.tick_rate, config.max_catchup_steps),
            last_ping_ms: None,
            session_id,
            config,
            integrator,
        }
    }

    /// Decode one inbound frame and route it. Wire faults are returned;
    /// everything past decoding is recovered locally.
    pub fn handle_packet(&mut self, frame: &[u8], now_ms: f64) -> Result<(), SessionError> {
        let event = decode_server(frame)?;
        self.handle_event(event, now_ms);
        Ok(())
    }

    pub fn handle_event(&mut self, event: ServerEvent, now_ms: f64) {
        match event {
            ServerEvent::Transform(update) => self.handle_transform(update, now_ms),
            ServerEvent::GameState { entity_id, state } => {
                self.ensure_entity(&entity_id, EntityKind::default(), None)
                    .game_state = state;
            }
            ServerEvent::Owner { entity_id, owner } => self.handle_owner(entity_id, owner),
            ServerEvent::Removed { entity_id } => self.remove_entity(&entity_id),
            ServerEvent::Pong(pong) => self.handle_pong(pong, now_ms),
        }
    }

    fn handle_transform(&mut self, update: TransformUpdate, now_ms: f64) {
        self.clock
            .observe_snapshot(update.snapshot.timestamp_ms(), now_ms);

        self.ensure_entity(&update.entity_id, update.kind, update.owner.clone())
            .kind = update.kind;
        self.set_owner(&update.entity_id, update.owner.clone());

        match RoutedSnapshot::classify(update, &self.session_id) {
            RoutedSnapshot::Local(update) => {
                self.predicted_projectiles.remove(&update.entity_id);
                self.bind_local(&update.entity_id);
                log::trace!(
                    "local snapshot {} tick {}",
                    update.entity_id,
                    update.snapshot.tick.tick
                );
                self.inbound_local.push(update);
            }
            RoutedSnapshot::Remote(update) => {
                let pose = update.snapshot.transform;
                if let Err(err) = self.interpolation.push(&update.entity_id, update.snapshot) {
                    log::warn!("dropping snapshot for {}: {}", update.entity_id, err);
                    return;
                }
                // Nothing to interpolate between yet, show the one pose we have.
                if self.interpolation.buffered(&update.entity_id) < 2 {
                    if let Some(entity) = self.entities.get_by_id_mut(&update.entity_id) {
                        entity.transform = pose;
                        entity.stale = false;
                    }
                }
            }
        }
    }

    fn handle_owner(&mut self, entity_id: EntityId, owner: Option<SessionId>) {
        self.ensure_entity(&entity_id, EntityKind::default(), None);
        self.set_owner(&entity_id, owner);
        if self.is_local(&entity_id) {
            self.bind_local(&entity_id);
        }
    }

    /// Moves an entity between the predicted and interpolated sides when its
    /// owner changes.
    fn set_owner(&mut self, id: &EntityId, owner: Option<SessionId>) {
        let was_local = self.is_local(id);
        if let Some(entity) = self.entities.get_by_id_mut(id) {
            entity.owner = owner;
        }
        let is_local = self.is_local(id);
        if was_local == is_local {
            return;
        }

        log::info!("{} is now {}", id, if is_local { "local" } else { "remote" });
        if is_local {
            self.interpolation.remove(id);
        } else {
            self.release_local(id);
        }
    }

    fn bind_local(&mut self, id: &EntityId) {
        if self.local_entity.is_some() {
            return;
        }
        let is_vehicle = self
            .entities
            .get_by_id(id)
            .is_some_and(|entity| entity.kind == EntityKind::Vehicle);
        if is_vehicle {
            log::info!("bound local vehicle {}", id);
            self.local_entity = Some(id.clone());
        }
    }

    fn handle_pong(&mut self, pong: Pong, now_ms: f64) {
        let round_trip = RoundTrip {
            client_send_ms: pong.client_time_ms,
            client_receive_ms: now_ms,
            server_time_ms: pong.server_time_ms,
            reported_latency_ms: pong.latency_ms,
        };
        self.clock.observe_round_trip(&round_trip);
        self.estimator.record_round_trip(&round_trip);
    }

    fn ensure_entity(
        &mut self,
        id: &EntityId,
        kind: EntityKind,
        owner: Option<SessionId>,
    ) -> &mut Entity {
        self.entities.get_or_insert_with(id, || {
            log::debug!("tracking {} ({:?})", id, kind);
            Entity {
                owner,
                ..Entity::new(id.clone(), kind)
            }
        })
    }

    fn remove_entity(&mut self, id: &EntityId) {
        if self.entities.remove_by_id(id).is_some() {
            log::debug!("removed {}", id);
        }
        self.interpolation.remove(id);
        self.predicted_projectiles.remove(id);
        self.release_local(id);
    }

    fn release_local(&mut self, id: &EntityId) {
        self.reconcilers.remove(id);
        self.inbound_local.retain(|update| &update.entity_id != id);
        if self.local_entity.as_ref() == Some(id) {
            log::info!("lost local vehicle {}", id);
            self.local_entity = None;
            self.pending.clear();
        }
    }

    fn is_local(&self, id: &EntityId) -> bool {
        self.entities
            .get_by_id(id)
            .is_some_and(|entity| entity.is_owned_by(&self.session_id))
    }

    /// One render frame: drain the transport, run the due fixed steps,
    /// interpolate remotes, then ping on interval.
    ///
    /// A failed send does not cut the frame short: every due tick still runs
    /// and its command is still queued for replay, but nothing more is
    /// transmitted. The first failure is returned once the frame is done.
    pub fn frame(
        &mut self,
        delta_secs: f32,
        now_ms: f64,
        input: &mut impl InputSource,
        transport: &mut impl Transport,
    ) -> Result<FrameReport, SessionError> {
        let mut report = FrameReport::default();

        for frame in transport.receive() {
            if let Err(err) = self.handle_packet(&frame, now_ms) {
                log::warn!("discarding inbound frame: {}", err);
                report.rejected_packets += 1;
            }
        }

        let mut failure = None;
        for tick in self.timestep.advance(delta_secs) {
            report.steps += 1;
            let Some(command) = self.step(tick, now_ms, input, &mut report) else {
                continue;
            };
            if failure.is_some() {
                continue;
            }
            match transmit(transport, Message::command(&command)) {
                Ok(()) => report.inputs_sent += 1,
                Err(err) => failure = Some(err),
            }
        }

        self.expire_projectiles(now_ms);
        self.interpolate_remotes(now_ms, &mut report);

        let ping_due = self
            .last_ping_ms
            .is_none_or(|last| now_ms - last >= self.config.ping_interval_ms);
        if ping_due && failure.is_none() {
            match transmit(transport, Message::Ping { client_time_ms: now_ms }) {
                Ok(()) => {
                    self.last_ping_ms = Some(now_ms);
                    report.pings_sent += 1;
                }
                Err(err) => failure = Some(err),
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Runs one fixed tick and returns the command to transmit, if any. The
    /// command is already applied and queued.
    fn step(
        &mut self,
        tick: u32,
        now_ms: f64,
        input: &mut impl InputSource,
        report: &mut FrameReport,
    ) -> Option<InputCommand> {
        self.reconcile_local(report);

        let frame = input.poll();
        let mut command = frame.to_command(tick, now_ms);
        if frame.fire {
            command.action = self.spawn_projectile(now_ms);
        }

        self.apply_local(&command);

        if command.is_idle() {
            return None;
        }
        self.pending.push(command.clone());
        Some(command)
    }

    /// Every local snapshot received since the last step, in arrival order.
    fn reconcile_local(&mut self, report: &mut FrameReport) {
        let dt = self.timestep.dt();
        for update in std::mem::take(&mut self.inbound_local) {
            let Some(entity) = self.entities.get_by_id_mut(&update.entity_id) else {
                continue;
            };
            let reconciler = self
                .reconcilers
                .entry(update.entity_id.clone())
                .or_default();

            match reconciler.reconcile(
                entity.kind,
                &mut entity.transform,
                &update.snapshot,
                &mut self.pending,
                &self.integrator,
                dt,
            ) {
                ReconcileOutcome::Applied(applied) => {
                    report.reconciliations += 1;
                    if let Some(correction) = applied.correction {
                        report.max_correction = report.max_correction.max(correction);
                    }
                }
                ReconcileOutcome::Stale { .. } => report.stale_snapshots += 1,
                ReconcileOutcome::Rejected => {}
            }
        }
    }

    fn apply_local(&mut self, command: &InputCommand) {
        let dt = self.timestep.dt();
        for entity in self.entities.iter_mut() {
            if !entity.is_owned_by(&self.session_id) {
                continue;
            }
            self.integrator
                .advance(entity.kind, &mut entity.transform, command, dt);
            entity.transform.renormalize();
        }
    }

    fn spawn_projectile(&mut self, now_ms: f64) -> Option<ActionToken> {
        let shooter = self
            .local_entity
            .as_ref()
            .and_then(|id| self.entities.get_by_id(id))?;

        let muzzle = self.integrator.muzzle_transform(&shooter.transform);
        let projectile_id = EntityId(format!("{}:p{}", self.session_id, self.next_projectile));
        self.next_projectile = self.next_projectile.wrapping_add(1);

        self.entities.insert(Entity {
            owner: Some(self.session_id.clone()),
            transform: muzzle,
            ..Entity::new(projectile_id.clone(), EntityKind::Projectile)
        });
        self.predicted_projectiles
            .insert(projectile_id.clone(), now_ms);
        log::debug!("predicted projectile {}", projectile_id);

        Some(ActionToken {
            kind: ActionKind::Fire,
            projectile_id,
        })
    }

    fn expire_projectiles(&mut self, now_ms: f64) {
        let lifetime = self.config.projectile_lifetime_ms;
        let expired: Vec<EntityId> = self
            .predicted_projectiles
            .iter()
            .filter(|(_, spawned)| now_ms - **spawned > lifetime)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            log::debug!("projectile {} never confirmed, dropping", id);
            self.remove_entity(&id);
        }
    }

    fn interpolate_remotes(&mut self, now_ms: f64, report: &mut FrameReport) {
        let target_time_ms = self.clock.to_server_time(now_ms)
            - self.estimator.interpolation_delay_ms() as f64;

        for entity in self.entities.iter_mut() {
            if entity.is_owned_by(&self.session_id) {
                continue;
            }
            let Some(sample) = self
                .interpolation
                .sample(&entity.id, entity.kind, target_time_ms)
            else {
                continue;
            };

            if sample.is_stale() && !entity.stale {
                log::warn!("{} silent past the extrapolation window, freezing", entity.id);
            }
            entity.transform = sample.transform;
            entity.stale = sample.is_stale();
            report.remotes_sampled += 1;
            if entity.stale {
                report.remotes_frozen += 1;
            }
        }
    }

    /// Poses to hand to the renderer, local and remote alike.
    pub fn render_transforms(&self) -> Vec<(EntityId, Transform)> {
        self.entities
            .iter()
            .map(|entity| (entity.id.clone(), entity.transform))
            .collect()
    }

    pub fn stats(&self) -> NetworkStats {
        self.estimator.stats()
    }

    pub fn pending_inputs(&self) -> &PendingInputQueue {
        &self.pending
    }

    pub fn local_entity(&self) -> Option<&Entity> {
        self.local_entity
            .as_ref()
            .and_then(|id| self.entities.get_by_id(id))
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get_by_id(id)
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    pub fn current_tick(&self) -> u32 {
        self.timestep.tick()
    }
}

fn transmit(transport: &mut impl Transport, message: Message) -> Result<(), SessionError> {
    transport.send(encode(message)?)?;
    Ok(())
}
