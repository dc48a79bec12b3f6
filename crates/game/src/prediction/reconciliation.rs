use crate::model::{EntityKind, Transform, TransformSnapshot};

use super::integrator::Integrator;
use super::queue::PendingInputQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileState {
    /// Local integration is ahead of the last acknowledged server tick.
    #[default]
    Predicting,
    /// Transient, while a snapshot is being applied and inputs replayed.
    Reconciling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileReport {
    pub cutoff: u32,
    /// Inputs discarded as acknowledged.
    pub dropped: usize,
    /// Inputs replayed on top of the authoritative baseline.
    pub replayed: usize,
    /// Distance between the prediction before and after reconciling. `None`
    /// when the local state was not finite.
    pub correction: Option<f32>,
    /// Replay produced a non-finite transform and was discarded in favour of
    /// the bare authoritative baseline.
    pub replay_diverged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    Applied(ReconcileReport),
    /// Older than a snapshot already applied to this entity.
    Stale { tick: u32, last_applied: u32 },
    /// Authoritative transform failed validation; nothing was touched.
    Rejected,
}

/// Server reconciliation for one locally predicted entity: hard snap to the
/// authoritative pose, drop acknowledged inputs, replay the rest.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    state: ReconcileState,
    last_applied_tick: Option<u32>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile<I>(
        &mut self,
        kind: EntityKind,
        transform: &mut Transform,
        snapshot: &TransformSnapshot,
        queue: &mut PendingInputQueue,
        integrator: &I,
        dt: f32,
    ) -> ReconcileOutcome
    where
        I: Integrator + ?Sized,
    {
        if let Some(last_applied) = self.last_applied_tick {
            if snapshot.tick.tick < last_applied {
                log::debug!(
                    "dropping stale snapshot tick {} (last applied {})",
                    snapshot.tick.tick,
                    last_applied
                );
                return ReconcileOutcome::Stale {
                    tick: snapshot.tick.tick,
                    last_applied,
                };
            }
        }

        if let Err(err) = snapshot.transform.validate() {
            log::warn!("rejecting authoritative snapshot {}: {}", snapshot.tick.tick, err);
            return ReconcileOutcome::Rejected;
        }

        self.state = ReconcileState::Reconciling;
        let predicted = *transform;

        let baseline = Transform {
            rotation: snapshot.transform.rotation.normalize(),
            ..snapshot.transform
        };
        *transform = baseline;

        let cutoff = snapshot.tick.ack_cutoff();
        let dropped = queue.filter_acknowledged(cutoff);

        let mut replayed = 0;
        for input in queue.iter() {
            integrator.advance(kind, transform, input, dt);
            transform.renormalize();
            replayed += 1;
        }

        let replay_diverged = !transform.is_finite();
        if replay_diverged {
            log::warn!(
                "replay of {} inputs diverged from snapshot {}, keeping baseline",
                replayed,
                snapshot.tick.tick
            );
            *transform = baseline;
        }

        let correction = predicted
            .is_finite()
            .then(|| predicted.position.distance(transform.position));

        self.last_applied_tick = Some(snapshot.tick.tick);
        self.state = ReconcileState::Predicting;

        log::trace!(
            "reconciled tick {} cutoff {}: dropped {}, replayed {}",
            snapshot.tick.tick,
            cutoff,
            dropped,
            replayed
        );

        ReconcileOutcome::Applied(ReconcileReport {
            cutoff,
            dropped,
            replayed,
            correction,
            replay_diverged,
        })
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn last_applied_tick(&self) -> Option<u32> {
        self.last_applied_tick
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::model::{Buttons, InputCommand, TickInfo};

    const DT: f32 = 1.0 / 60.0;

    /// Moves exactly one unit along +x per input with RIGHT held.
    struct StepIntegrator;

    impl Integrator for StepIntegrator {
        fn advance(&self, _: EntityKind, transform: &mut Transform, input: &InputCommand, _: f32) {
            if input.pressed(Buttons::RIGHT) {
                transform.position.x += 1.0;
            }
        }
    }

    struct NanIntegrator;

    impl Integrator for NanIntegrator {
        fn advance(&self, _: EntityKind, transform: &mut Transform, _: &InputCommand, _: f32) {
            transform.position.x = f32::NAN;
        }
    }

    fn queue_with(ticks: impl IntoIterator<Item = u32>) -> PendingInputQueue {
        let mut queue = PendingInputQueue::new(60);
        for tick in ticks {
            queue.push(InputCommand::new(tick, tick as f64 * 16.0).with_buttons(Buttons::RIGHT));
        }
        queue
    }

    fn server_snapshot(tick: u32, ack: u32, x: f32) -> TransformSnapshot {
        TransformSnapshot::new(
            Transform::at(Vec3::new(x, 10.0, 0.0)),
            TickInfo::new(tick, tick as f64 * 16.0).with_ack(ack, ack as f64 * 16.0),
        )
    }

    #[test]
    fn snap_and_replay() {
        let mut reconciler = Reconciler::new();
        let mut queue = queue_with(101..=103);
        let mut transform = Transform::at(Vec3::new(3.0, 10.0, 0.0));

        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &server_snapshot(105, 102, 2.0),
            &mut queue,
            &StepIntegrator,
            DT,
        );

        let ReconcileOutcome::Applied(report) = outcome else {
            panic!("expected applied, got {:?}", outcome);
        };
        assert_eq!(report.cutoff, 102);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.replayed, 1);
        assert_eq!(transform.position, Vec3::new(3.0, 10.0, 0.0));
        assert_eq!(report.correction, Some(0.0));
        assert_eq!(queue.iter().map(|i| i.tick).collect::<Vec<_>>(), vec![103]);
        assert_eq!(reconciler.state(), ReconcileState::Predicting);
    }

    #[test]
    fn repeated_snapshot_is_idempotent() {
        let snapshot = server_snapshot(50, 40, 7.0);
        let mut reconciler = Reconciler::new();
        let mut queue = queue_with(38..=45);
        let mut transform = Transform::at(Vec3::new(100.0, 0.0, 0.0));

        reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &snapshot,
            &mut queue,
            &StepIntegrator,
            DT,
        );
        let first = transform;
        let first_len = queue.len();

        for _ in 0..5 {
            reconciler.reconcile(
                EntityKind::Vehicle,
                &mut transform,
                &snapshot,
                &mut queue,
                &StepIntegrator,
                DT,
            );
            assert_eq!(transform, first);
            assert_eq!(queue.len(), first_len);
        }
        assert_eq!(transform.position.x, 12.0);
    }

    #[test]
    fn no_ack_falls_back_to_snapshot_tick() {
        let mut reconciler = Reconciler::new();
        let mut queue = queue_with(1..=10);
        let mut transform = Transform::default();
        let snapshot = TransformSnapshot::new(Transform::default(), TickInfo::new(8, 0.0));

        reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &snapshot,
            &mut queue,
            &StepIntegrator,
            DT,
        );

        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|input| input.tick > 8));
        assert_eq!(transform.position.x, 2.0);
    }

    #[test]
    fn older_snapshot_is_stale() {
        let mut reconciler = Reconciler::new();
        let mut queue = queue_with(1..=20);
        let mut transform = Transform::default();

        reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &server_snapshot(30, 15, 0.0),
            &mut queue,
            &StepIntegrator,
            DT,
        );
        let after_newer = transform;

        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &server_snapshot(25, 10, -50.0),
            &mut queue,
            &StepIntegrator,
            DT,
        );

        assert_eq!(
            outcome,
            ReconcileOutcome::Stale {
                tick: 25,
                last_applied: 30
            }
        );
        assert_eq!(transform, after_newer);
        assert!(queue.iter().all(|input| input.tick > 15));
    }

    #[test]
    fn corrupt_local_state_takes_authority() {
        let mut reconciler = Reconciler::new();
        let mut queue = PendingInputQueue::new(60);
        let mut transform = Transform::at(Vec3::splat(f32::NAN));

        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &server_snapshot(5, 5, 4.0),
            &mut queue,
            &StepIntegrator,
            DT,
        );

        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied(ReconcileReport {
                correction: None,
                ..
            })
        ));
        assert_eq!(transform.position, Vec3::new(4.0, 10.0, 0.0));
    }

    #[test]
    fn diverging_replay_keeps_baseline() {
        let mut reconciler = Reconciler::new();
        let mut queue = queue_with(6..=8);
        let mut transform = Transform::default();

        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &server_snapshot(5, 5, 4.0),
            &mut queue,
            &NanIntegrator,
            DT,
        );

        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied(ReconcileReport {
                replay_diverged: true,
                ..
            })
        ));
        assert!(transform.is_finite());
        assert_eq!(transform.position.x, 4.0);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn rejects_non_finite_authority() {
        let mut reconciler = Reconciler::new();
        let mut queue = queue_with(1..=3);
        let mut transform = Transform::at(Vec3::ONE);
        let mut snapshot = server_snapshot(5, 2, 0.0);
        snapshot.transform.rotation.w = f32::NAN;

        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &snapshot,
            &mut queue,
            &StepIntegrator,
            DT,
        );

        assert_eq!(outcome, ReconcileOutcome::Rejected);
        assert_eq!(transform.position, Vec3::ONE);
        assert_eq!(queue.len(), 3);
        assert_eq!(reconciler.last_applied_tick(), None);
    }
}
