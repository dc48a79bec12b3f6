use glam::{Quat, Vec2, Vec3};

use dogfight::{
    Buttons, EntityKind, FlightIntegrator, InputCommand, InterpolationConfig,
    NetworkQualityEstimator, PendingInputQueue, QualityConfig, ReconcileOutcome, Reconciler,
    RoundTrip, StateBuffer, TickInfo, Transform, TransformSnapshot, quality_score,
};

const DT: f32 = 1.0 / 60.0;

fn flight_inputs(ticks: std::ops::Range<u32>) -> Vec<InputCommand> {
    ticks
        .map(|tick| {
            let buttons = match tick % 4 {
                0 => Buttons::FORWARD | Buttons::BOOST,
                1 => Buttons::FORWARD | Buttons::LEFT,
                2 => Buttons::ASCEND | Buttons::ROLL_RIGHT,
                _ => Buttons::FORWARD,
            };
            InputCommand::new(tick, tick as f64 * 1000.0 / 60.0)
                .with_buttons(buttons)
                .with_mouse_delta(Vec2::new(tick as f32 % 3.0 - 1.0, 0.5))
        })
        .collect()
}

fn authoritative(tick: u32, ack: u32) -> TransformSnapshot {
    TransformSnapshot::new(
        Transform {
            position: Vec3::new(4.0, 12.0, -30.0),
            rotation: Quat::from_rotation_y(0.3),
            linear_velocity: Vec3::new(0.0, 0.0, -20.0),
            angular_velocity: Vec3::ZERO,
        },
        TickInfo::new(tick, tick as f64 * 1000.0 / 60.0).with_ack(ack, ack as f64 * 1000.0 / 60.0),
    )
}

#[test]
fn replay_is_idempotent_with_flight_model() {
    let integrator = FlightIntegrator::default();
    let snapshot = authoritative(140, 120);

    let mut queue = PendingInputQueue::new(60);
    for input in flight_inputs(100..150) {
        queue.push(input);
    }
    let mut reconciler = Reconciler::new();
    let mut first = Transform::at(Vec3::new(100.0, 0.0, 0.0));
    reconciler.reconcile(EntityKind::Vehicle, &mut first, &snapshot, &mut queue, &integrator, DT);

    for _ in 0..5 {
        let mut again = Transform::at(Vec3::new(-50.0, 3.0, 9.0));
        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut again,
            &snapshot,
            &mut queue,
            &integrator,
            DT,
        );
        assert!(matches!(outcome, ReconcileOutcome::Applied(_)));
        assert_eq!(again, first);
    }
    assert!((first.rotation.length() - 1.0).abs() < 1e-6);
}

#[test]
fn acknowledged_inputs_never_survive() {
    let integrator = FlightIntegrator::default();
    let mut queue = PendingInputQueue::new(60);
    let mut reconciler = Reconciler::new();
    let mut transform = Transform::default();

    let mut next_tick = 0;
    for (snapshot_tick, ack) in [(10, 4), (20, 15), (25, 25), (40, 31)] {
        while next_tick < snapshot_tick {
            queue.push(flight_inputs(next_tick..next_tick + 1).remove(0));
            next_tick += 1;
        }

        let snapshot = authoritative(snapshot_tick, ack);
        let outcome = reconciler.reconcile(
            EntityKind::Vehicle,
            &mut transform,
            &snapshot,
            &mut queue,
            &integrator,
            DT,
        );

        let ReconcileOutcome::Applied(report) = outcome else {
            panic!("expected snapshot {snapshot_tick} to apply");
        };
        assert_eq!(report.cutoff, ack);
        assert!(queue.iter().all(|input| input.tick > ack));
        assert_eq!(report.replayed, queue.len());
    }
}

#[test]
fn ack_beyond_tick_is_clamped() {
    let integrator = FlightIntegrator::default();
    let mut queue = PendingInputQueue::new(60);
    for input in flight_inputs(0..10) {
        queue.push(input);
    }

    let snapshot = TransformSnapshot::new(
        Transform::default(),
        TickInfo::new(5, 80.0).with_ack(9, 150.0),
    );
    let mut transform = Transform::default();
    let outcome = Reconciler::new().reconcile(
        EntityKind::Vehicle,
        &mut transform,
        &snapshot,
        &mut queue,
        &integrator,
        DT,
    );

    assert!(matches!(
        outcome,
        ReconcileOutcome::Applied(report) if report.cutoff == 5
    ));
    assert_eq!(queue.oldest_tick(), Some(6));
}

#[test]
fn buffers_stay_bounded() {
    let mut queue = PendingInputQueue::new(16);
    let mut buffer = StateBuffer::new(12);

    for tick in 0..500u32 {
        queue.push(InputCommand::new(tick, 0.0).with_buttons(Buttons::FORWARD));
        // Arrival order deliberately shuffled.
        let ts = ((tick * 7) % 500) as f64;
        buffer
            .push(TransformSnapshot::new(Transform::default(), TickInfo::new(tick, ts)))
            .unwrap();

        assert!(queue.len() <= 16);
        assert!(buffer.len() <= 12);
    }

    let timestamps: Vec<f64> = buffer.iter().map(|s| s.timestamp_ms()).collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn quality_and_delay_stay_in_bounds() {
    let config = QualityConfig::default();
    for latency in [0.0, 1.0, 25.0, 80.0, 250.0, 499.0, 500.0, 2000.0, f32::MAX] {
        for jitter in [0.0, 5.0, 50.0, 99.0, 100.0, 900.0] {
            let q = quality_score(latency, jitter, &config);
            assert!((0.0..=1.0).contains(&q), "{latency}/{jitter} -> {q}");
        }
    }

    let interpolation = InterpolationConfig::default();
    let mut estimator = NetworkQualityEstimator::new(config, &interpolation);
    let mut send = 0.0;
    for i in 0..200 {
        let rtt = [4.0, 900.0, 60.0, 3000.0, 0.0][i % 5];
        let stats = estimator
            .record_round_trip(&RoundTrip {
                client_send_ms: send,
                client_receive_ms: send + rtt,
                server_time_ms: send + rtt / 2.0,
                reported_latency_ms: (i % 7 == 0).then_some(35.0),
            })
            .unwrap();

        assert!((0.0..=1.0).contains(&stats.quality));
        assert!(stats.interpolation_delay_ms >= interpolation.min_delay_ms);
        assert!(stats.interpolation_delay_ms <= interpolation.max_delay_ms);
        send += 1000.0;
    }
}
