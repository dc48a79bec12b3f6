mod authority;
mod link;
mod pilot;
mod stats;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use authority::{AuthorityConfig, AuthorityStub};
use dogfight::{ClientConfig, ClientSession, QueuedTransport, SessionId};
use link::{LinkConditions, LinkSimulator};
use pilot::ScriptedPilot;
use stats::SessionStats;

const STATUS_INTERVAL_MS: f64 = 1_000.0;
/// Every this many milliseconds the simulated renderer stalls for a frame.
const HITCH_INTERVAL_MS: f64 = 5_000.0;
const HITCH_MS: f64 = 120.0;

#[derive(Parser)]
#[command(name = "dogfight-client")]
#[command(about = "Headless prediction client against a simulated authority")]
struct Args {
    #[arg(short, long, default_value_t = 30.0, help = "Simulated seconds to run")]
    seconds: f64,

    #[arg(long, default_value = "pilot", help = "Session id of the local client")]
    session: String,

    #[arg(long, default_value_t = 60.0, help = "One-way latency in ms")]
    latency: f64,

    #[arg(long, default_value_t = 10.0, help = "Jitter in ms, either way")]
    jitter: f64,

    #[arg(long, default_value_t = 2.0, help = "Packet loss percentage (0-100)")]
    loss: f32,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    #[arg(long, default_value_t = 20, help = "Server snapshots per second")]
    snapshot_rate: u32,

    #[arg(long, help = "Server answers pings with its own latency estimate")]
    report_latency: bool,

    #[arg(long, default_value_t = 1000.0 / 60.0, help = "Nominal render frame in ms")]
    frame_ms: f64,

    #[arg(short, long, help = "JSON client configuration")]
    config: Option<PathBuf>,

    #[arg(long, help = "Sleep between frames instead of running flat out")]
    realtime: bool,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let session_id = SessionId::from(args.session.as_str());

    let conditions = LinkConditions {
        loss_percent: args.loss.clamp(0.0, 100.0),
        latency_ms: args.latency.max(0.0),
        jitter_ms: args.jitter.max(0.0),
    };
    if conditions.is_clean() {
        log::info!("link: clean");
    } else {
        log::info!(
            "link: {:.0}ms +/- {:.0}ms, {:.1}% loss, seed {}",
            conditions.latency_ms,
            conditions.jitter_ms,
            conditions.loss_percent,
            args.seed
        );
    }

    let mut authority = AuthorityStub::new(
        AuthorityConfig {
            tick_rate: config.tick_rate,
            snapshot_rate: args.snapshot_rate,
            report_latency: args.report_latency,
            vehicle: config.vehicle.clone(),
            ..Default::default()
        },
        session_id.clone(),
    );
    let mut session = ClientSession::with_flight_model(session_id, config);
    let mut transport = QueuedTransport::new();
    let mut pilot = ScriptedPilot::new();
    let mut uplink = LinkSimulator::new(conditions, args.seed);
    let mut downlink = LinkSimulator::new(conditions, args.seed.wrapping_add(1));
    let mut frame_rng = StdRng::seed_from_u64(args.seed.wrapping_add(2));
    let mut stats = SessionStats::new();

    let end_ms = args.seconds.max(0.0) * 1000.0;
    let mut now_ms = 0.0;
    let mut next_status_ms = STATUS_INTERVAL_MS;
    let mut next_hitch_ms = HITCH_INTERVAL_MS;

    while now_ms < end_ms {
        let frame_ms = if now_ms >= next_hitch_ms {
            next_hitch_ms += HITCH_INTERVAL_MS;
            HITCH_MS
        } else {
            args.frame_ms * frame_rng.gen_range(0.8..1.2)
        };
        now_ms += frame_ms;
        let delta = (frame_ms / 1000.0) as f32;

        for frame in uplink.take_due(now_ms) {
            if let Err(err) = authority.receive(&frame, now_ms) {
                log::warn!("authority rejected frame: {}", err);
            }
        }
        for frame in authority.advance(delta, now_ms)? {
            downlink.send(frame, now_ms);
        }
        for frame in downlink.take_due(now_ms) {
            transport.deliver(frame);
        }

        let report = session.frame(delta, now_ms, &mut pilot, &mut transport)?;
        for frame in transport.take_outgoing() {
            uplink.send(frame, now_ms);
        }
        stats.record_frame(delta, &report);

        if now_ms >= next_status_ms {
            next_status_ms += STATUS_INTERVAL_MS;
            log_status(now_ms, &session, &authority, &stats);
        }

        if args.realtime {
            std::thread::sleep(Duration::from_secs_f64(frame_ms / 1000.0));
        }
    }

    log_summary(&session, &stats, &uplink, &downlink);
    Ok(())
}

fn log_status(
    now_ms: f64,
    session: &ClientSession,
    authority: &AuthorityStub,
    stats: &SessionStats,
) {
    let network = session.stats();
    let lead = match (session.local_entity(), authority.vehicle()) {
        (Some(local), Some(server)) => local.transform.position.distance(server.transform.position),
        _ => 0.0,
    };
    let frozen = session.entities().iter().filter(|e| e.stale).count();

    log::info!(
        "t={:.1}s tick {} fps {:.0} rtt {:.0}ms jitter {:.1}ms quality {:.2} delay {:.0}ms | pending {} correction {:.3} lead {:.2} | entities {} frozen {}",
        now_ms / 1000.0,
        session.current_tick(),
        stats.fps(),
        network.rtt_ms,
        network.jitter_ms,
        network.quality,
        network.interpolation_delay_ms,
        session.pending_inputs().len(),
        stats.recent_correction(),
        lead,
        session.entities().len(),
        frozen,
    );
}

fn log_summary(
    session: &ClientSession,
    stats: &SessionStats,
    uplink: &LinkSimulator,
    downlink: &LinkSimulator,
) {
    let network = session.stats();
    let up = uplink.stats();
    let down = downlink.stats();

    log::info!(
        "frames {} ticks {} inputs sent {} pings {}",
        stats.frames,
        stats.steps,
        stats.inputs_sent,
        stats.pings_sent
    );
    log::info!(
        "reconciliations {} stale {} rejected {} max correction {:.3}",
        stats.reconciliations,
        stats.stale_snapshots,
        stats.rejected_packets,
        stats.max_correction
    );
    log::info!(
        "uplink sent {} dropped {} delivered {} | downlink sent {} dropped {} delivered {} ({} in flight)",
        up.sent,
        up.dropped,
        up.delivered,
        down.sent,
        down.dropped,
        down.delivered,
        downlink.in_flight()
    );
    log::info!(
        "final latency {:.1}ms jitter {:.1}ms quality {:.2} delay {:.0}ms over {} samples",
        network.latency_ms,
        network.jitter_ms,
        network.quality,
        network.interpolation_delay_ms,
        network.samples
    );
}
