// src/main.rs
//! Headless SO-101 simulation runner.
//!
//! Usage:
//!   so101-sim [OPTIONS]
//!
//! Options:
//!   --config <path>      Simulator config (JSON)
//!   --duration <secs>    Run time (default: 10)
//!   --motion <type>      Mock hand motion: static, wave, point, grab (default: wave)
//!   --speed <x>          Mock motion speed multiplier (default: 1.0)
//!   --output <dir>       Output directory for recordings
//!   --record             Record the joint trajectory to CSV + HTML report
//!   --no-kinematics      Run in joint space only

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use so101_sim::control;
use so101_sim::data::TrajectoryRecorder;
use so101_sim::mock_hand::{MockHandGenerator, MotionType};
use so101_sim::motion_loop::MotionLoop;
use so101_sim::{AppSettings, JointState, JointStateSimulator, SimulatorConfig};

fn parse_args(args: &[String]) -> Result<AppSettings> {
    let mut settings = AppSettings::default();
    let mut no_kinematics = false;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(path)) => {
                settings.config = SimulatorConfig::load(path)
                    .with_context(|| format!("failed to load config {}", path))?;
                i += 2;
            }
            ("--duration", Some(secs)) => {
                let secs: f64 = secs.parse().context("--duration expects seconds")?;
                if !(secs.is_finite() && secs > 0.0) {
                    bail!("--duration must be positive");
                }
                settings.run_duration =
                    Duration::try_from_secs_f64(secs).context("--duration is out of range")?;
                i += 2;
            }
            ("--motion", Some(motion)) => {
                settings.motion = motion.parse::<MotionType>().map_err(anyhow::Error::msg)?;
                i += 2;
            }
            ("--speed", Some(speed)) => {
                let speed: f64 = speed.parse().context("--speed expects a number")?;
                if !(speed.is_finite() && speed > 0.0) {
                    bail!("--speed must be a positive number, got {}", speed);
                }
                settings.motion_speed = speed;
                i += 2;
            }
            ("--output", Some(dir)) => {
                settings.output_directory = PathBuf::from(dir);
                i += 2;
            }
            ("--record", _) => {
                settings.record_trajectory = true;
                i += 1;
            }
            ("--no-kinematics", _) => {
                no_kinematics = true;
                i += 1;
            }
            ("--help", _) | ("-h", _) => {
                print_usage();
                std::process::exit(0);
            }
            (other, _) => bail!("unrecognized argument '{}'", other),
        }
    }

    if no_kinematics {
        settings.config.kinematics.enabled = false;
    }
    Ok(settings)
}

fn print_usage() {
    println!("SO-101 joint simulator - drives the arm from mock hand tracking");
    println!();
    println!("Usage: so101-sim [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <path>      Simulator config (JSON)");
    println!("  --duration <secs>    Run time (default: 10)");
    println!("  --motion <type>      static, wave, point, grab (default: wave)");
    println!("  --speed <x>          Mock motion speed multiplier (default: 1.0)");
    println!("  --output <dir>       Output directory for recordings");
    println!("  --record             Record trajectory to CSV + HTML report");
    println!("  --no-kinematics      Run in joint space only");
}

/// Pushes mock hand frames through the control protocol, as a tracking client would.
async fn feed_mock_hand(
    sim: Arc<JointStateSimulator>,
    motion: MotionType,
    speed: f64,
    rate_hz: f64,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut generator = MockHandGenerator::new();
    generator.set_speed(speed);

    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / rate_hz));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let start = Instant::now();
    let mut sent = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let sample = generator.sample(motion, start.elapsed().as_secs_f64());
                let frame = json!({
                    "type": "hand_pose",
                    "hand_landmarks": sample.to_landmarks(),
                });
                let reply = control::handle_text(&sim, &frame.to_string());
                if !reply.response.is_success() {
                    tracing::debug!("hand frame rejected: {}", reply.to_json());
                }
                sent += 1;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    sent
}

async fn watch_state(
    mut states: watch::Receiver<JointState>,
    mut recorder: Option<TrajectoryRecorder>,
) -> Option<TrajectoryRecorder> {
    let mut last_log = Instant::now();

    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();

        if last_log.elapsed() >= Duration::from_secs(1) {
            last_log = Instant::now();
            tracing::info!(
                "t={:.2}s joints=[{}] error={:.4}",
                state.sim_time,
                state
                    .positions
                    .iter()
                    .map(|p| format!("{:.3}", p))
                    .collect::<Vec<_>>()
                    .join(", "),
                state.max_tracking_error()
            );
        }

        if let Some(recorder) = recorder.as_mut() {
            recorder.add_sample(state);
        }
    }

    recorder
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let settings = parse_args(&args)?;

    let sim = Arc::new(JointStateSimulator::from_config(settings.config.clone())?);
    let info = sim.robot_info();
    tracing::info!(
        "{} ready: {} joints, kinematics {}",
        info.name,
        info.dof,
        if info.kinematics_available { "available" } else { "unavailable" }
    );

    let motion_loop = MotionLoop::new(Arc::clone(&sim))?;
    let states = motion_loop.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let motion_task = tokio::spawn(motion_loop.run(shutdown_rx.clone()));
    let feeder_task = tokio::spawn(feed_mock_hand(
        Arc::clone(&sim),
        settings.motion,
        settings.motion_speed,
        settings.hand_rate_hz,
        shutdown_rx,
    ));

    let recorder = settings
        .record_trajectory
        .then(|| TrajectoryRecorder::new(&settings.output_directory, None));
    let watcher_task = tokio::spawn(watch_state(states, recorder));

    tracing::info!(
        "running {} motion for {:.1}s",
        settings.motion,
        settings.run_duration.as_secs_f64()
    );

    tokio::select! {
        _ = tokio::time::sleep(settings.run_duration) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    shutdown_tx.send(true)?;
    let metrics = motion_task.await?;
    let frames = feeder_task.await?;
    // Motion loop owned the state sender; the watcher ends once it is dropped.
    let recorder = watcher_task.await?;

    tracing::info!(
        "ticks={} avg_rate={:.1}Hz overruns={} hand_frames={}",
        metrics.ticks,
        metrics.avg_rate_hz,
        metrics.overruns,
        frames
    );

    if let Some(pose) = sim.forward_kinematics() {
        let p = pose.position;
        tracing::info!("end effector at ({:.3}, {:.3}, {:.3}) m", p.x, p.y, p.z);
    }

    if let Some(recorder) = recorder {
        let csv_path = recorder.export_csv()?;
        let report_path = recorder.generate_report()?;
        tracing::info!(
            "recorded {} samples to {} ({})",
            recorder.len(),
            csv_path.display(),
            report_path.display()
        );
    }

    Ok(())
}
