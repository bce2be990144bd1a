//! gazetrace — binocular gaze acquisition and recording pipeline.
//!
//! Runs the pipeline headless: simulated (or vendor) provider, the
//! acquisition service, the visibility gate, and optionally a recording
//! session against a real output directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use gazetrace::bus::GazeBus;
use gazetrace::clock::{Clock, SystemClock};
use gazetrace::gate::{GateConfig, SceneActions, VisibilityGate};
use gazetrace::math::{HeadPose, Quat, Ray, Vec3};
use gazetrace::provider::ProviderKind;
use gazetrace::recording::RecordSpace;
use gazetrace::service::{GazeService, HeadPoseSource, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "gazetrace", about = "Binocular gaze acquisition pipeline")]
struct Cli {
    /// Provider to use: simulated, vendor, or auto
    #[arg(long, default_value = "auto")]
    provider: String,

    /// Output directory for recording sessions (no recording if unset)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Session base name for the two CSV streams
    #[arg(long, default_value = "session")]
    session: String,

    /// Run duration in seconds
    #[arg(long, default_value = "5.0")]
    duration: f64,

    /// Host tick rate in Hz
    #[arg(long, default_value = "60")]
    tick_hz: u32,

    /// Visibility gate threshold in degrees
    #[arg(long, default_value = "2.5")]
    gate_threshold: f32,

    /// Startup grace period in seconds during which the gate stays visible
    #[arg(long, default_value = "0.0")]
    gate_grace: f64,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

/// Demo head pose: standing eye height, no rotation.
struct StaticHead;

impl HeadPoseSource for StaticHead {
    fn head_pose(&self) -> HeadPose {
        HeadPose {
            position: Vec3::new(0.0, 1.6, 0.0),
            rotation: Quat::IDENTITY,
        }
    }
}

/// Demo scene effects: log what a real scene would toggle.
struct LoggingScene;

impl SceneActions for LoggingScene {
    fn set_group_active(&self, name: &str, active: bool) {
        info!("scene: group {} -> {}", name, if active { "on" } else { "off" });
    }

    fn restore_focal_marker(&self, name: &str) {
        info!("scene: focal marker {} restored", name);
    }

    fn force_grid_rebuild(&self) {
        info!("scene: full grid rebuild requested");
    }

    fn exit_focus_mode(&self) {
        info!("scene: focus mode exited");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("gazetrace {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gazetrace=info".into()),
        )
        .init();

    info!("gazetrace v{} starting", env!("CARGO_PKG_VERSION"));

    let provider = match cli.provider.as_str() {
        "auto" => None,
        other => match ProviderKind::from_str(other) {
            Some(kind) => Some(kind),
            None => {
                warn!("unknown provider '{}', using simulated", other);
                Some(ProviderKind::Simulated)
            }
        },
    };

    let clock = Arc::new(SystemClock::new());
    let bus = Arc::new(GazeBus::new());
    let service = GazeService::new(
        ServiceConfig {
            provider,
            ..Default::default()
        },
        clock.clone(),
        bus,
        Arc::new(StaticHead),
        None,
        // Vendor SDK bindings are linked by downstream integrations; this
        // binary ships with the simulated path.
        None,
    );
    info!("provider: {}", service.provider_kind().as_str());

    service.register_tracked("headset", RecordSpace::World);
    service.register_tracked("stimulus_grid", RecordSpace::Local);

    let mut gate = VisibilityGate::new(
        GateConfig {
            threshold_deg: cli.gate_threshold,
            grace_period_s: cli.gate_grace,
            ..Default::default()
        },
        Arc::new(LoggingScene),
    );
    gate.register_group("stimulus_grid");
    gate.register_group("probe_dots");
    gate.register_group("fixation_marker");
    gate.set_focal_marker("fixation_marker");

    if let Some(dir) = &cli.output_dir {
        service.set_output_folder(dir.clone());
        let paths = service.start_recording(&cli.session)?;
        info!(
            "recording to {} / {}",
            paths.object.display(),
            paths.gaze.display()
        );
    }

    let tick = Duration::from_secs_f64(1.0 / cli.tick_hz.max(1) as f64);
    let total_ticks = (cli.duration * cli.tick_hz as f64).ceil() as u64;
    let mut tagged_midpoint = false;

    for n in 0..total_ticks {
        let t = clock.session_secs();

        // Wandering pointer stands in for cursor-driven gaze.
        let dir = Vec3::new(
            (t * 0.9).sin() as f32 * 0.05,
            (t * 0.7).cos() as f32 * 0.03,
            1.0,
        );
        service.tick(Some(&Ray::new(Vec3::ZERO, dir)));

        let combined = service
            .gaze_data()
            .map(|snap| snap.sample.combined_ray.direction);
        gate.tick(t, combined);

        if !tagged_midpoint && n >= total_ticks / 2 && service.is_recording() {
            service.write_message("midpoint");
            tagged_midpoint = true;
        }

        std::thread::sleep(tick);
    }

    if service.is_recording() {
        service.stop_recording();
    }
    service.shutdown();

    let stats = service.writer_stats();
    info!(
        "done: {} rows written, {} dropped, {} flushes ({} skipped), gate {}",
        stats.rows_written,
        stats.rows_dropped,
        stats.runs_completed,
        stats.runs_skipped,
        gate.state().as_str()
    );
    Ok(())
}
