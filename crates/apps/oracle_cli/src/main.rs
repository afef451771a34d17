use std::path::PathBuf;

use clap::Parser;
use scene::{LayerKind, RecordingSurface, SurfaceCommand};
use session::{RunStatus, SessionConfig, SessionController, SessionSnapshot};
use streaming::SimulationRequest;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one intervention strategy against the simulation backend")]
struct Args {
    /// Free-text intervention strategy
    strategy: String,

    /// Budget allocated to the strategy
    #[arg(long, default_value_t = 1.0e9)]
    investment: f64,

    /// JSON config file (overridden by ORACLE_* variables and flags)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Streaming simulation endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Baseline geometry document (URL or path)
    #[arg(long)]
    baseline: Option<String>,

    /// Feature property holding track intensity
    #[arg(long)]
    intensity_property: Option<String>,

    /// Alpha multiplier for the dimmed baseline
    #[arg(long)]
    dim_alpha: Option<f32>,

    /// Camera transition duration in seconds
    #[arg(long)]
    fly_seconds: Option<f64>,

    /// Print the final result payload as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut SessionConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(baseline) = &self.baseline {
            config.baseline = Some(baseline.clone());
        }
        if let Some(property) = &self.intensity_property {
            config.symbology.intensity_property.clone_from(property);
        }
        if let Some(alpha) = self.dim_alpha {
            config.symbology.dim_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(seconds) = self.fly_seconds {
            config.camera.fly_seconds = seconds;
        }
    }
}

fn report_progress(snap: &SessionSnapshot, last: &mut Option<(u64, String)>) {
    // Whole percents are enough for a terminal.
    let key = (snap.percent.round() as u64, snap.message.clone());
    if snap.status != RunStatus::Running || last.as_ref() == Some(&key) {
        return;
    }
    println!("[{:>3}%] {}", key.0, key.1);
    *last = Some(key);
}

fn describe_surface(surface: &RecordingSurface) {
    for kind in [LayerKind::Baseline, LayerKind::Mitigation] {
        match surface.layer(kind) {
            Some(entities) => println!("{kind}: {} tracks", entities.len()),
            None => println!("{kind}: not shown"),
        }
    }
    if let Some(SurfaceCommand::FlyTo(target)) = surface
        .commands()
        .iter()
        .rev()
        .find(|c| matches!(c, SurfaceCommand::FlyTo(_)))
    {
        println!(
            "camera: {:.2},{:.2} at {:.0} km",
            target.center.lon_deg,
            target.center.lat_deg,
            target.altitude_m / 1000.0
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = SessionConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    info!(endpoint = %config.endpoint, baseline = ?config.baseline, "starting");

    let mut controller = SessionController::from_config(&config, RecordingSurface::new());
    let mut updates = controller.subscribe();
    let id = controller.run(SimulationRequest::new(args.strategy.clone(), args.investment));
    info!(session = %id, "run submitted");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut last = None;
    loop {
        tokio::select! {
            step = controller.step() => {
                if step.is_none() {
                    break;
                }
                report_progress(&updates.borrow_and_update(), &mut last);
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                warn!("interrupted, cancelling run");
                controller.cancel();
            }
        }
    }

    let snap = controller.snapshot();
    describe_surface(controller.surface());
    match snap.status {
        RunStatus::Succeeded => {
            println!("run {id} succeeded");
            if args.json {
                if let Some(result) = &snap.result {
                    println!("{}", serde_json::to_string_pretty(result)?);
                }
            }
            Ok(())
        }
        RunStatus::Cancelled => {
            println!("run {id} cancelled at {:.0}%", snap.percent);
            Ok(())
        }
        status => {
            let error = snap.error.unwrap_or_else(|| format!("run ended {status}"));
            Err(error.into())
        }
    }
}
