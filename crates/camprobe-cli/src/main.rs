use anyhow::{Context, Result};
use camprobe_core::camera;
use camprobe_core::config::{Overrides, ProbeSettings};
use camprobe_core::{BackendKind, CameraProbe, NativeBackend};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camprobe", version)]
#[command(about = "Probe camera indices, grab one frame from each and save it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// First device index to probe.
    #[arg(long, global = true)]
    first: Option<i32>,
    /// Last device index to probe (inclusive).
    #[arg(long, global = true)]
    last: Option<i32>,
    /// Directory the captured frames are written to.
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendOpt>,
    /// Log more to stderr (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe each index in range (the default)
    Probe,
    /// List cameras the backend can see
    List,
    /// Show effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendOpt {
    #[value(name = "v4l2")]
    V4l2,
    Auto,
}

impl BackendOpt {
    fn into_kind(self) -> BackendKind {
        match self {
            BackendOpt::V4l2 => BackendKind::V4l2,
            BackendOpt::Auto => BackendKind::Auto,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        first_index: cli.first,
        last_index: cli.last,
        output_dir: cli.out_dir.clone(),
        backend: cli.backend.map(BackendOpt::into_kind),
    };
    let settings = ProbeSettings::load(&overrides).context("resolve probe settings")?;
    debug!(?settings, "resolved settings");

    match cli.command.unwrap_or(Commands::Probe) {
        Commands::Probe => {
            if let Err(err) = settings.ensure_output_dir() {
                warn!(%err, "frames will not be saved");
            }
            let backend = NativeBackend::new(settings.backend);
            let mut probe = CameraProbe::new(backend, &settings.output_dir, io::stdout().lock());
            probe.run(settings.indices());
        }
        Commands::List => {
            let devices = camera::list_devices(settings.backend).context("list cameras")?;
            if devices.is_empty() {
                println!("No cameras found");
            }
            for device in devices {
                println!("{}: {} ({})", device.index, device.name, device.description);
            }
        }
        Commands::Config => {
            let report = settings.doctor();
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize config report")?
            );
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
