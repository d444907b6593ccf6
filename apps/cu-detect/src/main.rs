use anyhow::Result;
use clap::Parser;
use cycler_detect::{DetectedDevices, Detector, DetectorConfig};
use cycler_transport::{MockCanLink, MockScpiLink};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "cu-detect",
    version,
    about = "Detect the instruments attached to a battery cycler computational unit"
)]
struct Args {
    /// Identifier of this computational unit
    #[arg(long)]
    cu_id: u32,

    /// Root of the per-class device directories
    #[arg(long)]
    dev_root: Option<PathBuf>,

    /// Detection cycle budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct DetectionReport<'a> {
    cu_id: u32,
    ts: String,
    devices: &'a DetectedDevices,
}

fn main() -> Result<()> {
    setup_tracing();
    let args = Args::parse();

    let mut cfg = DetectorConfig::new(args.cu_id);
    if let Some(root) = args.dev_root {
        cfg.dev_root = root;
    }
    if let Some(ms) = args.timeout_ms {
        cfg.detect_timeout = Duration::from_millis(ms);
    }

    info!(cu_id = cfg.cu_id, root = %cfg.dev_root.display(), "running detection pass");
    // The production IPC links are provided by the sniffer deployment; this
    // binary runs against the in-process mock backend.
    let mut detector = Detector::new(cfg, MockCanLink::new(), MockScpiLink::new());
    let devices = detector.process_detection()?;

    let report = DetectionReport {
        cu_id: args.cu_id,
        ts: OffsetDateTime::now_utc().format(&Rfc3339)?,
        devices,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
