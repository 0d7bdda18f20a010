//! Input boost daemon.
//!
//! ```text
//! input-boostd [--config <path>] [--input-dir <dir>] [--cpu-sysfs <dir>]
//! ```
//!
//! Logging honours `RUST_LOG` (default `info`). `INPUT_BOOST_FREQ_KHZ` and
//! `INPUT_BOOST_DURATION_MS` override the config file. `SIGHUP` re-reads both; an invalid
//! reload is logged and the running values are kept.

use std::{error::Error, path::PathBuf};

use input_boost::{
    booster::Booster,
    config::BoostConfig,
    constraint::{sysfs::DEFAULT_CPU_SYSFS_ROOT, SysfsCpuFreq},
    input::{constants::DEFAULT_INPUT_DIR, EvdevSource},
};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    input_dir: PathBuf,
    cpu_sysfs: PathBuf,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut args = Args { config: None, input_dir: DEFAULT_INPUT_DIR.into(), cpu_sysfs: DEFAULT_CPU_SYSFS_ROOT.into() };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| format!("missing value for {flag}"));
        match flag.as_str() {
            "--config" => args.config = Some(value()?.into()),
            "--input-dir" => args.input_dir = value()?.into(),
            "--cpu-sysfs" => args.cpu_sysfs = value()?.into(),
            "-h" | "--help" => {
                println!("usage: input-boostd [--config <path>] [--input-dir <dir>] [--cpu-sysfs <dir>]");
                std::process::exit(0);
            },
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }
    Ok(args)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let config = BoostConfig::load(args.config.as_deref(), env_lookup)?;

    let mut booster = Booster::new(SysfsCpuFreq::with_root(&args.cpu_sysfs), EvdevSource::with_dir(&args.input_dir), config)?;
    booster.start().await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            },
            _ = sigterm.recv() => {
                tracing::info!("terminated");
                break;
            },
            _ = sighup.recv() => match booster.config().reload_from(args.config.as_deref(), env_lookup) {
                Ok(config) => tracing::info!(?config, "configuration reloaded"),
                Err(e) => tracing::warn!("reload failed, keeping previous configuration: {}", e),
            },
        }
    }

    booster.stop().await?;
    Ok(())
}
