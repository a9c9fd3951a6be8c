//! Readerboard attract-mode daemon
//!
//! Opens the sign, plays the message sequence, and starts over. If the sign
//! is missing or a transfer fails, it logs the error, waits, and tries again,
//! forever. Ctrl+C stops it after the current step.
//!
//! ## Usage
//! ```sh
//! readerboard --leaderboard /path/to/leaderboard.txt
//! readerboard --dry-run   # log commands instead of talking to USB
//! ```

use anyhow::Context;
use clap::Parser;
use readerboard::leaderboard::read_leaderboard;
use readerboard::script::{Directive, message_sequence};
use readerboard::supervisor::{DEFAULT_RETRY_DELAY, Supervisor, SupervisorConfig};
use readerboard::transport::LoggingTransport;
use readerboard::{BoardError, SignGeometry, SystemClock, setup_signal_handler};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Drive a USB LED readerboard
#[derive(Parser)]
#[command(name = "readerboard")]
#[command(about = "Plays the attract-mode message loop on a USB LED readerboard")]
#[command(version)]
struct Args {
    /// Leaderboard file of `initials,score` lines; the top score is announced
    #[arg(long)]
    leaderboard: Option<PathBuf>,

    /// Seconds to wait after a failure before reconnecting
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_secs())]
    retry_delay_secs: u64,

    /// Log display commands instead of sending them to the device
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();

    let args = Args::parse();
    let running = setup_signal_handler().context("installing Ctrl+C handler")?;
    let config = SupervisorConfig {
        retry_delay: Duration::from_secs(args.retry_delay_secs),
    };

    tracing::info!("Readerboard v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.leaderboard {
        tracing::info!("Leaderboard: {}", path.display());
    }

    let leaderboard = args.leaderboard.clone();
    let source = move || script_for_pass(leaderboard.as_deref());
    let clock = SystemClock::new(running.clone());

    if args.dry_run {
        tracing::info!("Dry run: commands are logged, not sent");
        let opener = || -> Result<LoggingTransport, BoardError> {
            Ok(LoggingTransport::new(SignGeometry::default()))
        };
        Supervisor::new(opener, source, clock, config).run(&running);
        return Ok(());
    }

    run_hardware(source, clock, config, &running)
}

/// Build this pass's script, re-reading the leaderboard if one is configured.
fn script_for_pass(leaderboard: Option<&std::path::Path>) -> Vec<Directive> {
    let top = leaderboard.and_then(|path| match read_leaderboard(path) {
        Ok(records) => records.into_iter().next(),
        Err(e) => {
            tracing::warn!("Skipping scores, could not read {}: {e}", path.display());
            None
        }
    });
    message_sequence(top.as_ref())
}

#[cfg(feature = "hardware")]
fn run_hardware(
    source: impl FnMut() -> Vec<Directive>,
    clock: SystemClock,
    config: SupervisorConfig,
    running: &std::sync::atomic::AtomicBool,
) -> anyhow::Result<()> {
    use readerboard::DeviceIdentity;
    use readerboard::transport::UsbTransport;

    let identity = DeviceIdentity::default();
    tracing::info!("Device: {identity}");

    let opener = move || UsbTransport::open(identity);
    Supervisor::new(opener, source, clock, config).run(running);
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn run_hardware(
    _source: impl FnMut() -> Vec<Directive>,
    _clock: SystemClock,
    _config: SupervisorConfig,
    _running: &std::sync::atomic::AtomicBool,
) -> anyhow::Result<()> {
    anyhow::bail!(
        "built without the 'hardware' feature; rebuild with it or pass --dry-run"
    )
}
