use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dcap_capture::{
    Capture, CaptureMode, SessionReport,
    diagnostics::{self, DiagnosticLayer},
};
use dcap_media_info::{SdiInterface, VideoStandard};
use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "dcap")]
#[command(about = "Acquire frames from a capture board into a BGRA buffer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a capture session against the synthetic board
    Capture {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many published frames
        #[arg(long, default_value = "10")]
        frames: u64,

        /// Write the last BGRA frame here
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        stereo: bool,

        #[arg(long)]
        no_flip: bool,

        /// How often the host polls for a new frame
        #[arg(long, default_value = "20")]
        interval_ms: u64,

        #[arg(long, default_value = "10")]
        timeout: u64,

        /// Print the effective configuration as JSON and exit
        #[arg(long)]
        print_config: bool,
    },

    /// List the known video standards and SDI interfaces
    Standards,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .with(
            DiagnosticLayer::new(diagnostics::global())
                .with_max_level(diagnostic_level(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Capture {
            config,
            frames,
            output,
            stereo,
            no_flip,
            interval_ms,
            timeout,
            print_config,
        } => {
            let mut config = match config {
                Some(path) => CliConfig::load(&path)?,
                None => CliConfig::default(),
            };

            if stereo && !config.session.mode.is_stereo() {
                config.session.mode = CaptureMode::stereo();
            }
            if no_flip {
                config.session.flip_vertical = false;
            }

            if print_config {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }

            cmd_capture(
                &config,
                frames,
                output,
                Duration::from_millis(interval_ms),
                Duration::from_secs(timeout),
            )?;
        }

        Commands::Standards => {
            cmd_standards();
        }
    }

    Ok(())
}

/// The session log follows `--log-level` when it names a plain level, and
/// keeps `info` for filter directives such as `dcap_capture=debug`.
fn diagnostic_level(log_level: &str) -> Level {
    log_level.parse().unwrap_or(Level::INFO)
}

fn cmd_capture(
    config: &CliConfig,
    frames: u64,
    output: Option<PathBuf>,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let mut capture = Capture::new();
    capture.start(config.board.driver(&config.session), config.session)?;

    let deadline = Instant::now() + timeout;
    let mut seen = 0u64;
    let mut last_version = 0u64;
    let mut frame = Vec::new();

    while seen < frames && !capture.has_finished() {
        if Instant::now() >= deadline {
            warn!("Timed out after {:?} with {seen} frames read", timeout);
            break;
        }

        if capture.channel().version() != last_version
            && let Some(latest) = capture.snapshot()
        {
            last_version = latest.version;
            seen += 1;
            info!(
                "Frame {seen}: {}x{} ({} bytes)",
                latest.width,
                latest.height,
                latest.data.len()
            );
            frame = latest.data;
        }

        thread::sleep(interval);
    }

    let report = capture.stop().unwrap_or_default();
    print_report(&report, seen);

    if let Some(path) = output {
        if frame.is_empty() {
            warn!("No frame was captured, not writing {}", path.display());
        } else {
            std::fs::write(&path, &frame)
                .with_context(|| format!("Failed to write frame to {}", path.display()))?;
            println!("Wrote {} bytes to {}", frame.len(), path.display());
        }
    }

    let log = capture.drain_log();
    if !log.is_empty() {
        println!("\nSession log:");
        print!("{log}");
    }

    if let Some(err) = report.error {
        bail!("Capture session failed: {err}");
    }

    Ok(())
}

fn print_report(report: &SessionReport, read: u64) {
    println!("Frames published:   {}", report.frames_published);
    println!("Frames read:        {read}");
    println!("Reconfigurations:   {}", report.reconfigurations);
    println!("Skipped iterations: {}", report.skipped_iterations);
    println!("Signal losses:      {}", report.signal_losses);
}

fn cmd_standards() {
    println!("Video standards:");
    for standard in VideoStandard::ALL {
        let c = standard.characteristics();
        println!(
            "  {:<14} {}x{}{} @ {}",
            standard.name(),
            c.width,
            c.height,
            if c.interlaced { "i" } else { "p" },
            c.frame_rate
        );
    }

    println!("\nSDI interfaces:");
    for interface in SdiInterface::ALL {
        println!("  {}", interface.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_log_level_follows_plain_levels() {
        assert_eq!(diagnostic_level("debug"), Level::DEBUG);
        assert_eq!(diagnostic_level("WARN"), Level::WARN);
        assert_eq!(diagnostic_level("dcap_capture=trace"), Level::INFO);
    }
}
