//! saydriver command line front end
//!
//! Speaks text (or saves it to a file) through the speech driver and
//! waits for the backend to report that the utterance finished.

use anyhow::{bail, Context};
use clap::Parser;
use log::{debug, error, info, warn};
use saydriver::config::{timeout_from_secs, Config};
use saydriver::proxy::ChannelProxy;
use saydriver::{build_driver, Notification, SpeechDriver, Voice};
use std::path::PathBuf;
use std::process;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Speak text through a platform speech backend
#[derive(Parser)]
#[command(name = "saydriver")]
#[command(version)]
#[command(about = "Speak text through a platform speech backend", long_about = None)]
struct Cli {
    /// Text to speak
    text: Vec<String>,

    /// Backend to use: native, espeak or silent
    #[arg(short, long)]
    backend: Option<String>,

    /// Rate in words per minute
    #[arg(short, long)]
    rate: Option<f32>,

    /// Volume from 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Pitch from 0 to 100
    #[arg(long)]
    pitch: Option<f32>,

    /// Voice identifier (see --list-voices)
    #[arg(short, long)]
    voice: Option<String>,

    /// Render into this file instead of speaking
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List installed voices and exit
    #[arg(long)]
    list_voices: bool,

    /// Print the voice list as JSON
    #[arg(long, requires = "list_voices")]
    json: bool,

    /// Seconds to wait for the utterance to finish
    #[arg(short, long)]
    timeout: Option<f32>,

    /// Write debug logs to saydriver.log
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("saydriver.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open saydriver.log for debug logging: {}", e);
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .init();
            }
        }
        info!("saydriver {} starting (debug mode)", saydriver::VERSION);
    } else {
        // Warnings by default, RUST_LOG still takes precedence
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Warn)
            .parse_default_env()
            .init();
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    info!("Configuration loaded from {:?}", config.path());

    let (tx, rx) = channel();
    let proxy = Arc::new(ChannelProxy::new(tx));

    let backend = cli.backend.clone().or_else(|| config.backend());
    let mut driver =
        build_driver(proxy, backend.as_deref()).context("Failed to create speech driver")?;

    // Voice first: it may reset rate and volume on some backends
    if let Some(voice) = cli.voice.clone().or_else(|| config.voice()) {
        driver
            .set_property("voice", voice.as_str())
            .with_context(|| format!("Failed to select voice {}", voice))?;
    }
    if let Some(rate) = cli.rate.or_else(|| config.rate()) {
        driver.set_property("rate", rate)?;
    }
    if let Some(volume) = cli.volume.or_else(|| config.volume()) {
        driver.set_property("volume", volume)?;
    }
    if let Some(pitch) = cli.pitch {
        driver.set_property("pitch", pitch)?;
    }

    if cli.list_voices {
        let voices = driver.voices().context("Failed to list voices")?;
        print_voices(&voices, cli.json)?;
        driver.destroy()?;
        return Ok(());
    }

    let text = cli.text.join(" ");
    if text.trim().is_empty() {
        bail!("Nothing to say (pass text as arguments)");
    }

    match &cli.output {
        Some(path) => driver
            .save_to_file(&text, path)
            .with_context(|| format!("Failed to save speech to {}", path.display()))?,
        None => driver.say(&text).context("Failed to speak")?,
    }

    if driver.features().finish_events {
        let timeout = cli
            .timeout
            .and_then(timeout_from_secs)
            .unwrap_or_else(|| config.timeout());
        wait_for_finish(&mut driver, &rx, timeout)?;
    } else {
        warn!(
            "The {} backend does not report when speech ends; exiting immediately",
            driver.backend_name()
        );
    }

    driver.destroy()?;
    Ok(())
}

/// Block until `finished-utterance`, stopping speech on timeout
fn wait_for_finish(
    driver: &mut SpeechDriver,
    rx: &Receiver<Notification>,
    timeout: Duration,
) -> anyhow::Result<()> {
    // Timeouts past the end of the clock wait indefinitely
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
        match rx.recv_timeout(remaining) {
            Ok(Notification::FinishedUtterance { completed }) => {
                info!("Utterance finished (completed={})", completed);
                if !completed {
                    bail!("Speech was interrupted");
                }
                return Ok(());
            }
            Ok(other) => debug!("{}", other),
            Err(RecvTimeoutError::Timeout) => {
                driver.stop()?;
                bail!("Speech did not finish within {:?}", timeout);
            }
            Err(RecvTimeoutError::Disconnected) => {
                bail!("Speech backend went away");
            }
        }
    }
}

fn print_voices(voices: &[Voice], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(voices)?);
        return Ok(());
    }

    for voice in voices {
        let gender = voice.gender.as_deref().unwrap_or("-");
        println!(
            "{:<30} {:<12} {:<8} {}",
            voice.id,
            voice.languages.join(","),
            gender,
            voice.name
        );
    }
    Ok(())
}
