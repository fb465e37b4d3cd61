//! espeak-ng backend
//!
//! Runs one `espeak-ng` process per utterance with the text fed through
//! stdin. A watcher thread polls the process and reports `Finished` when
//! it exits, including after a cancel kills it. espeak-ng can also write
//! WAV files, so this is the backend to use for `save_to_file`.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::platform::find_program;
use crate::speech::{BackendEvent, BackendFeatures, EventSink, SpeechBackend};
use crate::voice::{VoiceAttributes, KEY_AGE, KEY_GENDER, KEY_IDENTIFIER, KEY_LANGUAGE, KEY_NAME};
use crate::{DriverError, Result};
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// espeak-ng's own default speed
pub const DEFAULT_RATE: f32 = 175.0;

/// How often the watcher checks whether espeak-ng exited
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One line of `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`
static VOICE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s+(\S+)\s+(\S+)/(\S)\s+(\S+)\s+\S+").expect("valid voice line regex")
});

/// Parse the table printed by `espeak-ng --voices`
pub fn parse_voice_list(output: &str) -> Vec<VoiceAttributes> {
    output
        .lines()
        .filter_map(|line| VOICE_LINE.captures(line))
        .map(|caps| {
            let language = &caps[1];
            let mut attrs = VoiceAttributes::new()
                .with(KEY_IDENTIFIER, language)
                .with(KEY_NAME, caps[4].replace('_', " "))
                .with(KEY_LANGUAGE, language);

            match &caps[3] {
                "M" => attrs.insert(KEY_GENDER, "male"),
                "F" => attrs.insert(KEY_GENDER, "female"),
                _ => {}
            }
            if let Ok(age) = caps[2].parse::<u32>() {
                attrs.insert(KEY_AGE, age.to_string());
            }
            attrs
        })
        .collect()
}

/// Convert words per minute to an espeak-ng speed
fn rate_to_speed(rate: f32) -> u32 {
    rate.round().clamp(80.0, 450.0) as u32
}

/// Convert volume (0.0-1.0) to espeak-ng amplitude (0-100 of 0-200)
fn volume_to_amplitude(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn pitch_to_espeak(pitch: f32) -> u32 {
    pitch.round().clamp(0.0, 99.0) as u32
}

/// Process rendering the current utterance
struct Running {
    generation: u64,
    child: Child,
}

/// espeak-ng subprocess backend
pub struct EspeakBackend {
    espeak_path: PathBuf,
    rate: f32,
    volume: f32,
    pitch: f32,
    voice: Option<String>,
    current: Arc<Mutex<Option<Running>>>,
    generation: u64,
    sink: Arc<Mutex<Option<EventSink>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EspeakBackend {
    /// Create a new espeak-ng backend
    ///
    /// Fails if espeak-ng is not installed
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let espeak_path = find_program("espeak-ng").ok_or_else(|| {
            DriverError::Backend(
                "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
            )
        })?;
        debug!("Found espeak-ng at: {}", espeak_path.display());

        Ok(Self {
            espeak_path,
            rate: DEFAULT_RATE,
            volume: 1.0,
            pitch: 50.0,
            voice: Some("en".to_string()),
            current: Arc::new(Mutex::new(None)),
            generation: 0,
            sink: Arc::new(Mutex::new(None)),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("-s").arg(rate_to_speed(self.rate).to_string());
        cmd.arg("-a").arg(volume_to_amplitude(self.volume).to_string());
        cmd.arg("-p").arg(pitch_to_espeak(self.pitch).to_string());
        if let Some(voice) = &self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd
    }

    /// Kill and reap a process left over from an earlier utterance
    fn discard_current(&mut self) {
        if let Some(mut running) = lock(&self.current).take() {
            debug!("Discarding espeak-ng process {}", running.generation);
            if running.child.kill().is_ok() {
                let _ = running.child.wait();
            }
        }
    }

    /// Spawn espeak-ng for one utterance and start watching it
    fn start(&mut self, mut cmd: Command, text: &str) -> Result<()> {
        self.discard_current();

        cmd.arg("--stdin");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn espeak-ng: {}", e);
            DriverError::Backend(format!("Failed to start espeak-ng: {}", e))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                warn!("Failed to send text to espeak-ng: {}", e);
            }
        }

        self.generation += 1;
        let generation = self.generation;
        *lock(&self.current) = Some(Running { generation, child });

        deliver(&self.sink, BackendEvent::WillSpeak);

        let current = Arc::clone(&self.current);
        let sink = Arc::clone(&self.sink);
        thread::spawn(move || watch(generation, current, sink));

        debug!("espeak-ng process {} started", generation);
        Ok(())
    }
}

/// Hand an event to the registered sink without holding its lock
fn deliver(sink: &Mutex<Option<EventSink>>, event: BackendEvent) {
    let target = lock(sink).clone();
    if let Some(target) = target {
        target(event);
    }
}

/// Wait for an utterance's process to exit and report it
///
/// Reports nothing if the process was replaced by a newer utterance.
fn watch(
    generation: u64,
    current: Arc<Mutex<Option<Running>>>,
    sink: Arc<Mutex<Option<EventSink>>>,
) {
    let success = loop {
        thread::sleep(POLL_INTERVAL);

        let mut slot = lock(&current);
        let running = match slot.as_mut() {
            Some(running) if running.generation == generation => running,
            _ => return,
        };

        match running.child.try_wait() {
            Ok(Some(status)) => {
                *slot = None;
                break status.success();
            }
            Ok(None) => continue,
            Err(e) => {
                error!("Failed to poll espeak-ng: {}", e);
                *slot = None;
                break false;
            }
        }
    };

    debug!("espeak-ng process {} exited (success={})", generation, success);
    deliver(&sink, BackendEvent::Finished { success });
}

impl SpeechBackend for EspeakBackend {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn features(&self) -> BackendFeatures {
        BackendFeatures {
            pitch: true,
            word_events: false,
            finish_events: true,
            save_to_file: true,
        }
    }

    fn voices(&self) -> Result<Vec<VoiceAttributes>> {
        let output = Command::new(&self.espeak_path)
            .arg("--voices")
            .output()
            .map_err(|e| DriverError::Backend(format!("Failed to list voices: {}", e)))?;

        if !output.status.success() {
            return Err(DriverError::Backend(format!(
                "espeak-ng --voices failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        debug!("Speaking: {}", text);
        let cmd = self.command();
        self.start(cmd, text)
    }

    fn speak_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        debug!("Saving to {}: {}", path.display(), text);
        let mut cmd = self.command();
        cmd.arg("-w").arg(path);
        self.start(cmd, text)
    }

    fn cancel(&mut self) -> Result<()> {
        debug!("Canceling speech");
        // The watcher notices the exit and reports the finish
        if let Some(running) = lock(&self.current).as_mut() {
            if let Err(e) = running.child.kill() {
                debug!("Failed to kill espeak-ng process: {}", e);
            }
        }
        Ok(())
    }

    fn rate(&self) -> Result<f32> {
        Ok(self.rate)
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        debug!("Setting rate to {}", rate);
        self.rate = rate;
        Ok(())
    }

    fn volume(&self) -> Result<f32> {
        Ok(self.volume)
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        debug!("Setting volume to {}", volume);
        self.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn voice(&self) -> Result<Option<String>> {
        Ok(self.voice.clone())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(DriverError::Backend("empty voice identifier".to_string()));
        }
        debug!("Setting voice to {}", id);
        self.voice = Some(id.to_string());
        Ok(())
    }

    fn pitch(&self) -> Result<f32> {
        Ok(self.pitch)
    }

    fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        debug!("Setting pitch to {}", pitch);
        self.pitch = pitch;
        Ok(())
    }

    fn set_event_sink(&mut self, sink: Option<EventSink>) -> Result<()> {
        *lock(&self.sink) = sink;
        Ok(())
    }
}

impl Drop for EspeakBackend {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        self.discard_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    const VOICES: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
 5  fr-fr           30/F      French_(France)    roa/fr
";

    #[test]
    fn test_parse_voice_list() {
        let voices = parse_voice_list(VOICES);
        assert_eq!(voices.len(), 3);

        assert_eq!(voices[1].get(KEY_IDENTIFIER), Some("en-us"));
        assert_eq!(voices[1].get(KEY_NAME), Some("English (America)"));
        assert_eq!(voices[1].locale(), Some("en-us"));
        assert_eq!(voices[1].get(KEY_GENDER), Some("male"));
        assert_eq!(voices[1].get(KEY_AGE), None);

        assert_eq!(voices[2].get(KEY_GENDER), Some("female"));
        assert_eq!(voices[2].get(KEY_AGE), Some("30"));
    }

    #[test]
    fn test_parse_skips_header_and_noise() {
        assert!(parse_voice_list("Pty Language Age/Gender VoiceName\n\n").is_empty());
    }

    #[test]
    fn test_rate_conversion() {
        assert_eq!(rate_to_speed(200.0), 200);
        assert_eq!(rate_to_speed(10.0), 80);
        assert_eq!(rate_to_speed(1000.0), 450);
    }

    #[test]
    fn test_volume_conversion() {
        assert_eq!(volume_to_amplitude(0.0), 0);
        assert_eq!(volume_to_amplitude(0.5), 50);
        assert_eq!(volume_to_amplitude(1.0), 100);
        assert_eq!(volume_to_amplitude(3.0), 100);
    }

    #[test]
    fn test_pitch_conversion() {
        assert_eq!(pitch_to_espeak(50.0), 50);
        assert_eq!(pitch_to_espeak(-4.0), 0);
        assert_eq!(pitch_to_espeak(150.0), 99);
    }

    #[test]
    fn test_sink_unlocked_during_delivery() {
        let slot: Arc<Mutex<Option<EventSink>>> = Arc::new(Mutex::new(None));
        let unlocked = Arc::new(AtomicBool::new(false));

        let inner_slot = Arc::clone(&slot);
        let seen = Arc::clone(&unlocked);
        let sink: EventSink = Arc::new(move |_event: BackendEvent| {
            // Detaching from inside a callback must not block
            seen.store(inner_slot.try_lock().is_ok(), Ordering::SeqCst);
        });
        *lock(&slot) = Some(sink);

        deliver(&slot, BackendEvent::Finished { success: true });
        assert!(unlocked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_create_espeak_backend() {
        match EspeakBackend::new() {
            Ok(_) => println!("✓ espeak-ng backend available"),
            Err(e) => println!("⚠ espeak-ng backend not available: {}", e),
        }
    }
}
