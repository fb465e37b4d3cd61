//! In-memory backend without audio output
//!
//! Keeps rate, volume and voice in memory and records every utterance.
//! In auto mode each utterance is "rendered" immediately: one word event
//! per whitespace-separated token followed by a finish event. In manual
//! mode nothing happens until the [`SilentHandle`] fires events, which
//! lets an embedder step through the utterance lifecycle by hand.
//!
//! Like the platform synthesizers it stands in for, changing the voice
//! resets rate and volume to their defaults, and pitch is unsupported
//! unless enabled with [`SilentBackend::with_pitch`].

use crate::speech::{BackendEvent, BackendFeatures, EventSink, SpeechBackend};
use crate::voice::{VoiceAttributes, KEY_GENDER, KEY_IDENTIFIER, KEY_LANGUAGE, KEY_LOCALE, KEY_NAME};
use crate::{DriverError, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Rate the backend starts with and falls back to on voice change
pub const DEFAULT_RATE: f32 = 175.0;
pub const DEFAULT_VOLUME: f32 = 1.0;
pub const DEFAULT_PITCH: f32 = 50.0;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("valid word regex"));

/// Character-offset word boundaries of `text`
pub fn word_boundaries(text: &str) -> Vec<(usize, usize)> {
    WORD.find_iter(text)
        .map(|m| {
            let location = text[..m.start()].chars().count();
            let length = m.as_str().chars().count();
            (location, length)
        })
        .collect()
}

struct SilentState {
    rate: f32,
    volume: f32,
    pitch: f32,
    voice: Option<String>,
    voices: Vec<VoiceAttributes>,
    spoken: Vec<String>,
    files: Vec<(String, PathBuf)>,
    cancels: usize,
    speaking: bool,
    sink: Option<EventSink>,
}

fn default_voices() -> Vec<VoiceAttributes> {
    vec![
        VoiceAttributes::new()
            .with(KEY_IDENTIFIER, "silent.en")
            .with(KEY_NAME, "Silent English")
            .with(KEY_LOCALE, "en_US")
            .with(KEY_GENDER, "neutral"),
        VoiceAttributes::new()
            .with(KEY_IDENTIFIER, "silent.fr")
            .with(KEY_NAME, "Silent French")
            .with(KEY_LANGUAGE, "fr"),
    ]
}

/// Backend that renders nothing
pub struct SilentBackend {
    state: Arc<Mutex<SilentState>>,
    auto: bool,
    pitch_supported: bool,
}

/// Handle for driving a manual [`SilentBackend`] from outside the driver
#[derive(Clone)]
pub struct SilentHandle {
    state: Arc<Mutex<SilentState>>,
}

fn lock(state: &Arc<Mutex<SilentState>>) -> MutexGuard<'_, SilentState> {
    // State stays consistent even if a holder panicked
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Deliver events without holding the state lock
fn emit(state: &Arc<Mutex<SilentState>>, events: &[BackendEvent]) {
    let sink = lock(state).sink.clone();
    if let Some(sink) = sink {
        for event in events {
            sink(*event);
        }
    }
}

impl SilentBackend {
    fn with_mode(auto: bool) -> Self {
        let state = SilentState {
            rate: DEFAULT_RATE,
            volume: DEFAULT_VOLUME,
            pitch: DEFAULT_PITCH,
            voice: Some("silent.en".to_string()),
            voices: default_voices(),
            spoken: Vec::new(),
            files: Vec::new(),
            cancels: 0,
            speaking: false,
            sink: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            auto,
            pitch_supported: false,
        }
    }

    /// Backend that finishes every utterance as soon as it is submitted
    pub fn auto() -> Self {
        Self::with_mode(true)
    }

    /// Backend whose events are fired through the returned handle
    pub fn manual() -> (Self, SilentHandle) {
        let backend = Self::with_mode(false);
        let handle = backend.handle();
        (backend, handle)
    }

    /// Enable pitch support
    pub fn with_pitch(mut self) -> Self {
        self.pitch_supported = true;
        self
    }

    /// Replace the advertised voice records
    pub fn with_voices(self, voices: Vec<VoiceAttributes>) -> Self {
        lock(&self.state).voices = voices;
        self
    }

    pub fn handle(&self) -> SilentHandle {
        SilentHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn render(&self, text: &str) {
        lock(&self.state).speaking = true;
        if !self.auto {
            return;
        }

        let mut events = vec![BackendEvent::WillSpeak];
        events.extend(
            word_boundaries(text)
                .into_iter()
                .map(|(location, length)| BackendEvent::Word { location, length }),
        );
        events.push(BackendEvent::Finished { success: true });

        lock(&self.state).speaking = false;
        emit(&self.state, &events);
    }
}

impl SpeechBackend for SilentBackend {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn features(&self) -> BackendFeatures {
        BackendFeatures {
            pitch: self.pitch_supported,
            word_events: true,
            finish_events: true,
            save_to_file: true,
        }
    }

    fn voices(&self) -> Result<Vec<VoiceAttributes>> {
        Ok(lock(&self.state).voices.clone())
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        debug!("Silently speaking: {}", text);
        lock(&self.state).spoken.push(text.to_string());
        self.render(text);
        Ok(())
    }

    fn speak_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        debug!("Silently saving to {}: {}", path.display(), text);
        lock(&self.state)
            .files
            .push((text.to_string(), path.to_path_buf()));
        self.render(text);
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        debug!("Canceling silent speech");
        lock(&self.state).cancels += 1;
        Ok(())
    }

    fn rate(&self) -> Result<f32> {
        Ok(lock(&self.state).rate)
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        lock(&self.state).rate = rate;
        Ok(())
    }

    fn volume(&self) -> Result<f32> {
        Ok(lock(&self.state).volume)
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        lock(&self.state).volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn voice(&self) -> Result<Option<String>> {
        Ok(lock(&self.state).voice.clone())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        let known = state
            .voices
            .iter()
            .any(|v| v.get(KEY_IDENTIFIER) == Some(id));
        if !known {
            return Err(DriverError::Backend(format!("no such voice: {}", id)));
        }

        state.voice = Some(id.to_string());
        state.rate = DEFAULT_RATE;
        state.volume = DEFAULT_VOLUME;
        Ok(())
    }

    fn pitch(&self) -> Result<f32> {
        if !self.pitch_supported {
            return Err(DriverError::UnsupportedFeature("pitch adjustment".to_string()));
        }
        Ok(lock(&self.state).pitch)
    }

    fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        if !self.pitch_supported {
            return Err(DriverError::UnsupportedFeature("pitch adjustment".to_string()));
        }
        lock(&self.state).pitch = pitch;
        Ok(())
    }

    fn set_event_sink(&mut self, sink: Option<EventSink>) -> Result<()> {
        lock(&self.state).sink = sink;
        Ok(())
    }
}

impl SilentHandle {
    /// Report a word boundary for the current utterance
    pub fn word(&self, location: usize, length: usize) {
        emit(&self.state, &[BackendEvent::Word { location, length }]);
    }

    /// Finish the current utterance
    ///
    /// The backend reports failure when a cancel arrived while speaking.
    pub fn finish(&self) {
        let success = {
            let mut state = lock(&self.state);
            state.speaking = false;
            std::mem::take(&mut state.cancels) == 0
        };
        emit(&self.state, &[BackendEvent::Finished { success }]);
    }

    pub fn is_speaking(&self) -> bool {
        lock(&self.state).speaking
    }

    /// Texts submitted for live playback
    pub fn spoken(&self) -> Vec<String> {
        lock(&self.state).spoken.clone()
    }

    /// Texts submitted for file rendering with their destinations
    pub fn files(&self) -> Vec<(String, PathBuf)> {
        lock(&self.state).files.clone()
    }

    /// Number of cancel requests since the last finish
    pub fn cancels(&self) -> usize {
        lock(&self.state).cancels
    }

    /// Whether an event target is registered
    pub fn has_sink(&self) -> bool {
        lock(&self.state).sink.is_some()
    }
}
