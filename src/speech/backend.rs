//! Speech backend abstraction
//!
//! A backend is the platform facility that actually renders speech. The
//! driver holds exactly one backend and talks to it only through this
//! trait; everything platform-specific lives behind it.

use crate::platform::{find_program, is_wsl};
use crate::voice::VoiceAttributes;
use crate::{DriverError, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Events a backend reports while rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// The backend is about to start speaking an utterance
    WillSpeak,
    /// A word boundary was reached; offsets are in characters
    Word { location: usize, length: usize },
    /// Rendering ended, naturally or after a cancel
    Finished { success: bool },
}

/// Callback target a backend delivers events to
///
/// Backends may invoke it from any thread.
pub type EventSink = Arc<dyn Fn(BackendEvent) + Send + Sync>;

/// Platform quirks the driver has to respect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendFeatures {
    /// Pitch can be read and changed
    pub pitch: bool,
    /// `Word` events are delivered
    pub word_events: bool,
    /// `Finished` events are delivered
    pub finish_events: bool,
    /// Text can be rendered into a file
    pub save_to_file: bool,
}

/// Speech backend capability
///
/// Rates are in words per minute and volumes in the range 0.0 to 1.0
/// regardless of what the platform uses internally.
pub trait SpeechBackend: Send {
    /// Short name used in logs and configuration
    fn name(&self) -> &'static str;

    /// Which optional capabilities this backend has
    fn features(&self) -> BackendFeatures;

    /// Attribute records for every installed voice
    fn voices(&self) -> Result<Vec<VoiceAttributes>>;

    /// Start speaking text; returns before rendering completes
    fn speak(&mut self, text: &str) -> Result<()>;

    /// Start rendering text into a file
    fn speak_to_file(&mut self, _text: &str, _path: &Path) -> Result<()> {
        Err(DriverError::UnsupportedFeature("saving to file".to_string()))
    }

    /// Request cancellation of the current utterance
    fn cancel(&mut self) -> Result<()>;

    fn rate(&self) -> Result<f32>;

    fn set_rate(&mut self, rate: f32) -> Result<()>;

    fn volume(&self) -> Result<f32>;

    fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Identifier of the active voice
    fn voice(&self) -> Result<Option<String>>;

    fn set_voice(&mut self, id: &str) -> Result<()>;

    fn pitch(&self) -> Result<f32> {
        Err(DriverError::UnsupportedFeature("pitch adjustment".to_string()))
    }

    fn set_pitch(&mut self, _pitch: f32) -> Result<()> {
        Err(DriverError::UnsupportedFeature("pitch adjustment".to_string()))
    }

    /// Register or clear the event callback target
    fn set_event_sink(&mut self, sink: Option<EventSink>) -> Result<()>;
}

/// Names accepted by [`create_backend`]
pub const BACKEND_NAMES: &[&str] = &["native", "espeak", "silent"];

/// Create a backend by name
pub fn create_backend(name: &str) -> Result<Box<dyn SpeechBackend>> {
    use super::backends::{EspeakBackend, NativeBackend, SilentBackend};

    info!("Creating {} speech backend", name);
    match name {
        "native" => Ok(Box::new(NativeBackend::new()?)),
        "espeak" => Ok(Box::new(EspeakBackend::new()?)),
        "silent" => Ok(Box::new(SilentBackend::auto())),
        other => Err(DriverError::Config(format!(
            "unknown backend '{}' (expected one of: {})",
            other,
            BACKEND_NAMES.join(", ")
        ))),
    }
}

/// Pick a backend name when none is configured
///
/// WSL rarely has a working Speech Dispatcher, so espeak-ng is preferred
/// there when installed.
pub fn default_backend_name() -> &'static str {
    if is_wsl() && find_program("espeak-ng").is_some() {
        info!("Detected WSL with espeak-ng installed");
        return "espeak";
    }
    "native"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend() {
        match create_backend("bogus") {
            Err(DriverError::Config(msg)) => assert!(msg.contains("bogus")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("bogus backend should not be created"),
        }
    }

    #[test]
    fn test_silent_backend_always_available() {
        let backend = create_backend("silent").expect("silent backend");
        assert_eq!(backend.name(), "silent");
        assert!(backend.features().finish_events);
    }

    #[test]
    fn test_default_backend_name_is_known() {
        assert!(BACKEND_NAMES.contains(&default_backend_name()));
    }
}
