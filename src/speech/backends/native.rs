//! Native TTS backend using the tts crate
//!
//! The `tts` crate provides a unified interface to:
//! - Speech Dispatcher on Linux
//! - AVFoundation on macOS/iOS
//! - WinRT/SAPI on Windows
//!
//! Each platform uses its own rate, volume and pitch ranges. This backend
//! maps the driver's units onto them piecewise around the platform's
//! normal value so that the driver default lands on the platform default.

use crate::speech::{BackendEvent, BackendFeatures, EventSink, SpeechBackend};
use crate::voice::{VoiceAttributes, KEY_GENDER, KEY_IDENTIFIER, KEY_LOCALE, KEY_NAME};
use crate::{DriverError, Result};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex};
use tts::{Gender, Tts, UtteranceId};

/// Words per minute that map to the platform's normal rate
const NORMAL_WPM: f32 = 200.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

/// Driver pitch that maps to the platform's normal pitch
const NORMAL_PITCH: f32 = 50.0;
const MAX_PITCH: f32 = 100.0;

/// Map `value` from `[lo, mid, hi]` onto `[to_lo, to_mid, to_hi]`
fn piecewise(value: f32, from: (f32, f32, f32), to: (f32, f32, f32)) -> f32 {
    let (lo, mid, hi) = from;
    let (to_lo, to_mid, to_hi) = to;
    let value = value.clamp(lo, hi);

    if value <= mid {
        if mid == lo {
            return to_mid;
        }
        to_lo + (value - lo) / (mid - lo) * (to_mid - to_lo)
    } else {
        if hi == mid {
            return to_mid;
        }
        to_mid + (value - mid) / (hi - mid) * (to_hi - to_mid)
    }
}

/// Native TTS backend using the tts crate
pub struct NativeBackend {
    tts: Tts,

    /// Last voice set, for platforms that can't report the active voice
    voice_id: Option<String>,

    /// Cached rate in words per minute
    ///
    /// The platform scale is often integral, so reading it back through
    /// the conversion would not return the value that was set.
    rate: Option<f32>,

    /// Cached volume (0.0-1.0)
    volume: Option<f32>,

    /// Cached pitch (0-100)
    pitch: Option<f32>,

    /// Event target shared with the registered utterance callbacks
    sink: Arc<Mutex<Option<EventSink>>>,
}

impl NativeBackend {
    /// Create a new native backend
    ///
    /// Initializes the platform TTS and registers utterance callbacks
    /// where the platform supports them.
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = Tts::default()
            .map_err(|e| DriverError::Backend(format!("Failed to initialize TTS: {}", e)))?;

        let backend = Self {
            tts,
            voice_id: None,
            rate: None,
            volume: None,
            pitch: None,
            sink: Arc::new(Mutex::new(None)),
        };
        backend.register_callbacks()?;

        debug!("Native TTS backend created successfully");
        Ok(backend)
    }

    fn register_callbacks(&self) -> Result<()> {
        if !self.tts.supported_features().utterance_callbacks {
            warn!("Utterance callbacks not supported on this platform");
            return Ok(());
        }

        let relay = |sink: &Arc<Mutex<Option<EventSink>>>, event: BackendEvent| {
            let sink = Arc::clone(sink);
            move |_id: UtteranceId| {
                let target = sink.lock().ok().and_then(|s| s.clone());
                if let Some(target) = target {
                    target(event);
                }
            }
        };

        self.tts.on_utterance_begin(Some(Box::new(relay(
            &self.sink,
            BackendEvent::WillSpeak,
        ))))?;
        self.tts.on_utterance_end(Some(Box::new(relay(
            &self.sink,
            BackendEvent::Finished { success: true },
        ))))?;
        self.tts.on_utterance_stop(Some(Box::new(relay(
            &self.sink,
            BackendEvent::Finished { success: false },
        ))))?;
        Ok(())
    }

    fn rate_range(&self) -> (f32, f32, f32) {
        (
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        )
    }

    fn volume_range(&self) -> (f32, f32, f32) {
        let (lo, hi) = (self.tts.min_volume(), self.tts.max_volume());
        (lo, (lo + hi) / 2.0, hi)
    }

    fn pitch_range(&self) -> (f32, f32, f32) {
        (
            self.tts.min_pitch(),
            self.tts.normal_pitch(),
            self.tts.max_pitch(),
        )
    }
}

fn to_attributes(voice: &tts::Voice) -> VoiceAttributes {
    let mut attrs = VoiceAttributes::new()
        .with(KEY_IDENTIFIER, voice.id())
        .with(KEY_NAME, voice.name())
        .with(KEY_LOCALE, voice.language().to_string());

    match voice.gender() {
        Some(Gender::Male) => attrs.insert(KEY_GENDER, "male"),
        Some(Gender::Female) => attrs.insert(KEY_GENDER, "female"),
        None => {}
    }
    attrs
}

impl SpeechBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn features(&self) -> BackendFeatures {
        let features = self.tts.supported_features();
        BackendFeatures {
            pitch: features.pitch,
            word_events: false,
            finish_events: features.utterance_callbacks,
            save_to_file: false,
        }
    }

    fn voices(&self) -> Result<Vec<VoiceAttributes>> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| DriverError::Backend(format!("Failed to get voices: {}", e)))?;
        Ok(voices.iter().map(to_attributes).collect())
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        debug!("Speaking: {}", text);
        self.tts.speak(text, false).map_err(|e| {
            error!("Failed to speak: {}", e);
            DriverError::Backend(format!("Speak failed: {}", e))
        })?;
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        debug!("Canceling speech");
        if !self.tts.supported_features().stop {
            warn!("Stopping speech not supported on this platform");
            return Ok(());
        }

        self.tts.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            DriverError::Backend(format!("Cancel failed: {}", e))
        })?;
        Ok(())
    }

    fn rate(&self) -> Result<f32> {
        if let Some(rate) = self.rate {
            return Ok(rate);
        }
        let rate = self.tts.get_rate()?;
        Ok(piecewise(
            rate,
            self.rate_range(),
            (MIN_WPM, NORMAL_WPM, MAX_WPM),
        ))
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !self.tts.supported_features().rate {
            warn!("Rate control not supported on this platform");
            return Ok(());
        }

        let converted = piecewise(rate, (MIN_WPM, NORMAL_WPM, MAX_WPM), self.rate_range());
        debug!("Setting rate to {} wpm ({} native)", rate, converted);
        self.tts
            .set_rate(converted)
            .map_err(|e| DriverError::Backend(format!("Failed to set rate: {}", e)))?;
        self.rate = Some(rate.clamp(MIN_WPM, MAX_WPM));
        Ok(())
    }

    fn volume(&self) -> Result<f32> {
        if let Some(volume) = self.volume {
            return Ok(volume);
        }
        let volume = self.tts.get_volume()?;
        Ok(piecewise(volume, self.volume_range(), (0.0, 0.5, 1.0)))
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !self.tts.supported_features().volume {
            warn!("Volume control not supported on this platform");
            return Ok(());
        }

        let converted = piecewise(volume, (0.0, 0.5, 1.0), self.volume_range());
        debug!("Setting volume to {} ({} native)", volume, converted);
        self.tts
            .set_volume(converted)
            .map_err(|e| DriverError::Backend(format!("Failed to set volume: {}", e)))?;
        self.volume = Some(volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn voice(&self) -> Result<Option<String>> {
        if self.tts.supported_features().get_voice {
            return Ok(self.tts.voice()?.map(|v| v.id()));
        }
        Ok(self.voice_id.clone())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| DriverError::Backend(format!("Failed to get voices: {}", e)))?;

        let voice = voices
            .iter()
            .find(|v| v.id() == id)
            .ok_or_else(|| DriverError::Backend(format!("no such voice: {}", id)))?;

        debug!("Selecting voice: {:?}", voice);
        self.tts
            .set_voice(voice)
            .map_err(|e| DriverError::Backend(format!("Failed to set voice: {}", e)))?;
        self.voice_id = Some(id.to_string());
        Ok(())
    }

    fn pitch(&self) -> Result<f32> {
        if !self.tts.supported_features().pitch {
            return Err(DriverError::UnsupportedFeature("pitch adjustment".to_string()));
        }
        if let Some(pitch) = self.pitch {
            return Ok(pitch);
        }
        let pitch = self.tts.get_pitch()?;
        Ok(piecewise(
            pitch,
            self.pitch_range(),
            (0.0, NORMAL_PITCH, MAX_PITCH),
        ))
    }

    fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        if !self.tts.supported_features().pitch {
            return Err(DriverError::UnsupportedFeature("pitch adjustment".to_string()));
        }
        let converted = piecewise(pitch, (0.0, NORMAL_PITCH, MAX_PITCH), self.pitch_range());
        self.tts.set_pitch(converted)?;
        self.pitch = Some(pitch.clamp(0.0, MAX_PITCH));
        Ok(())
    }

    fn set_event_sink(&mut self, sink: Option<EventSink>) -> Result<()> {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = sink;
        }
        Ok(())
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        if self.tts.supported_features().utterance_callbacks {
            let _ = self.tts.on_utterance_begin(None);
            let _ = self.tts.on_utterance_end(None);
            let _ = self.tts.on_utterance_stop(None);
        }
    }
}
