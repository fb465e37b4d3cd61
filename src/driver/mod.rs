//! Speech driver adapter
//!
//! The driver sits between a TTS engine and one speech backend. The
//! engine calls [`SpeechDriver::say`], [`SpeechDriver::stop`] and the
//! property accessors; the backend reports progress through callbacks,
//! which the driver turns into engine notifications.
//!
//! Per utterance the driver moves `idle → speaking → {finished | stopped}
//! → idle`. `say` starts speaking, the backend's finish callback ends it,
//! and the `completed` field of `finished-utterance` tells the engine
//! whether `stop()` was called in between. Overlapping utterances are the
//! backend's business.

pub mod property;
pub mod relay;

pub use property::{Property, PropertyValue};

use crate::proxy::{EngineProxy, Notification};
use crate::speech::{
    create_backend, default_backend_name, BackendEvent, BackendFeatures, SpeechBackend,
};
use crate::voice::{voices_from_attributes, Voice};
use crate::{DriverError, Result};
use log::{debug, info, warn};
use relay::EventRelay;
use std::path::Path;
use std::sync::Arc;

/// Rate applied when the driver is created, in words per minute
pub const DEFAULT_RATE: f32 = 200.0;

/// Speech driver adapter over a single backend
pub struct SpeechDriver {
    proxy: Arc<dyn EngineProxy>,
    backend: Box<dyn SpeechBackend>,
    relay: Arc<EventRelay>,
    detached: bool,
}

/// Create a driver for the named backend
///
/// With no name the platform default is used.
pub fn build_driver(proxy: Arc<dyn EngineProxy>, backend: Option<&str>) -> Result<SpeechDriver> {
    let name = backend.unwrap_or_else(|| default_backend_name());
    SpeechDriver::new(proxy, create_backend(name)?)
}

impl SpeechDriver {
    /// Wrap a backend, register for its events and apply the default rate
    pub fn new(proxy: Arc<dyn EngineProxy>, mut backend: Box<dyn SpeechBackend>) -> Result<Self> {
        let relay = Arc::new(EventRelay::new(Arc::clone(&proxy)));
        backend.set_event_sink(Some(relay.sink()))?;
        backend.set_rate(DEFAULT_RATE)?;

        info!("Speech driver ready on {} backend", backend.name());
        Ok(Self {
            proxy,
            backend,
            relay,
            detached: false,
        })
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn features(&self) -> BackendFeatures {
        self.backend.features()
    }

    /// Start speaking `text`; completion is reported through the proxy
    ///
    /// If the backend rejects the text outright, the engine still gets a
    /// `finished-utterance` with `completed=false` for the start it saw.
    pub fn say(&mut self, text: &str) -> Result<()> {
        debug!("say: {}", text);
        self.start_utterance();

        let result = self.backend.speak(text);
        if result.is_err() {
            self.abort_utterance();
        }
        result
    }

    /// Stop the current utterance
    ///
    /// When an utterance is in progress its eventual finish is reported
    /// with `completed=false`. Cancellation is not instantaneous.
    pub fn stop(&mut self) -> Result<()> {
        debug!("stop (busy={})", self.proxy.is_busy());
        if self.proxy.is_busy() {
            self.relay.interrupt();
        }
        self.backend.cancel()
    }

    /// Render `text` into a file instead of speaking it
    ///
    /// Follows the same notification contract as [`SpeechDriver::say`].
    pub fn save_to_file(&mut self, text: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        debug!("save_to_file {}: {}", path.display(), text);
        if !self.backend.features().save_to_file {
            return Err(DriverError::UnsupportedFeature(format!(
                "saving to file with the {} backend",
                self.backend.name()
            )));
        }

        self.start_utterance();
        let result = self.backend.speak_to_file(text, path);
        if result.is_err() {
            self.abort_utterance();
        }
        result
    }

    fn start_utterance(&self) {
        self.proxy.set_busy(true);
        self.relay.begin();
        self.proxy.notify(Notification::StartedUtterance);
    }

    /// Close an utterance the backend never accepted
    fn abort_utterance(&self) {
        self.relay.interrupt();
        self.relay.handle(BackendEvent::Finished { success: false });
    }

    /// Installed voices, normalized
    pub fn voices(&self) -> Result<Vec<Voice>> {
        Ok(voices_from_attributes(&self.backend.voices()?))
    }

    /// Read a property by name
    pub fn get_property(&self, name: &str) -> Result<PropertyValue> {
        match name.parse::<Property>()? {
            Property::Voices => Ok(PropertyValue::Voices(self.voices()?)),
            Property::Voice => Ok(self.backend.voice()?.into()),
            Property::Rate => Ok(PropertyValue::Number(self.backend.rate()?)),
            Property::Volume => Ok(PropertyValue::Number(self.backend.volume()?)),
            Property::Pitch => {
                if !self.backend.features().pitch {
                    self.warn_pitch();
                    return Ok(PropertyValue::None);
                }
                match self.backend.pitch() {
                    Ok(pitch) => Ok(PropertyValue::Number(pitch)),
                    Err(DriverError::UnsupportedFeature(_)) => {
                        self.warn_pitch();
                        Ok(PropertyValue::None)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Write a property by name
    ///
    /// `voices` is read-only and rejected like an unknown name.
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let property = name.parse::<Property>()?;
        let value = value.into();
        debug!("set_property {} = {:?}", property, value);

        match property {
            Property::Voices => Err(DriverError::UnknownProperty(name.to_string())),
            Property::Voice => {
                let id = value.as_text().ok_or(DriverError::InvalidValue {
                    property: name.to_string(),
                    expected: "a voice identifier",
                })?;
                self.set_voice(id)
            }
            Property::Rate => {
                let rate = number(property, &value)?;
                self.backend.set_rate(rate)
            }
            Property::Volume => {
                let volume = number(property, &value)?;
                self.backend.set_volume(volume)
            }
            Property::Pitch => {
                let pitch = number(property, &value)?;
                if !self.backend.features().pitch {
                    self.warn_pitch();
                    return Ok(());
                }
                match self.backend.set_pitch(pitch) {
                    Err(DriverError::UnsupportedFeature(_)) => {
                        self.warn_pitch();
                        Ok(())
                    }
                    other => other,
                }
            }
        }
    }

    /// Switch voice without disturbing rate and volume
    ///
    /// Some backends reset both when the voice changes.
    fn set_voice(&mut self, id: &str) -> Result<()> {
        let volume = self.backend.volume()?;
        let rate = self.backend.rate()?;

        self.backend.set_voice(id)?;

        self.backend.set_rate(rate)?;
        self.backend.set_volume(volume)?;
        Ok(())
    }

    fn warn_pitch(&self) {
        warn!(
            "Pitch adjustment not supported when using the {} backend",
            self.backend.name()
        );
    }

    /// Called when the engine starts its run loop
    pub fn start_loop(&mut self) {
        debug!("start_loop");
    }

    /// Called when the engine leaves its run loop
    pub fn end_loop(&mut self) {
        debug!("end_loop");
    }

    /// One step of an engine-driven loop
    ///
    /// Backends deliver their callbacks on their own threads, so there is
    /// nothing to pump; the engine is told the driver is free.
    pub fn iterate(&mut self) {
        self.proxy.set_busy(false);
    }

    /// Detach from the backend's events and release it
    pub fn destroy(mut self) -> Result<()> {
        debug!("Destroying driver for {} backend", self.backend.name());
        self.detach()
    }

    fn detach(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        self.detached = true;
        self.backend.set_event_sink(None)
    }
}

impl Drop for SpeechDriver {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            warn!("Failed to detach from backend events: {}", e);
        }
    }
}

fn number(property: Property, value: &PropertyValue) -> Result<f32> {
    value.as_number().ok_or(DriverError::InvalidValue {
        property: property.name().to_string(),
        expected: "a number",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::RecordingProxy;
    use crate::speech::backends::{SilentBackend, SilentHandle};

    fn manual_driver() -> (SpeechDriver, Arc<RecordingProxy>, SilentHandle) {
        let proxy = Arc::new(RecordingProxy::new());
        let (backend, handle) = SilentBackend::manual();
        let driver = SpeechDriver::new(proxy.clone(), Box::new(backend)).unwrap();
        (driver, proxy, handle)
    }

    #[test]
    fn test_default_rate_applied() {
        let (driver, _, _) = manual_driver();
        assert_eq!(
            driver.get_property("rate").unwrap(),
            PropertyValue::Number(DEFAULT_RATE)
        );
    }

    #[test]
    fn test_say_marks_busy_and_notifies() {
        let (mut driver, proxy, handle) = manual_driver();

        driver.say("hello").unwrap();

        assert!(proxy.is_busy());
        assert_eq!(proxy.notifications(), vec![Notification::StartedUtterance]);
        assert_eq!(handle.spoken(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_stop_while_idle_only_cancels() {
        let (mut driver, proxy, handle) = manual_driver();

        driver.stop().unwrap();
        assert!(driver.relay.completed());
        assert_eq!(handle.cancels(), 1);
        assert!(proxy.notifications().is_empty());
    }

    #[test]
    fn test_iterate_clears_busy() {
        let (mut driver, proxy, _) = manual_driver();
        driver.start_loop();
        driver.say("x").unwrap();
        driver.iterate();
        driver.end_loop();
        assert!(!proxy.is_busy());
    }

    #[test]
    fn test_set_voices_rejected() {
        let (mut driver, _, _) = manual_driver();
        assert!(matches!(
            driver.set_property("voices", "silent.fr"),
            Err(DriverError::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_wrong_value_type() {
        let (mut driver, _, _) = manual_driver();
        assert!(matches!(
            driver.set_property("rate", "fast"),
            Err(DriverError::InvalidValue { .. })
        ));
        assert!(matches!(
            driver.set_property("voice", 3.0_f32),
            Err(DriverError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_drop_detaches_sink() {
        let (driver, _, handle) = manual_driver();
        assert!(handle.has_sink());
        drop(driver);
        assert!(!handle.has_sink());
    }

    /// Backend whose submissions always fail
    struct BrokenBackend;

    impl SpeechBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn features(&self) -> BackendFeatures {
            BackendFeatures {
                save_to_file: true,
                ..BackendFeatures::default()
            }
        }

        fn voices(&self) -> Result<Vec<crate::voice::VoiceAttributes>> {
            Ok(Vec::new())
        }

        fn speak(&mut self, _text: &str) -> Result<()> {
            Err(DriverError::Backend("audio device gone".to_string()))
        }

        fn speak_to_file(&mut self, _text: &str, _path: &Path) -> Result<()> {
            Err(DriverError::Backend("read-only filesystem".to_string()))
        }

        fn cancel(&mut self) -> Result<()> {
            Ok(())
        }

        fn rate(&self) -> Result<f32> {
            Ok(DEFAULT_RATE)
        }

        fn set_rate(&mut self, _rate: f32) -> Result<()> {
            Ok(())
        }

        fn volume(&self) -> Result<f32> {
            Ok(1.0)
        }

        fn set_volume(&mut self, _volume: f32) -> Result<()> {
            Ok(())
        }

        fn voice(&self) -> Result<Option<String>> {
            Ok(None)
        }

        fn set_voice(&mut self, _id: &str) -> Result<()> {
            Ok(())
        }

        fn set_event_sink(&mut self, _sink: Option<crate::speech::EventSink>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rejected_utterance_is_closed() {
        let proxy = Arc::new(RecordingProxy::new());
        let mut driver = SpeechDriver::new(proxy.clone(), Box::new(BrokenBackend)).unwrap();

        assert!(driver.say("x").is_err());
        assert!(driver.save_to_file("x", "/tmp/x.wav").is_err());

        let finished = Notification::FinishedUtterance { completed: false };
        assert_eq!(
            proxy.notifications(),
            vec![
                Notification::StartedUtterance,
                finished.clone(),
                Notification::StartedUtterance,
                finished,
            ]
        );
        assert!(!proxy.is_busy());
    }

    #[test]
    fn test_build_driver_by_name() {
        let proxy = Arc::new(RecordingProxy::new());
        let driver = build_driver(proxy, Some("silent")).unwrap();
        assert_eq!(driver.backend_name(), "silent");
        assert!(build_driver(Arc::new(RecordingProxy::new()), Some("nope")).is_err());
    }
}
