//! saydriver - speech driver adapter
//!
//! Exposes a uniform speech interface (`say`, `stop`, properties, voice
//! enumeration, saving to file) on top of platform speech backends, and
//! reports utterance progress back to the calling engine.

pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod proxy;
pub mod speech;
pub mod voice;

pub use driver::{build_driver, Property, PropertyValue, SpeechDriver};
pub use error::{DriverError, Result};
pub use proxy::{EngineProxy, Notification};
pub use voice::Voice;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "saydriver";
