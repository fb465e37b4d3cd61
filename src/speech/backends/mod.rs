//! Backend implementations

// Platform TTS through the tts crate
pub mod native;

// espeak-ng subprocess, also renders to files
pub mod espeak;

// In-memory backend without audio
pub mod silent;

pub use espeak::EspeakBackend;
pub use native::NativeBackend;
pub use silent::{SilentBackend, SilentHandle};
