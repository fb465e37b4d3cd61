//! Speech backends

pub mod backend;
pub mod backends;

pub use backend::{
    create_backend, default_backend_name, BackendEvent, BackendFeatures, EventSink,
    SpeechBackend, BACKEND_NAMES,
};
