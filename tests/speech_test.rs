//! Integration tests for the platform backends
//!
//! Real speech backends may be missing in CI or headless environments;
//! those tests report and skip instead of failing.

use saydriver::proxy::RecordingProxy;
use saydriver::speech::create_backend;
use saydriver::{build_driver, SpeechDriver};
use std::sync::Arc;

fn try_driver(backend: &str) -> Option<SpeechDriver> {
    match build_driver(Arc::new(RecordingProxy::new()), Some(backend)) {
        Ok(driver) => Some(driver),
        Err(e) => {
            println!("⚠ {} backend not available (may be expected): {}", backend, e);
            None
        }
    }
}

#[test]
fn test_create_backends() {
    for name in ["native", "espeak"] {
        match create_backend(name) {
            Ok(backend) => println!("✓ {} backend: {:?}", name, backend.features()),
            Err(e) => println!("⚠ {} backend creation failed (may be expected): {}", name, e),
        }
    }
}

#[test]
fn test_espeak_properties() {
    if let Some(mut driver) = try_driver("espeak") {
        driver.set_property("rate", 220.0_f32).unwrap();
        driver.set_property("volume", 0.5_f32).unwrap();
        driver.set_property("pitch", 40.0_f32).unwrap();

        assert_eq!(driver.get_property("rate").unwrap().as_number(), Some(220.0));
        assert_eq!(driver.get_property("volume").unwrap().as_number(), Some(0.5));
        assert_eq!(driver.get_property("pitch").unwrap().as_number(), Some(40.0));

        for voice in driver.voices().unwrap() {
            assert!(!voice.id.is_empty());
            assert!(!voice.languages.is_empty());
        }
        driver.destroy().unwrap();
    }
}

#[test]
fn test_native_voices_are_normalized() {
    if let Some(driver) = try_driver("native") {
        match driver.voices() {
            Ok(voices) => {
                for voice in voices {
                    assert!(!voice.id.is_empty());
                    assert!(!voice.languages.is_empty());
                }
            }
            Err(e) => println!("⚠ Voice listing failed (may be expected): {}", e),
        }
    }
}

#[test]
fn test_native_rate_and_volume_read_back_exactly() {
    if let Some(mut driver) = try_driver("native") {
        for rate in [150.0_f32, 137.0, 333.0] {
            driver.set_property("rate", rate).unwrap();
            assert_eq!(driver.get_property("rate").unwrap().as_number(), Some(rate));
        }

        driver.set_property("volume", 0.333_f32).unwrap();
        assert_eq!(driver.get_property("volume").unwrap().as_number(), Some(0.333));

        // Values survive a voice change
        if let Some(voice) = driver.voices().ok().and_then(|v| v.into_iter().next()) {
            driver.set_property("voice", voice.id.as_str()).unwrap();
            assert_eq!(driver.get_property("rate").unwrap().as_number(), Some(333.0));
            assert_eq!(driver.get_property("volume").unwrap().as_number(), Some(0.333));
        }
        driver.destroy().unwrap();
    }
}
