//! Voice records
//!
//! Backends describe their voices as loose attribute records whose keys
//! differ between platform versions. The driver normalizes each record
//! into a [`Voice`] before handing it to the engine.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute key holding the voice identifier
pub const KEY_IDENTIFIER: &str = "VoiceIdentifier";
/// Attribute key holding the display name
pub const KEY_NAME: &str = "VoiceName";
/// Locale key used by newer backends
pub const KEY_LOCALE: &str = "VoiceLocaleIdentifier";
/// Locale key used by older backends
pub const KEY_LANGUAGE: &str = "VoiceLanguage";
/// Attribute key holding the gender tag
pub const KEY_GENDER: &str = "VoiceGender";
/// Attribute key holding the age
pub const KEY_AGE: &str = "VoiceAge";

/// A voice offered by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Backend identifier, used with `set_property("voice", ...)`
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Supported language tags, never empty
    pub languages: Vec<String>,
    /// Gender tag as reported by the backend
    pub gender: Option<String>,
    pub age: Option<u32>,
}

/// Attribute record describing one backend voice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceAttributes {
    attrs: HashMap<String, String>,
}

impl VoiceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Locale of the voice, trying the primary key before the fallback key
    pub fn locale(&self) -> Option<&str> {
        self.get(KEY_LOCALE)
            .or_else(|| self.get(KEY_LANGUAGE))
            .filter(|lang| !lang.is_empty())
    }
}

impl Voice {
    /// Normalize a backend attribute record
    ///
    /// Returns `None` when the record has no identifier or no locale.
    /// A missing name falls back to the identifier.
    pub fn from_attributes(attrs: &VoiceAttributes) -> Option<Self> {
        let id = attrs.get(KEY_IDENTIFIER).filter(|id| !id.is_empty())?;
        let lang = attrs.locale()?;

        let name = attrs
            .get(KEY_NAME)
            .filter(|n| !n.is_empty())
            .unwrap_or(id)
            .to_string();

        Some(Self {
            id: id.to_string(),
            name,
            languages: vec![lang.to_string()],
            gender: attrs.get(KEY_GENDER).map(str::to_string),
            age: attrs.get(KEY_AGE).and_then(|a| a.trim().parse().ok()),
        })
    }
}

/// Convert a full voice listing, dropping unusable records
pub fn voices_from_attributes(records: &[VoiceAttributes]) -> Vec<Voice> {
    records
        .iter()
        .filter_map(|attrs| {
            let voice = Voice::from_attributes(attrs);
            if voice.is_none() {
                warn!("Skipping voice record without identifier or locale: {:?}", attrs);
            }
            voice
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> VoiceAttributes {
        VoiceAttributes::new()
            .with(KEY_IDENTIFIER, "com.example.alex")
            .with(KEY_NAME, "Alex")
            .with(KEY_GENDER, "VoiceGenderMale")
            .with(KEY_AGE, "35")
    }

    #[test]
    fn test_primary_locale_key() {
        let attrs = record()
            .with(KEY_LOCALE, "en_US")
            .with(KEY_LANGUAGE, "en");
        let voice = Voice::from_attributes(&attrs).unwrap();

        assert_eq!(voice.id, "com.example.alex");
        assert_eq!(voice.name, "Alex");
        assert_eq!(voice.languages, vec!["en_US".to_string()]);
        assert_eq!(voice.gender.as_deref(), Some("VoiceGenderMale"));
        assert_eq!(voice.age, Some(35));
    }

    #[test]
    fn test_fallback_locale_key() {
        let attrs = record().with(KEY_LANGUAGE, "en");
        let voice = Voice::from_attributes(&attrs).unwrap();
        assert_eq!(voice.languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_missing_locale_rejected() {
        assert!(Voice::from_attributes(&record()).is_none());
    }

    #[test]
    fn test_missing_identifier_rejected() {
        let attrs = VoiceAttributes::new()
            .with(KEY_NAME, "Nameless")
            .with(KEY_LOCALE, "fr_FR");
        assert!(Voice::from_attributes(&attrs).is_none());
    }

    #[test]
    fn test_name_defaults_to_identifier() {
        let attrs = VoiceAttributes::new()
            .with(KEY_IDENTIFIER, "de")
            .with(KEY_LANGUAGE, "de");
        let voice = Voice::from_attributes(&attrs).unwrap();
        assert_eq!(voice.name, "de");
        assert_eq!(voice.gender, None);
        assert_eq!(voice.age, None);
    }

    #[test]
    fn test_listing_drops_bad_records() {
        let records = vec![
            record().with(KEY_LOCALE, "en_US"),
            record(),
            VoiceAttributes::new().with(KEY_LANGUAGE, "it"),
        ];
        let voices = voices_from_attributes(&records);
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].id, "com.example.alex");
    }
}
