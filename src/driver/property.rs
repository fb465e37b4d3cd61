//! Driver properties and their values

use crate::voice::Voice;
use crate::DriverError;
use std::fmt;
use std::str::FromStr;

/// Properties reachable through `get_property`/`set_property`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Installed voices (read-only)
    Voices,
    /// Identifier of the active voice
    Voice,
    /// Words per minute
    Rate,
    /// 0.0 to 1.0
    Volume,
    /// 0 to 100, 50 is the backend's normal pitch
    Pitch,
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::Voices => "voices",
            Property::Voice => "voice",
            Property::Rate => "rate",
            Property::Volume => "volume",
            Property::Pitch => "pitch",
        }
    }
}

impl FromStr for Property {
    type Err = DriverError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "voices" => Ok(Property::Voices),
            "voice" => Ok(Property::Voice),
            "rate" => Ok(Property::Rate),
            "volume" => Ok(Property::Volume),
            "pitch" => Ok(Property::Pitch),
            other => Err(DriverError::UnknownProperty(other.to_string())),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value read from or written to a property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Voices(Vec<Voice>),
    Number(f32),
    Text(String),
    /// No value, e.g. pitch on a backend without pitch support
    None,
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_voices(&self) -> Option<&[Voice]> {
        match self {
            PropertyValue::Voices(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PropertyValue::None)
    }
}

impl From<f32> for PropertyValue {
    fn from(n: f32) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(PropertyValue::None, PropertyValue::Text)
    }
}

impl From<Vec<Voice>> for PropertyValue {
    fn from(v: Vec<Voice>) -> Self {
        PropertyValue::Voices(v)
    }
}
