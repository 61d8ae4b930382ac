use std::collections::HashMap;

use errors::AmfError;

pub mod amf0;
pub mod errors;

pub use amf0::{Value, bool, null, number, object, string};

/// Object encoding negotiated during connect. Only AMF0 bodies are encoded
/// or decoded, the AMF3 tag survives as a wire-level capability number.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    #[default]
    Amf0 = 0,
    Amf3 = 3,
}

impl TryFrom<f64> for Version {
    type Error = AmfError;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        match value {
            v if v == 0.0 => Ok(Version::Amf0),
            v if v == 3.0 => Ok(Version::Amf3),
            encoding => Err(AmfError::UnknownObjectEncoding { encoding }),
        }
    }
}

pub trait AmfComplexObject {
    fn extract_bool_field(&self, key: &str) -> Option<bool>;
    fn extract_number_field(&self, key: &str) -> Option<f64>;
    fn extract_string_field(&self, key: &str) -> Option<String>;
    fn extract_array_field(&self, key: &str) -> Option<Box<dyn Iterator<Item = Value>>>;
    fn extract_object_field(&self, key: &str) -> Option<Box<dyn Iterator<Item = (String, Value)>>>;
}

impl AmfComplexObject for HashMap<String, Value> {
    fn extract_bool_field(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(value) => value.try_as_bool(),
            None => None,
        }
    }

    fn extract_number_field(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(value) => value.try_as_f64(),
            None => None,
        }
    }

    fn extract_string_field(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(value) => value.try_as_str().map(|s| s.to_string()),
            None => None,
        }
    }

    fn extract_array_field(&self, key: &str) -> Option<Box<dyn Iterator<Item = Value>>> {
        match self.get(key).cloned() {
            Some(v) => v.try_into_values().map_or_else(|_| None, |v| Some(v)),
            None => None,
        }
    }

    fn extract_object_field(&self, key: &str) -> Option<Box<dyn Iterator<Item = (String, Value)>>> {
        match self.get(key).cloned() {
            Some(v) => v.try_into_pairs().map_or_else(|_| None, |v| Some(v)),
            None => None,
        }
    }
}

impl AmfComplexObject for Vec<(String, Value)> {
    fn extract_bool_field(&self, key: &str) -> Option<bool> {
        self.iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.try_as_bool())
    }

    fn extract_number_field(&self, key: &str) -> Option<f64> {
        self.iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.try_as_f64())
    }

    fn extract_string_field(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.try_as_str().map(|s| s.to_string()))
    }

    fn extract_array_field(&self, key: &str) -> Option<Box<dyn Iterator<Item = Value>>> {
        self.iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.clone().try_into_values().ok())
    }

    fn extract_object_field(&self, key: &str) -> Option<Box<dyn Iterator<Item = (String, Value)>>> {
        self.iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.clone().try_into_pairs().ok())
    }
}
