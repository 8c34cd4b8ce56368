//! ==============================================================================
//! domain.rs - sensor reading and incoming update types
//! ==============================================================================
//!
//! purpose:
//!     the one entity this hub knows about: the latest soil reading.
//!     the device posts partial updates; a field it leaves out keeps its
//!     last known value ("sticky" merge), a field it sends as null is cleared.
//!
//! relationships:
//!     - used by: ingest.rs (merge), history.rs / firebase.rs (snapshots)
//!     - used by: app.rs (request parsing, json responses)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// format of the reading timestamp, server local time
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// alternate key names some firmware builds send, mapped to canonical names
const SYNONYMS: &[(&str, &str)] = &[("temp", "temperature"), ("pH", "ph")];

/// latest known soil reading
///
/// every key is always serialized; unset values are `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReading {
    /// soil temperature in celsius
    pub temperature: Option<f64>,
    /// volumetric soil moisture (%)
    pub soil_moisture: Option<f64>,
    pub ph: Option<f64>,
    /// nitrogen (mg/kg)
    pub nitrogen: Option<f64>,
    /// phosphorus (mg/kg)
    pub phosphorus: Option<f64>,
    /// potassium (mg/kg)
    pub potassium: Option<f64>,
    /// server time of the last merge, "YYYY-MM-DD HH:MM:SS"
    #[serde(rename = "datetime")]
    pub timestamp: Option<String>,
}

impl SensorReading {
    /// apply an update on top of this reading
    ///
    /// fields the update does not mention keep their current value.
    pub fn merge(&self, update: &SensorUpdate, timestamp: String) -> SensorReading {
        SensorReading {
            temperature: update.temperature.apply(self.temperature),
            soil_moisture: update.soil_moisture.apply(self.soil_moisture),
            ph: update.ph.apply(self.ph),
            nitrogen: update.nitrogen.apply(self.nitrogen),
            phosphorus: update.phosphorus.apply(self.phosphorus),
            potassium: update.potassium.apply(self.potassium),
            timestamp: Some(timestamp),
        }
    }
}

/// current server time in the reading timestamp format
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// what an update says about one field
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum FieldUpdate {
    /// key absent: keep the stored value
    #[default]
    Keep,
    /// key present with `null`
    Clear,
    Set(f64),
}

impl FieldUpdate {
    fn apply(self, current: Option<f64>) -> Option<f64> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Clear => None,
            FieldUpdate::Set(value) => Some(value),
        }
    }
}

/// a parsed ingestion payload, keys already normalized
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorUpdate {
    pub temperature: FieldUpdate,
    pub soil_moisture: FieldUpdate,
    pub ph: FieldUpdate,
    pub nitrogen: FieldUpdate,
    pub phosphorus: FieldUpdate,
    pub potassium: FieldUpdate,
}

/// why an ingestion body was refused
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("request body is empty")]
    Empty,

    #[error("request body is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request body must be a json object")]
    NotAnObject,

    #[error("field '{0}' must be a number or null")]
    NotNumeric(&'static str),
}

impl SensorUpdate {
    /// parse a raw request body
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PayloadError::Empty);
        }
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    /// build an update from an already decoded json value
    ///
    /// a synonym replaces its canonical key when both are sent.
    /// unknown keys are ignored.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let Value::Object(mut map) = value else {
            return Err(PayloadError::NotAnObject);
        };

        for (alias, canonical) in SYNONYMS {
            if let Some(v) = map.remove(*alias) {
                map.insert((*canonical).to_string(), v);
            }
        }

        Ok(Self {
            temperature: field(&map, "temperature")?,
            soil_moisture: field(&map, "soil_moisture")?,
            ph: field(&map, "ph")?,
            nitrogen: field(&map, "nitrogen")?,
            phosphorus: field(&map, "phosphorus")?,
            potassium: field(&map, "potassium")?,
        })
    }
}

fn field(map: &Map<String, Value>, key: &'static str) -> Result<FieldUpdate, PayloadError> {
    match map.get(key) {
        None => Ok(FieldUpdate::Keep),
        Some(Value::Null) => Ok(FieldUpdate::Clear),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(FieldUpdate::Set)
            .ok_or(PayloadError::NotNumeric(key)),
        Some(_) => Err(PayloadError::NotNumeric(key)),
    }
}
