//! Child payload decoding and backend envelope encoding.
//!
//! Inbound (any transport):
//!
//! ```text
//! {"id":"n1","temp":21.5,"hum":40.0,"luz":55.0,"hum_cap":1800,"hum_res":2100,"nivel_agua":12}
//! ```
//!
//! All seven fields are required. A missing or mistyped field rejects the
//! whole payload; there are no partial readings.

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use thiserror::Error;

use crate::identity::GatewayId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A decoded child reading. `water_level` is the child's own `nivel_agua`;
/// the gateway's local ultrasonic distance never ends up here.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildReading {
    pub child_id: String,
    pub temperature: f32,
    pub humidity: f32,
    pub ambient_light: f32,
    pub soil_humidity_capacitive: i32,
    pub soil_humidity_resistive: i32,
    pub water_level: i32,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not well-formed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("payload field missing or invalid: {0}")]
    InvalidField(#[source] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct InboundPayload {
    id: String,
    temp: f32,
    hum: f32,
    luz: f32,
    hum_cap: i32,
    hum_res: i32,
    nivel_agua: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorData {
    pub temp: f32,
    pub hum: f32,
    pub luz: f32,
    pub hum_cap: i32,
    pub hum_res: i32,
    pub nivel_agua: i32,
}

/// The record forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryEnvelope {
    pub child_id: String,
    pub sensor_data: SensorData,
    pub gateway_id: String,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

pub fn decode(raw: &[u8]) -> Result<ChildReading, DecodeError> {
    let p: InboundPayload = serde_json::from_slice(raw).map_err(|e| match e.classify() {
        Category::Data => DecodeError::InvalidField(e),
        Category::Syntax | Category::Eof | Category::Io => DecodeError::Malformed(e),
    })?;

    Ok(ChildReading {
        child_id: p.id,
        temperature: p.temp,
        humidity: p.hum,
        ambient_light: p.luz,
        soil_humidity_capacitive: p.hum_cap,
        soil_humidity_resistive: p.hum_res,
        water_level: p.nivel_agua,
    })
}

/// Serialize a reading in the inbound child format.
#[cfg(test)]
pub fn encode_inbound(reading: &ChildReading) -> Vec<u8> {
    let p = InboundPayload {
        id: reading.child_id.clone(),
        temp: reading.temperature,
        hum: reading.humidity,
        luz: reading.ambient_light,
        hum_cap: reading.soil_humidity_capacitive,
        hum_res: reading.soil_humidity_resistive,
        nivel_agua: reading.water_level,
    };
    serde_json::to_vec(&p).expect("inbound payload has only string keys")
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

impl DeliveryEnvelope {
    pub fn new(reading: &ChildReading, gateway_id: &GatewayId, timestamp_ms: u64) -> Self {
        Self {
            child_id: reading.child_id.clone(),
            sensor_data: SensorData {
                temp: reading.temperature,
                hum: reading.humidity,
                luz: reading.ambient_light,
                hum_cap: reading.soil_humidity_capacitive,
                hum_res: reading.soil_humidity_resistive,
                nivel_agua: reading.water_level,
            },
            gateway_id: gateway_id.as_str().to_string(),
            timestamp: timestamp_ms,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("envelope has only string keys")
    }
}

// ===========================================================================
// Tests
// ===========================================================================
