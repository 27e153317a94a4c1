//! Threshold controllers for the pump and grow lights.
//!
//! Each cycle takes one fresh local sample, compares it against a fixed
//! threshold and drives the relay. State is recomputed from scratch every
//! time: no hysteresis, no memory of the previous decision.

use serde::Serialize;
use tracing::info;

use crate::relay::{Relay, RelayBoard};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorState<T> {
    pub on: bool,
    pub sample: T,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Pump runs while the ultrasonic distance is below this.
    pub pump_min_distance: i32,
    /// Lights run while ambient light (0–100) is below this.
    pub light_min_percent: f32,
    /// Full-scale raw reading of the photoresistor ADC.
    pub light_full_scale: u16,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pump_min_distance: 10,
            light_min_percent: 20.0,
            light_full_scale: 4095,
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

pub fn pump_decision(distance: i32, min_distance: i32) -> ActuatorState<i32> {
    ActuatorState {
        on: distance < min_distance,
        sample: distance,
    }
}

pub fn lighting_decision(light_percent: f32, min_percent: f32) -> ActuatorState<f32> {
    ActuatorState {
        on: light_percent < min_percent,
        sample: light_percent,
    }
}

/// Scale a raw photoresistor reading to 0–100.
pub fn normalize_light(raw: u16, full_scale: u16) -> f32 {
    if full_scale == 0 {
        return 0.0;
    }
    (raw as f32 / full_scale as f32) * 100.0
}

// ---------------------------------------------------------------------------
// Controllers
// ---------------------------------------------------------------------------

pub fn control_pump(relays: &mut RelayBoard, distance: i32, t: &Thresholds) -> ActuatorState<i32> {
    let state = pump_decision(distance, t.pump_min_distance);
    relays.set(Relay::Pump, state.on);
    info!(
        distance,
        min_distance = t.pump_min_distance,
        "pump {}",
        if state.on { "on" } else { "off" }
    );
    state
}

pub fn control_lighting(
    relays: &mut RelayBoard,
    light_raw: u16,
    t: &Thresholds,
) -> ActuatorState<f32> {
    let light = normalize_light(light_raw, t.light_full_scale);
    let state = lighting_decision(light, t.light_min_percent);
    relays.set(Relay::Lighting, state.on);
    info!(
        light = format!("{light:.1}"),
        min_percent = t.light_min_percent,
        "lighting {}",
        if state.on { "on" } else { "off" }
    );
    state
}

// ===========================================================================
// Tests
// ===========================================================================
