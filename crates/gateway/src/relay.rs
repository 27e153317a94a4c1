//! Relay outputs for the pump and grow lights. The `gpio` feature gates the
//! real rppal driver; without it, a mock board logs state changes.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relay {
    Pump,
    Lighting,
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pump => write!(f, "pump"),
            Self::Lighting => write!(f, "lighting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Real GPIO relay board (requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub struct RelayBoard {
    pins: HashMap<Relay, OutputPin>,
    active_low: bool,
}

#[cfg(feature = "gpio")]
impl RelayBoard {
    pub fn new(relay_to_gpio: &[(Relay, u8)], active_low: bool) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = HashMap::new();

        for (relay, pin_num) in relay_to_gpio {
            let mut pin = gpio.get(*pin_num)?.into_output();

            // Fail-safe: OFF at startup
            if active_low {
                pin.set_high();
            } else {
                pin.set_low();
            }

            pins.insert(*relay, pin);
        }

        Ok(Self { pins, active_low })
    }

    pub fn set(&mut self, relay: Relay, on: bool) {
        if let Some(pin) = self.pins.get_mut(&relay) {
            if on != self.active_low {
                pin.set_high()
            } else {
                pin.set_low()
            }
            tracing::debug!(%relay, on, "relay set");
        } else {
            tracing::warn!(%relay, "relay not wired");
        }
    }

    pub fn all_off(&mut self) {
        let relays: Vec<Relay> = self.pins.keys().copied().collect();
        for r in relays {
            self.set(r, false);
        }
    }
}

// ---------------------------------------------------------------------------
// Mock relay board (no hardware, logs state)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub struct RelayBoard {
    pub(crate) outputs: HashMap<Relay, bool>, // relay -> on/off
    active_low: bool,
}

#[cfg(not(feature = "gpio"))]
impl RelayBoard {
    pub fn new(relay_to_gpio: &[(Relay, u8)], active_low: bool) -> Result<Self> {
        let mut outputs = HashMap::new();
        for (relay, pin_num) in relay_to_gpio {
            tracing::info!(%relay, gpio = pin_num, "[mock-gpio] relay registered (not wired)");
            outputs.insert(*relay, false);
        }
        Ok(Self {
            outputs,
            active_low,
        })
    }

    pub fn set(&mut self, relay: Relay, on: bool) {
        if let Some(state) = self.outputs.get_mut(&relay) {
            *state = on;
            tracing::debug!(%relay, on, high = on != self.active_low, "[mock-gpio] relay set");
        } else {
            tracing::warn!(%relay, "[mock-gpio] relay not wired");
        }
    }

    /// Electrical level the pin would be driven to.
    #[cfg(test)]
    pub fn is_high(&self, relay: Relay) -> bool {
        self.outputs
            .get(&relay)
            .map(|on| *on != self.active_low)
            .unwrap_or(self.active_low)
    }

    pub fn all_off(&mut self) {
        let relays: Vec<Relay> = self.outputs.keys().copied().collect();
        for r in relays {
            self.set(r, false);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
