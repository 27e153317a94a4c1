//! The gateway's own sensors: ultrasonic distance (pump input), photoresistor
//! (lighting input), soil probes and temperature/humidity.
//!
//! Peripheral drivers live outside this crate. With the `sim` feature,
//! [`SimSensors`] stands in for them, producing coherent readings instead of
//! noise. A build without any sensor backend refuses to start.

use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalReadings {
    /// Ultrasonic echo distance to the water surface.
    pub distance: i32,
    /// Raw photoresistor ADC reading.
    pub light_raw: u16,
    pub soil_capacitive: i32,
    pub soil_resistive: i32,
    pub temperature: f32,
    pub humidity: f32,
}

pub trait LocalSensors: Send {
    /// Take one fresh sample of every local sensor.
    fn sample(&mut self) -> LocalReadings;
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Open the sensor backend compiled into this build.
#[cfg(feature = "sim")]
pub fn open(day_samples: u64, light_full_scale: u16) -> Result<SimSensors> {
    if cfg!(feature = "gpio") {
        tracing::warn!(
            "SIMULATED local sensors are driving the REAL pump and lighting relays; \
             build without the `sim` feature once a sensor driver is available"
        );
    } else {
        tracing::info!("local sensors: simulator");
    }
    Ok(SimSensors::new(fastrand::u64(..), day_samples, light_full_scale))
}

/// No sensor backend compiled in. Uninhabited: [`open`] never returns one.
#[cfg(not(feature = "sim"))]
pub enum NoSensors {}

#[cfg(not(feature = "sim"))]
impl LocalSensors for NoSensors {
    fn sample(&mut self) -> LocalReadings {
        match *self {}
    }
}

#[cfg(not(feature = "sim"))]
pub fn open(_day_samples: u64, _light_full_scale: u16) -> Result<NoSensors> {
    anyhow::bail!(
        "no local sensor backend in this build; relays would run blind. \
         Enable the `sim` feature for development"
    )
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Random walk with mean reversion for one channel.
#[cfg(feature = "sim")]
struct Walk {
    value: f64,
    center: f64,
    sigma: f64,
    reversion: f64,
    min: f64,
    max: f64,
}

#[cfg(feature = "sim")]
impl Walk {
    fn step(&mut self, rng: &mut fastrand::Rng) -> f64 {
        let pull = self.reversion * (self.center - self.value);
        self.value = (self.value + pull + gaussian(rng, 0.0, self.sigma)).clamp(self.min, self.max);
        self.value
    }
}

/// Irwin-Hall approximation of N(mean, sigma).
#[cfg(feature = "sim")]
fn gaussian(rng: &mut fastrand::Rng, mean: f64, sigma: f64) -> f64 {
    let sum: f64 = (0..12).map(|_| rng.f64()).sum();
    mean + sigma * (sum - 6.0)
}

/// Stateful simulator for the local sensor set.
///
/// Light follows a day/night cycle of `day_samples` samples, so with the
/// default 120 s cycle a period of 720 samples is one real day.
#[cfg(feature = "sim")]
pub struct SimSensors {
    rng: fastrand::Rng,
    step: u64,
    day_samples: u64,
    light_full_scale: u16,
    distance: Walk,
    soil_cap: Walk,
    soil_res: Walk,
    temperature: Walk,
    humidity: Walk,
}

#[cfg(feature = "sim")]
impl SimSensors {
    pub fn new(seed: u64, day_samples: u64, light_full_scale: u16) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            step: 0,
            day_samples: day_samples.max(1),
            light_full_scale,
            distance: Walk {
                value: 14.0,
                center: 12.0,
                sigma: 1.5,
                reversion: 0.05,
                min: 2.0,
                max: 400.0,
            },
            soil_cap: Walk {
                value: 1900.0,
                center: 1900.0,
                sigma: 40.0,
                reversion: 0.05,
                min: 0.0,
                max: 4095.0,
            },
            soil_res: Walk {
                value: 2200.0,
                center: 2200.0,
                sigma: 60.0,
                reversion: 0.05,
                min: 0.0,
                max: 4095.0,
            },
            temperature: Walk {
                value: 22.0,
                center: 22.0,
                sigma: 0.3,
                reversion: 0.1,
                min: -10.0,
                max: 50.0,
            },
            humidity: Walk {
                value: 55.0,
                center: 55.0,
                sigma: 1.0,
                reversion: 0.1,
                min: 0.0,
                max: 100.0,
            },
        }
    }

    /// Daylight fraction in 0..=1: a clipped sine, dark half the period.
    fn daylight(&self) -> f64 {
        let phase = (self.step % self.day_samples) as f64 / self.day_samples as f64;
        (phase * std::f64::consts::TAU).sin().max(0.0)
    }
}

#[cfg(feature = "sim")]
impl LocalSensors for SimSensors {
    fn sample(&mut self) -> LocalReadings {
        self.step += 1;

        let full = self.light_full_scale as f64;
        let light = (self.daylight() * full * 0.9 + gaussian(&mut self.rng, 0.0, full * 0.01))
            .clamp(0.0, full);

        LocalReadings {
            distance: self.distance.step(&mut self.rng).round() as i32,
            light_raw: light.round() as u16,
            soil_capacitive: self.soil_cap.step(&mut self.rng).round() as i32,
            soil_resistive: self.soil_res.step(&mut self.rng).round() as i32,
            temperature: self.temperature.step(&mut self.rng) as f32,
            humidity: self.humidity.step(&mut self.rng) as f32,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "sim"))]
    #[test]
    fn open_without_backend_refuses() {
        let err = open(720, 4095).err().unwrap();
        assert!(err.to_string().contains("no local sensor backend"));
    }

    #[cfg(feature = "sim")]
    #[test]
    fn open_returns_working_simulator() {
        let mut sim = open(720, 4095).unwrap();
        assert!(sim.sample().light_raw <= 4095);
    }

    #[cfg(feature = "sim")]
    #[test]
    fn readings_stay_in_physical_ranges() {
        let mut sim = SimSensors::new(7, 720, 4095);
        for _ in 0..2000 {
            let r = sim.sample();
            assert!((2..=400).contains(&r.distance), "distance {}", r.distance);
            assert!(r.light_raw <= 4095);
            assert!((0..=4095).contains(&r.soil_capacitive));
            assert!((0..=4095).contains(&r.soil_resistive));
            assert!((0.0..=100.0).contains(&r.humidity));
        }
    }

    #[cfg(feature = "sim")]
    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimSensors::new(42, 720, 4095);
        let mut b = SimSensors::new(42, 720, 4095);
        for _ in 0..50 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[cfg(feature = "sim")]
    #[test]
    fn night_is_dark() {
        // Second half of the period is night.
        let mut sim = SimSensors::new(1, 100, 4095);
        let lights: Vec<u16> = (0..100).map(|_| sim.sample().light_raw).collect();
        let night_max = lights[55..95].iter().copied().max().unwrap();
        let noon = lights[24];
        assert!(night_max < 200, "night light {night_max}");
        assert!(noon > 3000, "noon light {noon}");
    }

    #[cfg(feature = "sim")]
    #[test]
    fn consecutive_samples_are_coherent() {
        let mut sim = SimSensors::new(3, 720, 4095);
        let mut prev = sim.sample();
        for _ in 0..500 {
            let r = sim.sample();
            assert!((r.temperature - prev.temperature).abs() < 3.0);
            prev = r;
        }
    }
}
