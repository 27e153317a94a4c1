//! TOML config file loading and validation. Every value has a default, so an
//! empty or missing file yields a working gateway.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::clock::RetryPolicy;
use crate::controller::Thresholds;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub network: NetworkConfig,
    pub short_range: ShortRangeConfig,
    pub long_range: LongRangeConfig,
    pub relays: RelayConfig,
    pub thresholds: ThresholdConfig,
    pub scheduler: SchedulerConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface whose association gates delivery and whose MAC names the gateway.
    pub interface: String,
    pub gateway_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShortRangeConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub topic_prefix: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LongRangeConfig {
    pub bind: SocketAddr,
    pub init_attempts: u32,
    pub init_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub pump_pin: i64,
    pub lighting_pin: i64,
    pub active_low: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub pump_min_distance: i32,
    pub light_min_percent: f32,
    pub light_full_scale: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cycle_sec: u64,
    /// Samples per simulated day for the sensor simulator.
    pub sim_day_cycles: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub port: u16,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/api".to_string(),
            max_attempts: 5,
            retry_delay_ms: 2000,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            gateway_id: None,
        }
    }
}

impl Default for ShortRangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 1883,
            topic_prefix: "ble".to_string(),
            client_id: "irrigation-gateway".to_string(),
            username: None,
            password: None,
        }
    }
}

impl Default for LongRangeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 1700)),
            init_attempts: 5,
            init_retry_delay_ms: 1000,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pump_pin: 26,
            lighting_pin: 25,
            active_low: false,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let t = Thresholds::default();
        Self {
            pump_min_distance: t.pump_min_distance,
            light_min_percent: t.light_min_percent,
            light_full_scale: t.light_full_scale,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_sec: 120,
            sim_day_cycles: 720,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

// ---------------------------------------------------------------------------
// GPIO whitelist
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM.
const VALID_GPIO_PINS: &[i64] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

// ---------------------------------------------------------------------------
// Derived settings
// ---------------------------------------------------------------------------

impl BackendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl LongRangeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.init_attempts,
            delay: Duration::from_millis(self.init_retry_delay_ms),
        }
    }
}

impl RelayConfig {
    /// Pins as validated BCM numbers.
    pub fn pins(&self) -> (u8, u8) {
        (self.pump_pin as u8, self.lighting_pin as u8)
    }
}

impl ThresholdConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            pump_min_distance: self.pump_min_distance,
            light_min_percent: self.light_min_percent,
            light_full_scale: self.light_full_scale,
        }
    }
}

impl SchedulerConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_sec)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate every field. Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // ── Backend ─────────────────────────────────────────
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!(
                "backend.url '{url}' must start with http:// or https://"
            ));
        }
        if self.backend.max_attempts == 0 {
            errors.push("backend.max_attempts must be at least 1".to_string());
        }

        // ── Network ─────────────────────────────────────────
        if self.network.interface.trim().is_empty() {
            errors.push("network.interface is empty".to_string());
        }

        // ── Short-range bridge ──────────────────────────────
        if self.short_range.enabled {
            if self.short_range.host.trim().is_empty() {
                errors.push("short_range.host is empty".to_string());
            }
            let prefix = &self.short_range.topic_prefix;
            if prefix.trim().is_empty() || prefix.contains(['+', '#']) {
                errors.push(format!(
                    "short_range.topic_prefix '{prefix}' must be non-empty without wildcards"
                ));
            }
            if self.short_range.client_id.trim().is_empty() {
                errors.push("short_range.client_id is empty".to_string());
            }
        }

        // ── Long-range radio ────────────────────────────────
        if self.long_range.init_attempts == 0 {
            errors.push("long_range.init_attempts must be at least 1".to_string());
        }

        // ── Relays ──────────────────────────────────────────
        for (name, pin) in [
            ("pump_pin", self.relays.pump_pin),
            ("lighting_pin", self.relays.lighting_pin),
        ] {
            if !VALID_GPIO_PINS.contains(&pin) {
                errors.push(format!(
                    "relays.{name} {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
                ));
            }
        }
        if self.relays.pump_pin == self.relays.lighting_pin {
            errors.push(format!(
                "relays.pump_pin and relays.lighting_pin are both {}",
                self.relays.pump_pin
            ));
        }

        // ── Thresholds ──────────────────────────────────────
        if !(0.0..=100.0).contains(&self.thresholds.light_min_percent) {
            errors.push(format!(
                "thresholds.light_min_percent {} out of range [0, 100]",
                self.thresholds.light_min_percent
            ));
        }
        if self.thresholds.light_full_scale == 0 {
            errors.push("thresholds.light_full_scale must be positive".to_string());
        }

        // ── Scheduler ───────────────────────────────────────
        if self.scheduler.cycle_sec == 0 {
            errors.push("scheduler.cycle_sec must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    /// Apply deployment overrides from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("BACKEND_URL") {
            self.backend.url = url;
        }
        if let Ok(host) = env::var("MQTT_HOST") {
            self.short_range.host = host;
        }
        if let Some(port) = env::var("MQTT_PORT").ok().and_then(|s| s.parse().ok()) {
            self.short_range.port = port;
        }
        if let Some(port) = env::var("WEB_PORT").ok().and_then(|s| s.parse().ok()) {
            self.web.port = port;
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read and parse a TOML config file. A missing file means defaults.
pub fn parse_file(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        tracing::warn!(path, "config file not found, using defaults");
        return Ok(Config::default());
    }
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))
}

/// Parse, apply env overrides, then validate.
pub fn load(path: &str) -> Result<Config> {
    let mut config = parse_file(path)?;
    config.apply_env();
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
