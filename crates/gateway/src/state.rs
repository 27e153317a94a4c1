use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::controller::ActuatorState;
use crate::delivery::DeliveryOutcome;
use crate::mailbox::MailboxStats;
use crate::sensors::LocalReadings;
use crate::supervisor::ConnectivityState;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

/// Latest published snapshot, read by the web task.
pub type SharedStatus = Arc<RwLock<StatusResponse>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Everything the gateway knows, owned by the scheduler.
pub struct GatewayState {
    pub gateway_id: String,
    pub cycles: u64,
    pub wifi_associated: bool,
    pub long_range: ConnectivityState,
    pub local: Option<LocalReadings>,
    pub pump: Option<ActuatorState<i32>>,
    pub lighting: Option<ActuatorState<f32>>,
    pub counters: Counters,
    pub events: VecDeque<SystemEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub decode_failures: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    /// Milliseconds since boot.
    pub at_ms: u64,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Delivery,
    Decode,
    Radio,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusResponse {
    pub gateway_id: String,
    pub uptime_ms: u64,
    pub cycles: u64,
    pub wifi_associated: bool,
    pub long_range: ConnectivityState,
    pub short_range_mailbox: MailboxStats,
    pub long_range_mailbox: MailboxStats,
    pub local: Option<LocalReadings>,
    pub pump: Option<ActuatorState<i32>>,
    pub lighting: Option<ActuatorState<f32>>,
    pub counters: Counters,
    pub events: Vec<SystemEvent>,
}

impl StatusResponse {
    pub fn initial(gateway_id: &str) -> Self {
        Self {
            gateway_id: gateway_id.to_string(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl GatewayState {
    pub fn new(gateway_id: &str) -> Self {
        Self {
            gateway_id: gateway_id.to_string(),
            cycles: 0,
            wifi_associated: false,
            long_range: ConnectivityState::Disconnected,
            local: None,
            pump: None,
            lighting: None,
            counters: Counters::default(),
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    /// Record the end of a delivery sequence.
    pub fn record_delivery(&mut self, at_ms: u64, child_id: &str, transport: &str, outcome: DeliveryOutcome) {
        let detail = match outcome {
            DeliveryOutcome::Success { attempts } => {
                self.counters.delivered += 1;
                format!("{child_id} via {transport}: delivered after {attempts} attempt(s)")
            }
            DeliveryOutcome::Failure { attempts } => {
                self.counters.delivery_failures += 1;
                format!("{child_id} via {transport}: dropped after {attempts} attempt(s)")
            }
        };
        let kind = if outcome.is_success() {
            EventKind::Delivery
        } else {
            EventKind::Error
        };
        self.push_event(at_ms, kind, detail);
    }

    /// Record a rejected inbound payload.
    pub fn record_decode_failure(&mut self, at_ms: u64, transport: &str, reason: String) {
        self.counters.decode_failures += 1;
        self.push_event(at_ms, EventKind::Decode, format!("{transport}: {reason}"));
    }

    /// Record a long-range connectivity change. Unchanged states are ignored.
    pub fn record_connectivity(&mut self, at_ms: u64, state: ConnectivityState) {
        if self.long_range == state {
            return;
        }
        self.long_range = state;
        let detail = match state {
            ConnectivityState::Connected => "long-range link up",
            ConnectivityState::Disconnected => "long-range link down",
        };
        self.push_event(at_ms, EventKind::Radio, detail.to_string());
    }

    /// Record an error event.
    pub fn record_error(&mut self, at_ms: u64, detail: String) {
        self.push_event(at_ms, EventKind::Error, detail);
    }

    /// Record a generic system event.
    pub fn record_system(&mut self, at_ms: u64, detail: String) {
        self.push_event(at_ms, EventKind::System, detail);
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn to_status(
        &self,
        uptime_ms: u64,
        short_range: MailboxStats,
        long_range: MailboxStats,
    ) -> StatusResponse {
        StatusResponse {
            gateway_id: self.gateway_id.clone(),
            uptime_ms,
            cycles: self.cycles,
            wifi_associated: self.wifi_associated,
            long_range: self.long_range,
            short_range_mailbox: short_range,
            long_range_mailbox: long_range,
            local: self.local,
            pump: self.pump,
            lighting: self.lighting,
            counters: self.counters,
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, at_ms: u64, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            at_ms,
            kind,
            detail,
        });
    }
}

// ===========================================================================
// Tests
// ===========================================================================
