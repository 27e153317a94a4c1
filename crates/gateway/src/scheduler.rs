//! The gateway cycle: a single cooperative loop, one step at a time.
//!
//! Each cycle, in order:
//!
//! 1. dispatch the short-range mailbox, poll the long-range radio into its
//!    mailbox and dispatch that one (decode → deliver, blocking);
//! 2. if the long-range link is down, run one supervisor tick;
//! 3. sample the local sensors and re-run the pump and lighting controllers;
//! 4. log a status line and publish the status snapshot;
//!
//! then sleep for the cycle period. Nothing runs concurrently with a
//! delivery sequence, so actuators are only evaluated between deliveries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::codec::{self, DeliveryEnvelope};
use crate::controller::{self, Thresholds};
use crate::delivery::{Backend, DeliveryClient};
use crate::identity::GatewayId;
use crate::link::LinkMonitor;
use crate::mailbox::Mailbox;
use crate::relay::RelayBoard;
use crate::sensors::LocalSensors;
use crate::state::{GatewayState, SharedStatus};
use crate::supervisor::{ConnectivitySupervisor, LongRangeRadio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    ShortRange,
    LongRange,
}

impl Transport {
    fn as_str(self) -> &'static str {
        match self {
            Self::ShortRange => "short-range",
            Self::LongRange => "long-range",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the gateway is assembled from.
pub struct GatewayParts<C, B, L, R, S> {
    pub clock: C,
    pub delivery: DeliveryClient<B, L, C>,
    pub supervisor: ConnectivitySupervisor<R, C>,
    pub sensors: S,
    pub relays: RelayBoard,
    /// Fed by the short-range bridge task.
    pub short_range: Arc<Mailbox>,
    pub gateway_id: GatewayId,
    pub thresholds: Thresholds,
    pub cycle: Duration,
    pub status: SharedStatus,
}

pub struct Gateway<C, B, L, R, S> {
    clock: C,
    delivery: DeliveryClient<B, L, C>,
    supervisor: ConnectivitySupervisor<R, C>,
    sensors: S,
    relays: RelayBoard,
    short_range: Arc<Mailbox>,
    long_range: Mailbox,
    gateway_id: GatewayId,
    thresholds: Thresholds,
    cycle: Duration,
    status: SharedStatus,
    state: GatewayState,
}

impl<C, B, L, R, S> Gateway<C, B, L, R, S>
where
    C: Clock,
    B: Backend,
    L: LinkMonitor,
    R: LongRangeRadio,
    S: LocalSensors,
{
    pub fn new(parts: GatewayParts<C, B, L, R, S>) -> Self {
        let state = GatewayState::new(parts.gateway_id.as_str());
        Self {
            clock: parts.clock,
            delivery: parts.delivery,
            supervisor: parts.supervisor,
            sensors: parts.sensors,
            relays: parts.relays,
            short_range: parts.short_range,
            long_range: Mailbox::new(Transport::LongRange.as_str()),
            gateway_id: parts.gateway_id,
            thresholds: parts.thresholds,
            cycle: parts.cycle,
            status: parts.status,
            state,
        }
    }

    /// Run forever.
    pub async fn run(mut self) {
        self.boot().await;
        loop {
            self.run_cycle().await;
            self.clock.sleep(self.cycle).await;
        }
    }

    /// Start-up: relays off, first radio bring-up.
    pub async fn boot(&mut self) {
        self.relays.all_off();
        let now = self.clock.now_ms();
        self.state
            .record_system(now, format!("gateway {} started", self.gateway_id));
        info!(gateway_id = %self.gateway_id, cycle_sec = self.cycle.as_secs(), "gateway started");

        self.supervise_radio().await;
    }

    pub async fn run_cycle(&mut self) {
        self.state.cycles += 1;
        debug!(cycle = self.state.cycles, "cycle start");

        // ── Ingestion ───────────────────────────────────────
        self.dispatch(Transport::ShortRange).await;

        let moved = self.supervisor.poll_into(&self.long_range);
        if moved > 0 {
            debug!(frames = moved, "long-range frames polled");
        }
        self.state
            .record_connectivity(self.clock.now_ms(), self.supervisor.state());
        self.dispatch(Transport::LongRange).await;

        // ── Connectivity ────────────────────────────────────
        if !self.supervisor.is_healthy() {
            self.supervise_radio().await;
        }

        // ── Actuators ───────────────────────────────────────
        let local = self.sensors.sample();
        self.state.local = Some(local);
        self.state.pump = Some(controller::control_pump(
            &mut self.relays,
            local.distance,
            &self.thresholds,
        ));
        self.state.lighting = Some(controller::control_lighting(
            &mut self.relays,
            local.light_raw,
            &self.thresholds,
        ));

        // ── Status ──────────────────────────────────────────
        self.report().await;
    }

    #[cfg(test)]
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    async fn supervise_radio(&mut self) {
        if let Err(e) = self.supervisor.tick().await {
            self.state.record_error(self.clock.now_ms(), e.to_string());
        }
        self.state
            .record_connectivity(self.clock.now_ms(), self.supervisor.state());
    }

    /// Take one payload from the transport's mailbox and push it through
    /// decode and delivery. Failures drop the message; nothing is re-queued.
    async fn dispatch(&mut self, transport: Transport) {
        let mailbox: &Mailbox = match transport {
            Transport::ShortRange => self.short_range.as_ref(),
            Transport::LongRange => &self.long_range,
        };
        let Some(payload) = mailbox.take() else {
            return;
        };
        debug!(mailbox = mailbox.name(), len = payload.len(), "payload taken");

        let now = self.clock.now_ms();
        let reading = match codec::decode(&payload) {
            Ok(r) => r,
            Err(e) => {
                warn!(%transport, "decode failed, message dropped: {e}");
                self.state
                    .record_decode_failure(now, transport.as_str(), e.to_string());
                return;
            }
        };

        info!(child = %reading.child_id, %transport, "reading received");
        let envelope = DeliveryEnvelope::new(&reading, &self.gateway_id, now);
        let outcome = self.delivery.deliver(&envelope).await;
        self.state.record_delivery(
            self.clock.now_ms(),
            &reading.child_id,
            transport.as_str(),
            outcome,
        );
    }

    async fn report(&mut self) {
        self.state.wifi_associated = self.delivery.is_link_up();

        let st = &self.state;
        let short = self.short_range.stats();
        let long = self.long_range.stats();

        info!(
            cycle = st.cycles,
            wifi = if st.wifi_associated { "associated" } else { "not associated" },
            long_range = ?st.long_range,
            short_rx = short.received,
            long_rx = long.received,
            delivered = st.counters.delivered,
            delivery_failures = st.counters.delivery_failures,
            decode_failures = st.counters.decode_failures,
            "connections"
        );
        if let Some(local) = &st.local {
            info!(
                distance = local.distance,
                light_raw = local.light_raw,
                soil_cap = local.soil_capacitive,
                soil_res = local.soil_resistive,
                temperature = format!("{:.1}", local.temperature),
                humidity = format!("{:.1}", local.humidity),
                "local sensors"
            );
        }
        info!(
            pump = st.pump.map(|p| p.on).unwrap_or(false),
            lighting = st.lighting.map(|l| l.on).unwrap_or(false),
            "actuators"
        );

        let snapshot = st.to_status(self.clock.now_ms(), short, long);
        *self.status.write().await = snapshot;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
