//! Connectivity supervision for the long-range radio.
//!
//! ```text
//! Disconnected ──[begin() ok within budget]──▶ Connected
//!      ▲                                           │
//!      └───────[poll() reports a hard error]───────┘
//! ```
//!
//! Each tick while `Disconnected` spends a full, fresh try budget; there is
//! no backoff growth and the supervisor never gives up. A radio that goes
//! silent without reporting an error stays `Connected`.

use std::future::Future;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::{Clock, RetryPolicy};
use crate::mailbox::InboundSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Connected,
    #[default]
    Disconnected,
}

#[derive(Debug, Error)]
#[error("long-range radio failed to start after {attempts} attempt(s)")]
pub struct RadioInitFailure {
    pub attempts: u32,
}

/// Send/receive primitive of the long-range transport.
pub trait LongRangeRadio: Send {
    /// Bring the radio up. Safe to call again after a failure.
    fn begin(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Non-blocking receive of one packet.
    fn poll(&mut self) -> Result<Option<Vec<u8>>>;
}

pub struct ConnectivitySupervisor<R, C> {
    radio: R,
    clock: C,
    policy: RetryPolicy,
    state: ConnectivityState,
}

impl<R: LongRangeRadio, C: Clock> ConnectivitySupervisor<R, C> {
    pub fn new(radio: R, clock: C, policy: RetryPolicy) -> Self {
        Self {
            radio,
            clock,
            policy,
            state: ConnectivityState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn is_healthy(&self) -> bool {
        self.state == ConnectivityState::Connected
    }

    /// One supervision tick. When disconnected, try `begin()` up to the
    /// budget with the configured delay between tries. Returns the number
    /// of tries spent (zero when already connected).
    pub async fn tick(&mut self) -> Result<u32, RadioInitFailure> {
        if self.is_healthy() {
            return Ok(0);
        }

        let max = self.policy.max_attempts;
        info!(max, "radio: checking long-range link");

        for attempt in 1..=max {
            match self.radio.begin().await {
                Ok(()) => {
                    self.state = ConnectivityState::Connected;
                    info!(attempt, "radio: long-range link up");
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(attempt, max, "radio: init failed: {e:#}");
                }
            }
            if attempt < max {
                self.clock.sleep(self.policy.delay).await;
            }
        }

        warn!(attempts = max, "radio: continuing without long-range link");
        Err(RadioInitFailure { attempts: max })
    }

    /// External failure signal: the transport was observed failing.
    pub fn mark_lost(&mut self, reason: &str) {
        if self.state == ConnectivityState::Connected {
            warn!(reason, "radio: long-range link lost");
        }
        self.state = ConnectivityState::Disconnected;
    }

    /// Drain every pending packet into `sink`, oldest first, so the newest
    /// one is left in the mailbox and nothing waits in the socket for the
    /// next cycle. A hard receive error marks the link lost. Returns the
    /// number of packets handed over.
    pub fn poll_into(&mut self, sink: &dyn InboundSink) -> usize {
        if !self.is_healthy() {
            return 0;
        }

        let mut moved = 0;
        loop {
            match self.radio.poll() {
                Ok(Some(packet)) => {
                    sink.accept(&packet);
                    moved += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    self.mark_lost(&format!("{e:#}"));
                    break;
                }
            }
        }
        moved
    }
}

// ===========================================================================
// Tests
// ===========================================================================
