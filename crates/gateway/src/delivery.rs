//! Forwarding of envelopes to the backend with a bounded retry budget.
//!
//! Each attempt checks the primary link first; an unassociated link burns the
//! attempt without touching the network. An attempt succeeds only on HTTP 200
//! with a non-empty body. Any non-empty body counts as the confirmation.

use std::future::Future;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use tracing::{error, info, warn};

use crate::clock::{Clock, RetryPolicy};
use crate::codec::DeliveryEnvelope;
use crate::link::LinkMonitor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub status: u16,
    pub body: String,
}

impl BackendReply {
    pub fn is_confirmation(&self) -> bool {
        self.status == 200 && !self.body.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success { attempts: u32 },
    Failure { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

pub trait Backend: Send + Sync {
    /// POST a JSON body and return the status and response text.
    fn post_json(&self, body: Vec<u8>) -> impl Future<Output = Result<BackendReply>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl Backend for HttpBackend {
    async fn post_json(&self, body: Vec<u8>) -> Result<BackendReply> {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.context("failed to read response body")?;
        Ok(BackendReply { status, body })
    }
}

// ---------------------------------------------------------------------------
// Delivery client
// ---------------------------------------------------------------------------

pub struct DeliveryClient<B, L, C> {
    backend: B,
    link: L,
    clock: C,
    policy: RetryPolicy,
}

impl<B: Backend, L: LinkMonitor, C: Clock> DeliveryClient<B, L, C> {
    pub fn new(backend: B, link: L, clock: C, policy: RetryPolicy) -> Self {
        Self {
            backend,
            link,
            clock,
            policy,
        }
    }

    pub fn is_link_up(&self) -> bool {
        self.link.is_associated()
    }

    /// Run one delivery sequence. Blocks the caller until it succeeds or the
    /// attempt budget is spent; nothing is kept afterwards.
    pub async fn deliver(&self, envelope: &DeliveryEnvelope) -> DeliveryOutcome {
        let body = envelope.to_bytes();
        let max = self.policy.max_attempts;
        let child = envelope.child_id.as_str();

        for attempt in 1..=max {
            if !self.link.is_associated() {
                warn!(child, attempt, max, "delivery: network link not associated");
            } else {
                match self.backend.post_json(body.clone()).await {
                    Ok(reply) if reply.is_confirmation() => {
                        info!(child, attempt, "delivery: backend confirmed");
                        return DeliveryOutcome::Success { attempts: attempt };
                    }
                    Ok(reply) if reply.status == 200 => {
                        warn!(child, attempt, max, "delivery: empty confirmation");
                    }
                    Ok(reply) => {
                        warn!(child, attempt, max, status = reply.status, "delivery: attempt rejected");
                    }
                    Err(e) => {
                        warn!(child, attempt, max, "delivery: attempt failed: {e:#}");
                    }
                }
            }

            if attempt < max {
                self.clock.sleep(self.policy.delay).await;
            }
        }

        error!(child, attempts = max, "delivery: giving up, reading dropped");
        DeliveryOutcome::Failure { attempts: max }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fake::FakeClock;
    use crate::codec::ChildReading;
    use crate::identity::GatewayId;
    use crate::testing::{reply, ScriptedBackend, StaticLink};
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }

    fn envelope() -> DeliveryEnvelope {
        let reading = ChildReading {
            child_id: "nodo-1".into(),
            temperature: 20.0,
            humidity: 50.0,
            ambient_light: 30.0,
            soil_humidity_capacitive: 1500,
            soil_humidity_resistive: 1700,
            water_level: 8,
        };
        DeliveryEnvelope::new(&reading, &GatewayId::new("gw"), 42)
    }

    fn client(
        backend: &ScriptedBackend,
        link: &StaticLink,
        clock: &FakeClock,
    ) -> DeliveryClient<ScriptedBackend, StaticLink, FakeClock> {
        DeliveryClient::new(backend.clone(), link.clone(), clock.clone(), policy())
    }

    #[test]
    fn confirmation_rule() {
        assert!(reply(200, "ok").is_confirmation());
        assert!(reply(200, "anything at all").is_confirmation());
        assert!(!reply(200, "").is_confirmation());
        assert!(!reply(201, "confirmado").is_confirmation());
        assert!(!reply(500, "confirmado").is_confirmation());
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let backend = ScriptedBackend::new(vec![Ok(reply(200, "confirmado"))]);
        let clock = FakeClock::default();
        let c = client(&backend, &StaticLink::up(), &clock);

        let outcome = c.deliver(&envelope()).await;

        assert_eq!(outcome, DeliveryOutcome::Success { attempts: 1 });
        assert_eq!(backend.calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn exhaustion_makes_exactly_five_attempts() {
        let backend = ScriptedBackend::always(reply(500, "boom"));
        let clock = FakeClock::default();
        let c = client(&backend, &StaticLink::up(), &clock);

        let outcome = c.deliver(&envelope()).await;

        assert_eq!(outcome, DeliveryOutcome::Failure { attempts: 5 });
        assert_eq!(backend.calls(), 5);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 4]);
    }

    #[tokio::test]
    async fn success_on_third_attempt_short_circuits() {
        let backend = ScriptedBackend::new(vec![
            Ok(reply(503, "")),
            Err(anyhow::anyhow!("connection refused")),
            Ok(reply(200, "ok")),
            Ok(reply(200, "never sent")),
        ]);
        let clock = FakeClock::default();
        let c = client(&backend, &StaticLink::up(), &clock);

        let outcome = c.deliver(&envelope()).await;

        assert_eq!(outcome, DeliveryOutcome::Success { attempts: 3 });
        assert_eq!(backend.calls(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 2]);
    }

    #[tokio::test]
    async fn empty_body_is_not_a_confirmation() {
        let backend = ScriptedBackend::always(reply(200, ""));
        let clock = FakeClock::default();
        let c = client(&backend, &StaticLink::up(), &clock);

        assert!(!c.deliver(&envelope()).await.is_success());
        assert_eq!(backend.calls(), 5);
    }

    #[tokio::test]
    async fn link_down_burns_attempts_without_network_calls() {
        let backend = ScriptedBackend::always(reply(200, "ok"));
        let clock = FakeClock::default();
        let c = client(&backend, &StaticLink::down(), &clock);

        let outcome = c.deliver(&envelope()).await;

        assert_eq!(outcome, DeliveryOutcome::Failure { attempts: 5 });
        assert_eq!(backend.calls(), 0);
        assert_eq!(clock.sleeps().len(), 4);
    }

    #[tokio::test]
    async fn link_recovering_mid_sequence_delivers() {
        let backend = ScriptedBackend::always(reply(200, "ok"));
        let link = StaticLink::down();
        let clock = FakeClock::default();
        let c = client(&backend, &link, &clock);

        link.set_after_checks(2, true);
        let outcome = c.deliver(&envelope()).await;

        assert_eq!(outcome, DeliveryOutcome::Success { attempts: 3 });
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn posts_the_encoded_envelope() {
        let backend = ScriptedBackend::new(vec![Ok(reply(200, "ok"))]);
        let c = client(&backend, &StaticLink::up(), &FakeClock::default());

        let env = envelope();
        c.deliver(&env).await;

        assert_eq!(backend.bodies(), vec![env.to_bytes()]);
    }
}
