//! Short-range transport bridge. The proximity radio stack publishes every
//! GATT write it receives to `<prefix>/<device>/rx`; this task forwards each
//! payload into the short-range mailbox as soon as it arrives, independent
//! of the scheduler.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ShortRangeConfig;
use crate::mailbox::InboundSink;

// ---------------------------------------------------------------------------
// Topic helpers
// ---------------------------------------------------------------------------

pub(crate) fn subscription_filter(prefix: &str) -> String {
    format!("{prefix}/+/rx")
}

/// Extract the device id from "<prefix>/<device>/rx".
pub(crate) fn extract_device_id<'a>(topic: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let device = rest.strip_suffix("/rx")?;
    if device.is_empty() || device.contains('/') {
        None
    } else {
        Some(device)
    }
}

// ---------------------------------------------------------------------------
// Bridge task
// ---------------------------------------------------------------------------

pub async fn run_bridge(cfg: ShortRangeConfig, sink: Arc<dyn InboundSink>) {
    let mut options = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
        options.set_credentials(user.clone(), pass.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let filter = subscription_filter(&cfg.topic_prefix);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(p))) => {
                match extract_device_id(&p.topic, &cfg.topic_prefix) {
                    Some(device) => {
                        debug!(device, len = p.payload.len(), "short-range: payload received");
                        sink.accept(&p.payload);
                    }
                    None => warn!(topic = %p.topic, "short-range: unhandled topic"),
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(host = %cfg.host, port = cfg.port, "short-range: bridge connected");
                // Subscriptions do not survive a clean-session reconnect.
                if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                    warn!("short-range: subscribe to {filter} failed: {e}");
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("short-range: bridge disconnected");
            }
            Ok(_) => {}
            Err(e) => {
                warn!("short-range: mqtt error: {e}. reconnecting...");
                sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
