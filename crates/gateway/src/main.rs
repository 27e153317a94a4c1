mod clock;
mod codec;
mod config;
mod controller;
mod delivery;
mod identity;
mod link;
mod mailbox;
mod mqtt;
mod radio;
mod relay;
mod scheduler;
mod sensors;
mod state;
mod supervisor;
#[cfg(test)]
mod testing;
mod web;

use anyhow::Result;
use std::{env, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clock::SystemClock;
use delivery::{DeliveryClient, HttpBackend};
use link::SysfsLink;
use mailbox::{InboundSink, Mailbox};
use radio::UdpRadio;
use relay::{Relay, RelayBoard};
use scheduler::{Gateway, GatewayParts};
use state::{SharedStatus, StatusResponse};
use supervisor::ConnectivitySupervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ─────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "gateway.toml".to_string());
    let cfg = config::load(&config_path)?;

    let clock = SystemClock::new();
    let gateway_id =
        identity::resolve(cfg.network.gateway_id.as_deref(), &cfg.network.interface)?;
    info!(gateway_id = %gateway_id, config = %config_path, "gateway identity resolved");

    // ── Local sensors (before any relay is touched) ─────────────────
    let thresholds = cfg.thresholds.thresholds();
    let sensors = sensors::open(cfg.scheduler.sim_day_cycles, thresholds.light_full_scale)?;

    // ── Relay board ─────────────────────────────────────────────────
    let (pump_pin, lighting_pin) = cfg.relays.pins();
    let relays = RelayBoard::new(
        &[(Relay::Pump, pump_pin), (Relay::Lighting, lighting_pin)],
        cfg.relays.active_low,
    )?;

    // ── Status API ──────────────────────────────────────────────────
    let status: SharedStatus = Arc::new(RwLock::new(StatusResponse::initial(gateway_id.as_str())));
    if cfg.web.enabled {
        let web_status = Arc::clone(&status);
        let port = cfg.web.port;
        tokio::spawn(async move {
            if let Err(e) = web::serve(web_status, port).await {
                error!("status api stopped: {e:#}");
            }
        });
    }

    // ── Short-range bridge ──────────────────────────────────────────
    let short_range = Arc::new(Mailbox::new("short-range"));
    if cfg.short_range.enabled {
        let sink: Arc<dyn InboundSink> = short_range.clone();
        tokio::spawn(mqtt::run_bridge(cfg.short_range.clone(), sink));
    } else {
        info!("short-range bridge disabled");
    }

    // ── Delivery & long-range radio ─────────────────────────────────
    let delivery = DeliveryClient::new(
        HttpBackend::new(&cfg.backend.url)?,
        SysfsLink::new(&cfg.network.interface),
        clock.clone(),
        cfg.backend.retry_policy(),
    );
    let supervisor = ConnectivitySupervisor::new(
        UdpRadio::new(cfg.long_range.bind),
        clock.clone(),
        cfg.long_range.retry_policy(),
    );

    // ── Main loop ───────────────────────────────────────────────────
    let gateway = Gateway::new(GatewayParts {
        clock,
        delivery,
        supervisor,
        sensors,
        relays,
        short_range,
        gateway_id,
        thresholds,
        cycle: cfg.scheduler.cycle(),
        status,
    });
    gateway.run().await;

    Ok(())
}
