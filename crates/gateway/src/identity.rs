//! Gateway identity, derived once at boot from a hardware MAC address.

use std::fmt;

use anyhow::{bail, Result};
use sysinfo::Networks;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayId(String);

impl GatewayId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Render a MAC as lowercase hex without separators.
    pub fn from_mac(mac: [u8; 6]) -> Self {
        Self(mac.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the gateway id: an explicit override wins, then the MAC of
/// `interface`, then the first other interface (by name) with a real MAC.
pub fn resolve(override_id: Option<&str>, interface: &str) -> Result<GatewayId> {
    if let Some(id) = override_id.map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(GatewayId::new(id));
    }

    let networks = Networks::new_with_refreshed_list();
    let mut macs: Vec<(String, [u8; 6])> = networks
        .iter()
        .filter(|(_, data)| !data.mac_address().is_unspecified())
        .map(|(name, data)| (name.clone(), data.mac_address().0))
        .collect();
    macs.sort();

    pick_mac(&macs, interface).map(GatewayId::from_mac)
}

fn pick_mac(macs: &[(String, [u8; 6])], interface: &str) -> Result<[u8; 6]> {
    if let Some((_, mac)) = macs.iter().find(|(name, _)| name == interface) {
        return Ok(*mac);
    }
    match macs.first() {
        Some((name, mac)) => {
            warn!(
                wanted = interface,
                using = %name,
                "identity: interface not found, falling back"
            );
            Ok(*mac)
        }
        None => bail!("no network interface with a hardware address; set network.gateway_id"),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MAC_A: [u8; 6] = [0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56];
    const MAC_B: [u8; 6] = [0xb8, 0x27, 0xeb, 0x00, 0x00, 0x01];

    #[test]
    fn from_mac_renders_lowercase_hex() {
        assert_eq!(GatewayId::from_mac(MAC_A).as_str(), "240ac4123456");
    }

    #[test]
    fn from_mac_keeps_leading_zeros() {
        let id = GatewayId::from_mac([0, 0, 0, 0, 0, 0x0f]);
        assert_eq!(id.as_str(), "00000000000f");
    }

    #[test]
    fn override_wins() {
        let id = resolve(Some("greenhouse-gw"), "does-not-exist").unwrap();
        assert_eq!(id.to_string(), "greenhouse-gw");
    }

    #[test]
    fn pick_mac_prefers_configured_interface() {
        let macs = vec![("eth0".to_string(), MAC_B), ("wlan0".to_string(), MAC_A)];
        assert_eq!(pick_mac(&macs, "wlan0").unwrap(), MAC_A);
    }

    #[test]
    fn pick_mac_falls_back_to_first() {
        let macs = vec![("eth0".to_string(), MAC_B)];
        assert_eq!(pick_mac(&macs, "wlan0").unwrap(), MAC_B);
    }

    #[test]
    fn pick_mac_without_interfaces_fails() {
        let err = pick_mac(&[], "wlan0").unwrap_err();
        assert!(err.to_string().contains("gateway_id"));
    }
}
