//! Association status of the primary network link.

use std::fs;
use std::path::PathBuf;

pub trait LinkMonitor: Send + Sync {
    fn is_associated(&self) -> bool;
}

/// Reads the kernel's operstate for one interface. Anything other than
/// `up` (including a missing interface) counts as not associated.
pub struct SysfsLink {
    operstate: PathBuf,
}

impl SysfsLink {
    pub fn new(interface: &str) -> Self {
        Self::with_root("/sys/class/net", interface)
    }

    pub fn with_root(root: impl Into<PathBuf>, interface: &str) -> Self {
        Self {
            operstate: root.into().join(interface).join("operstate"),
        }
    }
}

impl LinkMonitor for SysfsLink {
    fn is_associated(&self) -> bool {
        fs::read_to_string(&self.operstate)
            .map(|s| s.trim() == "up")
            .unwrap_or(false)
    }
}
