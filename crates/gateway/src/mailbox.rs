//! Single-slot hand-off between a transport producer and the scheduler.
//!
//! A mailbox holds at most one raw payload. A new arrival while a payload is
//! still unread replaces it (last write wins) and bumps the `overwritten`
//! counter. Producers never block beyond the slot lock and never queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

/// Capability exposed to transport adapters: hand over one inbound payload.
pub trait InboundSink: Send + Sync {
    fn accept(&self, payload: &[u8]);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailboxStats {
    pub received: u64,
    pub overwritten: u64,
}

pub struct Mailbox {
    name: &'static str,
    slot: Mutex<Option<Vec<u8>>>,
    ready: AtomicBool,
    received: AtomicU64,
    overwritten: AtomicU64,
}

impl Mailbox {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
            ready: AtomicBool::new(false),
            received: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Take the pending payload, clearing the ready flag before returning so
    /// an arrival during processing lands as a fresh message.
    pub fn take(&self) -> Option<Vec<u8>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.store(false, Ordering::Release);
        slot.take()
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            received: self.received.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
        }
    }
}

impl InboundSink for Mailbox {
    fn accept(&self, payload: &[u8]) {
        if payload.is_empty() {
            debug!(mailbox = self.name, "ignoring empty payload");
            return;
        }

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.replace(payload.to_vec()).is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
            debug!(mailbox = self.name, "unread payload overwritten");
        }
        self.received.fetch_add(1, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
