//! Scriptable stand-ins for the gateway's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::delivery::{Backend, BackendReply};
use crate::link::LinkMonitor;
use crate::mailbox::{InboundSink, Mailbox};
use crate::sensors::{LocalReadings, LocalSensors};
use crate::supervisor::LongRangeRadio;

pub(crate) fn reply(status: u16, body: &str) -> BackendReply {
    BackendReply {
        status,
        body: body.to_string(),
    }
}

// -- Backend ----------------------------------------------------------------

#[derive(Default)]
struct BackendInner {
    script: VecDeque<Result<BackendReply>>,
    fallback: Option<BackendReply>,
    bodies: Vec<Vec<u8>>,
    ready_during_post: Vec<bool>,
    arrive_during_post: Option<Vec<u8>>,
}

/// Replays scripted replies in order, then the fallback (or an error).
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    inner: Arc<Mutex<BackendInner>>,
    watched: Arc<Mutex<Option<Arc<Mailbox>>>>,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<Result<BackendReply>>) -> Self {
        let b = Self::default();
        b.inner.lock().unwrap().script = script.into();
        b
    }

    pub(crate) fn always(reply: BackendReply) -> Self {
        let b = Self::default();
        b.inner.lock().unwrap().fallback = Some(reply);
        b
    }

    /// Record the mailbox's ready flag each time a POST is issued.
    pub(crate) fn watch_mailbox(&self, mailbox: Arc<Mailbox>) {
        *self.watched.lock().unwrap() = Some(mailbox);
    }

    /// Deliver `payload` into the watched mailbox while the next POST is
    /// in flight.
    pub(crate) fn arrive_during_next_post(&self, payload: Vec<u8>) {
        self.inner.lock().unwrap().arrive_during_post = Some(payload);
    }

    pub(crate) fn calls(&self) -> usize {
        self.inner.lock().unwrap().bodies.len()
    }

    pub(crate) fn bodies(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().bodies.clone()
    }

    pub(crate) fn ready_during_post(&self) -> Vec<bool> {
        self.inner.lock().unwrap().ready_during_post.clone()
    }
}

impl Backend for ScriptedBackend {
    async fn post_json(&self, body: Vec<u8>) -> Result<BackendReply> {
        let watched = self.watched.lock().unwrap().clone();
        let mut inner = self.inner.lock().unwrap();
        inner.bodies.push(body);
        if let Some(mb) = watched {
            inner.ready_during_post.push(mb.is_ready());
            if let Some(payload) = inner.arrive_during_post.take() {
                mb.accept(&payload);
            }
        }
        match inner.script.pop_front() {
            Some(r) => r,
            None => inner
                .fallback
                .clone()
                .ok_or_else(|| anyhow!("backend script exhausted")),
        }
    }
}

// -- Link -------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct StaticLink {
    up: Arc<AtomicBool>,
    checks: Arc<AtomicU32>,
    flip: Arc<Mutex<Option<(u32, bool)>>>,
}

impl StaticLink {
    fn with(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
            checks: Arc::new(AtomicU32::new(0)),
            flip: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn up() -> Self {
        Self::with(true)
    }

    pub(crate) fn down() -> Self {
        Self::with(false)
    }

    /// Switch to `up` once `checks` status queries have been answered.
    pub(crate) fn set_after_checks(&self, checks: u32, up: bool) {
        *self.flip.lock().unwrap() = Some((checks, up));
    }
}

impl LinkMonitor for StaticLink {
    fn is_associated(&self) -> bool {
        let n = self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some((after, up)) = *self.flip.lock().unwrap() {
            if n >= after {
                self.up.store(up, Ordering::SeqCst);
            }
        }
        self.up.load(Ordering::SeqCst)
    }
}

// -- Radio ------------------------------------------------------------------

#[derive(Default)]
struct RadioInner {
    begin_script: VecDeque<bool>,
    begins: u32,
    inbox: VecDeque<Result<Vec<u8>>>,
}

/// `begin` follows the script (then fails); `poll` drains queued packets.
#[derive(Clone, Default)]
pub(crate) struct FakeRadio {
    inner: Arc<Mutex<RadioInner>>,
}

impl FakeRadio {
    pub(crate) fn with_begins(script: &[bool]) -> Self {
        let r = Self::default();
        r.inner.lock().unwrap().begin_script = script.iter().copied().collect();
        r
    }

    pub(crate) fn begins(&self) -> u32 {
        self.inner.lock().unwrap().begins
    }

    pub(crate) fn push_packet(&self, payload: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .inbox
            .push_back(Ok(payload.to_vec()));
    }

    pub(crate) fn push_error(&self, msg: &str) {
        self.inner
            .lock()
            .unwrap()
            .inbox
            .push_back(Err(anyhow!(msg.to_string())));
    }

    pub(crate) fn script_begins(&self, script: &[bool]) {
        self.inner
            .lock()
            .unwrap()
            .begin_script
            .extend(script.iter().copied());
    }
}

impl LongRangeRadio for FakeRadio {
    async fn begin(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.begins += 1;
        if inner.begin_script.pop_front().unwrap_or(false) {
            Ok(())
        } else {
            Err(anyhow!("radio not responding"))
        }
    }

    fn poll(&mut self) -> Result<Option<Vec<u8>>> {
        match self.inner.lock().unwrap().inbox.pop_front() {
            Some(Ok(p)) => Ok(Some(p)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

// -- Sensors ----------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct FixedSensors {
    readings: Arc<Mutex<LocalReadings>>,
}

impl FixedSensors {
    pub(crate) fn new(readings: LocalReadings) -> Self {
        Self {
            readings: Arc::new(Mutex::new(readings)),
        }
    }

    pub(crate) fn set(&self, readings: LocalReadings) {
        *self.readings.lock().unwrap() = readings;
    }
}

impl LocalSensors for FixedSensors {
    fn sample(&mut self) -> LocalReadings {
        *self.readings.lock().unwrap()
    }
}
