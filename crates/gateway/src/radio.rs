//! Long-range radio reached through a UDP packet forwarder.
//!
//! The concentrator forwards every received frame as one datagram. `begin`
//! binds the socket; `poll` is a non-blocking receive driven by the scheduler.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::supervisor::LongRangeRadio;

/// Largest frame the forwarder sends.
const MAX_FRAME: usize = 512;

pub struct UdpRadio {
    bind: SocketAddr,
    socket: Option<UdpSocket>,
    buf: Vec<u8>,
}

impl UdpRadio {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            socket: None,
            buf: vec![0; MAX_FRAME],
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl LongRangeRadio for UdpRadio {
    async fn begin(&mut self) -> Result<()> {
        // Release a previously bound socket, or the rebind hits EADDRINUSE.
        self.socket = None;
        let socket = UdpSocket::bind(self.bind)
            .with_context(|| format!("failed to bind radio socket {}", self.bind))?;
        socket
            .set_nonblocking(true)
            .context("failed to make radio socket non-blocking")?;
        self.socket = Some(socket);
        debug!(addr = ?self.local_addr(), "radio: socket bound");
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(socket) = self.socket.as_ref() else {
            bail!("radio not started");
        };

        match socket.recv_from(&mut self.buf) {
            Ok((len, from)) => {
                debug!(%from, len, "radio: frame received");
                Ok(Some(self.buf[..len].to_vec()))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                // Drop the socket so the next begin() starts clean.
                self.socket = None;
                Err(e).context("radio receive failed")
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
