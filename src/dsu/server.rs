//! DSU UDP Server
//!
//! Listens for Cemuhook client datagrams, answers version, port-info and
//! pad-data requests from the live [`ControllerRegistry`]. The receive loop
//! is single-tasked: one datagram is fully processed (decode, registry query,
//! encode, send) before the next is received. A bad datagram never takes the
//! loop down.

use crate::domain::models::PadSnapshot;
use crate::domain::registry::{ControllerRegistry, MAX_PADS};
use crate::dsu::packet::{self, ClientRequest};
use anyhow::Result;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Default Cemuhook port.
pub const DSU_DEFAULT_PORT: u16 = 26760;

/// DSU server handle. `Stopped -> Listening` on [`DsuServer::start`],
/// back to `Stopped` on [`DsuServer::stop`]; no other states.
pub struct DsuServer {
    registry: ControllerRegistry,
    server_id: u32,
    listener: Option<Listener>,
}

struct Listener {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl DsuServer {
    /// Create a stopped server. The session identifier clients see is drawn
    /// once here and reused for every response until the process exits.
    pub fn new(registry: ControllerRegistry) -> Self {
        Self {
            registry,
            server_id: rand::random(),
            listener: None,
        }
    }

    /// Bind the UDP socket and start serving. A no-op if already listening.
    pub async fn start(&mut self, port: u16) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        let local_addr = socket.local_addr()?;
        info!("DSU server listening on {}", local_addr);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let loop_state = ServeLoop {
            socket,
            registry: self.registry.clone(),
            server_id: self.server_id,
            counters: [0u32; MAX_PADS],
        };
        let task = tokio::spawn(loop_state.run(shutdown_rx));

        self.listener = Some(Listener {
            shutdown,
            task,
            local_addr,
        });
        Ok(())
    }

    /// Signal the loop to stop and wait for it to wind down.
    pub async fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = listener.shutdown.send(true);
            let _ = listener.task.await;
            info!("DSU server stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Bound address while listening (useful when started on port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr)
    }
}

struct ServeLoop {
    socket: UdpSocket,
    registry: ControllerRegistry,
    server_id: u32,
    /// Per-slot packet counters for pad-data responses.
    counters: [u32; MAX_PADS],
}

impl ServeLoop {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = [0u8; 2048];
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            if let Err(e) = self.handle_datagram(&buf[..len], peer).await {
                                // Send failures and the like must not kill the
                                // loop; the next client is unaffected.
                                warn!("Error handling datagram from {}: {}", peer, e);
                            }
                        }
                        Err(e) => {
                            warn!("UDP receive error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) -> Result<()> {
        let Some(request) = packet::decode_request(datagram) else {
            // Malformed, stale-version or tampered packet: ignore silently.
            trace!("Ignoring invalid datagram ({} bytes) from {}", datagram.len(), peer);
            return Ok(());
        };

        match request {
            ClientRequest::Version => {
                debug!("Version request from {}", peer);
                let response = packet::encode_version_response(self.server_id);
                self.socket.send_to(&response, peer).await?;
            }
            ClientRequest::ListPorts { slots } => {
                debug!("Port info request from {} for slots {:?}", peer, slots);
                for slot in slots {
                    let snapshot = self.registry.snapshot(slot);
                    let response = packet::encode_port_info(self.server_id, &snapshot);
                    self.socket.send_to(&response, peer).await?;
                }
            }
            ClientRequest::PadData { .. } => {
                // The registration filter is deliberately not honored: every
                // request is answered with all four slots, which is a
                // superset of anything the client asked for.
                for snapshot in self.registry.snapshot_all() {
                    let slot = snapshot.slot as usize;
                    self.counters[slot] = self.counters[slot].wrapping_add(1);
                    let response = packet::encode_pad_data(
                        self.server_id,
                        &snapshot,
                        self.counters[slot],
                        timestamp_us(&snapshot),
                    );
                    self.socket.send_to(&response, peer).await?;
                }
            }
        }
        Ok(())
    }
}

/// Microsecond timestamp for pad-data packets; zero for absent pads.
fn timestamp_us(snapshot: &PadSnapshot) -> u64 {
    if !snapshot.connected {
        return 0;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
