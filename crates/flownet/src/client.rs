use std::io;
use std::time::Instant;

use crate::action::{Action, ActionRegistry};
use crate::config::NetConfig;
use crate::connection::{Connection, ConnectionState, PeerEvent};
use crate::packet::Packet;
use crate::transport::{DispatchRole, NetworkStats, Transport, TransportEvent};

/// The host-facing client: one transport, one connection state machine,
/// one action registry, driven by `poll` once per host update tick.
///
/// Typical flow: construct, register the configured action set, call
/// [`NetClient::connect`], then call [`NetClient::poll`] every tick and
/// react to the returned [`PeerEvent`]s.
pub struct NetClient {
    config: NetConfig,
    registry: ActionRegistry,
    transport: Option<Transport>,
    connection: Connection,
}

impl NetClient {
    pub fn new(config: NetConfig) -> Self {
        let connection = Connection::new(
            config.connect_timeout(),
            config.reconnect_delay(),
            config.reconnect_attempts,
        );

        Self {
            config,
            registry: ActionRegistry::new(),
            transport: None,
            connection,
        }
    }

    /// Registers an action handler; see [`ActionRegistry::register`].
    /// Both ends must register the same set in the same order.
    pub fn register_action(&mut self, handler: Box<dyn Action>) -> i32 {
        self.registry.register(handler)
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// The server-assigned identity, once connected.
    pub fn identity(&self) -> Option<i32> {
        self.connection.identity()
    }

    pub fn stats(&self) -> Option<&NetworkStats> {
        self.transport.as_ref().map(|t| t.stats())
    }

    /// Starts a connect cycle toward the configured remote. Binds the
    /// socket on first use. A no-op if a cycle is already in flight.
    pub fn connect(&mut self) -> io::Result<()> {
        let remote = self.config.remote_addr()?;

        if self.transport.is_none() {
            let transport = Transport::bind(("0.0.0.0", self.config.local_port))?;
            log::debug!("bound local socket {}", transport.local_addr());
            self.transport = Some(transport);
        }

        if let Some(transport) = self.transport.as_mut() {
            transport.set_remote(remote);
            if self.connection.connect(Instant::now()) {
                log::info!("connecting to {remote}");
                transport.send_hello(&self.config.game_name);
            }
        }

        Ok(())
    }

    /// Explicitly disconnects: notifies the peer when connected, closes
    /// the socket, stops the state machine, and forgets the assigned
    /// identity. The next [`NetClient::connect`] rebinds from scratch.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if self.connection.is_connected() {
                transport.send_disconnect_notice();
            }
            transport.shutdown();
        }
        self.connection.disconnect();
    }

    /// Sends an already-built packet to the server. Fire-and-forget; a
    /// transport fault is logged, never returned.
    pub fn send(&mut self, packet: Packet) {
        match self.transport.as_mut() {
            Some(transport) => transport.send(packet),
            None => log::warn!("send before connect, packet dropped"),
        }
    }

    /// Drives one update tick: drains received datagrams (dispatching
    /// registered actions on this thread), feeds connection-level signals
    /// into the state machine, advances its timers, and re-issues the
    /// handshake when a reconnect attempt is due.
    ///
    /// Returns the peer lifecycle events that occurred this tick.
    pub fn poll(&mut self) -> Vec<PeerEvent> {
        let now = Instant::now();

        if let Some(transport) = self.transport.as_mut() {
            for event in transport.poll(&mut self.registry, DispatchRole::Client) {
                match event {
                    TransportEvent::AcceptReceived { identity } => {
                        self.connection.on_peer_connected(identity);
                        if self.connection.is_connected() {
                            transport.set_local_id(identity);
                        }
                    }
                    TransportEvent::PeerDisconnected { .. } => {
                        transport.set_local_id(0);
                        self.connection.on_peer_disconnected(now);
                    }
                    TransportEvent::MalformedFrame { addr } => {
                        log::warn!("malformed frame from {addr}");
                        transport.set_local_id(0);
                        self.connection.on_malformed_frame();
                    }
                    TransportEvent::HelloReceived { addr, .. } => {
                        log::debug!("ignoring hello from {addr} on client");
                    }
                }
            }
        }

        if self.connection.tick(now) {
            if let Some(transport) = self.transport.as_mut() {
                transport.send_hello(&self.config.game_name);
            }
        }

        self.connection.take_events()
    }
}
