use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::action::ActionRegistry;
use crate::packet::Packet;

pub const MAX_PACKET_SIZE: usize = 1200;

/// Reserved action ID for handshake control frames: the client hello
/// carries the shared game identifier, the server accept carries the
/// assigned identity.
pub const HANDSHAKE_ID: i32 = 0;
/// Reserved action ID for an orderly disconnect notice.
pub const DISCONNECT_ID: i32 = -1;

/// Smallest datagram that can carry a frame header. Anything shorter is
/// a connection-level anomaly.
const MIN_FRAME_LEN: usize = 4;

const READER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Which receive entry point dispatched actions get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRole {
    Client,
    Server,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub malformed_frames: u64,
}

/// Connection-level signals the transport surfaces to its owner instead
/// of routing through the action registry.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    HelloReceived { game_name: String, addr: SocketAddr },
    AcceptReceived { identity: i32 },
    PeerDisconnected { addr: SocketAddr },
    MalformedFrame { addr: SocketAddr },
}

/// Owns the UDP socket and the framing contract around it.
///
/// A background reader thread blocks on the socket and forwards raw
/// datagrams over a channel; [`Transport::poll`] drains that channel on
/// the caller's thread, where all decoding and handler dispatch happens.
/// Handlers therefore never need their own locking.
///
/// Wire frame, outermost first: `i32` sender identity, `i32` length of
/// the body, then the body (`i32` action ID followed by the payload).
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    /// Identity stamped on outgoing packets; 0 until the server assigns
    /// one.
    local_id: i32,
    incoming: Receiver<(Vec<u8>, SocketAddr)>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    stats: NetworkStats,
}

impl Transport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local_addr = socket.local_addr()?;

        let reader_socket = socket.try_clone()?;
        reader_socket.set_read_timeout(Some(READER_POLL_INTERVAL))?;

        let running = Arc::new(AtomicBool::new(true));
        let (tx, incoming) = mpsc::channel();

        let reader = std::thread::spawn({
            let running = Arc::clone(&running);
            move || {
                let mut buf = [0u8; MAX_PACKET_SIZE];
                while running.load(Ordering::SeqCst) {
                    match reader_socket.recv_from(&mut buf) {
                        Ok((size, addr)) => {
                            if tx.send((buf[..size].to_vec(), addr)).is_err() {
                                break;
                            }
                        }
                        Err(e)
                            if e.kind() == io::ErrorKind::WouldBlock
                                || e.kind() == io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            log::debug!("socket receive error: {e}");
                        }
                    }
                }
            }
        });

        Ok(Self {
            socket,
            local_addr,
            remote_addr: None,
            local_id: 0,
            incoming,
            running,
            reader: Some(reader),
            stats: NetworkStats::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    pub fn set_local_id(&mut self, id: i32) {
        self.local_id = id;
    }

    pub fn local_id(&self) -> i32 {
        self.local_id
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Frames and transmits a packet to the configured remote. Sends are
    /// fire-and-forget: submit failures are logged and counted, never
    /// surfaced to the caller.
    pub fn send(&mut self, packet: Packet) {
        let Some(addr) = self.remote_addr else {
            log::warn!("send with no remote address set");
            return;
        };
        self.send_to(packet, addr);
    }

    /// Like [`Transport::send`] with an explicit destination, for
    /// server-side use.
    pub fn send_to(&mut self, mut packet: Packet, addr: SocketAddr) {
        packet.write_length_prefix();
        packet.insert_int(self.local_id);

        match self.socket.send_to(packet.as_bytes(), addr) {
            Ok(bytes) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += bytes as u64;
            }
            Err(e) => {
                log::warn!("error sending data to {addr}: {e}");
            }
        }
    }

    /// Sends the handshake hello carrying the shared game identifier.
    pub fn send_hello(&mut self, game_name: &str) {
        let mut packet = Packet::with_id(HANDSHAKE_ID);
        packet.write_string(game_name);
        self.send(packet);
    }

    /// Sends the handshake accept assigning `identity`, server side.
    pub fn send_accept(&mut self, identity: i32, addr: SocketAddr) {
        let mut packet = Packet::with_id(HANDSHAKE_ID);
        packet.write_i32(identity);
        self.send_to(packet, addr);
    }

    /// Sends an orderly disconnect notice.
    pub fn send_disconnect_notice(&mut self) {
        self.send(Packet::with_id(DISCONNECT_ID));
    }

    /// Drains every datagram the reader thread has queued, decodes each
    /// on the calling thread, and routes registered actions through the
    /// registry. Control frames and anomalies come back as events.
    ///
    /// Must be called once per host update tick.
    pub fn poll(
        &mut self,
        registry: &mut ActionRegistry,
        role: DispatchRole,
    ) -> Vec<TransportEvent> {
        let mut events = Vec::new();

        loop {
            let (data, addr) = match self.incoming.try_recv() {
                Ok(datagram) => datagram,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            self.stats.packets_received += 1;
            self.stats.bytes_received += data.len() as u64;

            if data.len() < MIN_FRAME_LEN {
                log::warn!("runt datagram ({} bytes) from {addr}", data.len());
                self.stats.malformed_frames += 1;
                events.push(TransportEvent::MalformedFrame { addr });
                continue;
            }

            if let Some(event) = self.handle_datagram(data, addr, registry, role) {
                events.push(event);
            }
        }

        events
    }

    fn handle_datagram(
        &mut self,
        data: Vec<u8>,
        addr: SocketAddr,
        registry: &mut ActionRegistry,
        role: DispatchRole,
    ) -> Option<TransportEvent> {
        // Unwrap the frame: sender stamp, then the length-prefixed body.
        let mut frame = Packet::from_bytes(data);
        let body = (|| {
            let sender_id = frame.read_i32()?;
            let length = frame.read_i32()?;
            let length = usize::try_from(length).unwrap_or(usize::MAX);
            Ok::<_, crate::packet::PacketError>((sender_id, frame.read_bytes(length)?))
        })();

        let (sender_id, body) = match body {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!("malformed frame from {addr}: {e}");
                self.stats.malformed_frames += 1;
                return Some(TransportEvent::MalformedFrame { addr });
            }
        };

        let mut packet = Packet::from_bytes(body);
        let action_id = match packet.read_i32() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("frame body missing action ID from {addr}: {e}");
                self.stats.malformed_frames += 1;
                return Some(TransportEvent::MalformedFrame { addr });
            }
        };

        match action_id {
            DISCONNECT_ID => return Some(TransportEvent::PeerDisconnected { addr }),
            HANDSHAKE_ID => return self.handle_control(role, &mut packet, addr),
            _ => {}
        }

        match registry.resolve_by_id(action_id) {
            Ok(action) => {
                let result = match role {
                    DispatchRole::Server => action.from_peer(sender_id, &mut packet),
                    DispatchRole::Client => action.from_remote(&mut packet),
                };
                if let Err(e) = result {
                    // Malformed payload affects only this packet.
                    log::warn!("action {} dropped packet: {e}", action.name());
                }
            }
            Err(e) => {
                log::warn!("dropping packet from {addr}: {e}");
            }
        }

        None
    }

    fn handle_control(
        &mut self,
        role: DispatchRole,
        packet: &mut Packet,
        addr: SocketAddr,
    ) -> Option<TransportEvent> {
        match role {
            // Server side: hello carries the game identifier string.
            DispatchRole::Server => match packet.read_string() {
                Ok(game_name) => Some(TransportEvent::HelloReceived { game_name, addr }),
                Err(e) => {
                    log::warn!("bad hello from {addr}: {e}");
                    self.stats.malformed_frames += 1;
                    Some(TransportEvent::MalformedFrame { addr })
                }
            },
            // Client side: accept carries the assigned identity.
            DispatchRole::Client => match packet.read_i32() {
                Ok(identity) => Some(TransportEvent::AcceptReceived { identity }),
                Err(e) => {
                    log::warn!("bad accept from {addr}: {e}");
                    self.stats.malformed_frames += 1;
                    Some(TransportEvent::MalformedFrame { addr })
                }
            },
        }
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
