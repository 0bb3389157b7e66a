//! Binary transport core for a real-time client/server game: a
//! hand-framed wire codec, an ID-routed action registry, a UDP transport
//! that marshals all dispatch onto the host's update thread, and a
//! connect/reconnect state machine with linear backoff.

pub mod action;
pub mod client;
pub mod config;
pub mod connection;
pub mod packet;
pub mod transport;

pub use action::{Action, ActionRegistry, NAME_PREFIX, RegistryError};
pub use client::NetClient;
pub use config::NetConfig;
pub use connection::{Connection, ConnectionState, DisconnectReason, PeerEvent};
pub use packet::{Packet, PacketError};
pub use transport::{
    DISCONNECT_ID, DispatchRole, HANDSHAKE_ID, MAX_PACKET_SIZE, NetworkStats, Transport,
    TransportEvent,
};
