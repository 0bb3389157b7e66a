use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Connection settings supplied by the host, normally loaded from its
/// configuration assets.
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub server_ip: String,
    pub server_port: u16,
    /// Shared identifier both ends must present during the handshake.
    pub game_name: String,
    /// How long a connect attempt may sit unanswered before it counts
    /// as failed.
    pub connect_check_secs: f32,
    /// Base reconnect delay; attempt N waits `reconnect_secs * N`.
    pub reconnect_secs: f32,
    pub reconnect_attempts: u32,
    /// Local bind port; 0 picks an ephemeral port.
    pub local_port: u16,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            server_ip: "127.0.0.1".to_string(),
            server_port: 27045,
            game_name: "flownet".to_string(),
            connect_check_secs: 5.0,
            reconnect_secs: 3.0,
            reconnect_attempts: 5,
            local_port: 0,
        }
    }
}

impl NetConfig {
    /// `connect_check_secs` as a duration. Negative, non-finite, or
    /// overflowing values clamp to zero rather than panic.
    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f32(self.connect_check_secs).unwrap_or(Duration::ZERO)
    }

    /// `reconnect_secs` as a duration, clamped the same way.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::try_from_secs_f32(self.reconnect_secs).unwrap_or(Duration::ZERO)
    }

    pub fn remote_addr(&self) -> io::Result<SocketAddr> {
        (self.server_ip.as_str(), self.server_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("could not resolve {}:{}", self.server_ip, self.server_port),
                )
            })
    }
}
