use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Explicit local disconnect request.
    Local,
    /// The peer dropped us unexpectedly.
    Remote,
    /// Reconnect attempts exhausted; the server is unreachable.
    Unreachable,
    /// The peer sent a frame too short to carry a header.
    MalformedFrame,
}

/// Peer lifecycle notifications for the host's gameplay layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    Connected { identity: i32 },
    Disconnected { reason: DisconnectReason },
}

/// The connect / timeout / reconnect-with-backoff state machine for one
/// client link.
///
/// Purely synchronous: all timing is done by comparing deadlines against
/// the `now` passed into [`Connection::tick`], which the host calls once
/// per update. Nothing here blocks or spawns.
///
/// Backoff is linear: attempt N waits `reconnect_delay * N`. Every failed
/// attempt schedules a backoff wait; when that wait matures the machine
/// either retries (while `reconnect_attempt < max_attempts`, incrementing
/// the counter) or parks in `Disconnected` for good until the host asks
/// to connect again.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    identity: Option<i32>,
    reconnect_attempt: u32,
    /// Bumped on every explicit connect and disconnect. A matured backoff
    /// deadline from a superseded cycle is ignored.
    generation: u64,
    connect_deadline: Option<Instant>,
    retry_at: Option<(u64, Instant)>,
    events: VecDeque<PeerEvent>,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    max_attempts: u32,
}

impl Connection {
    pub fn new(connect_timeout: Duration, reconnect_delay: Duration, max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            identity: None,
            reconnect_attempt: 1,
            generation: 0,
            connect_deadline: None,
            retry_at: None,
            events: VecDeque::new(),
            connect_timeout,
            reconnect_delay,
            max_attempts,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<i32> {
        self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    /// The pending backoff delay, if a retry is scheduled.
    pub fn retry_delay(&self, now: Instant) -> Option<Duration> {
        self.retry_at
            .map(|(_, at)| at.saturating_duration_since(now))
    }

    /// Starts a fresh connect cycle. Returns true if the owner should
    /// issue a connect attempt now; only valid from `Disconnected`.
    pub fn connect(&mut self, now: Instant) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }

        self.generation += 1;
        self.reconnect_attempt = 1;
        self.state = ConnectionState::Connecting;
        self.connect_deadline = Some(now + self.connect_timeout);
        self.retry_at = None;
        true
    }

    /// Explicit local disconnect: stops the cycle from any state and
    /// cancels in-flight timers.
    pub fn disconnect(&mut self) {
        self.generation += 1;
        self.connect_deadline = None;
        self.retry_at = None;
        self.identity = None;

        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            self.events.push_back(PeerEvent::Disconnected {
                reason: DisconnectReason::Local,
            });
        }
    }

    /// The transport saw a successful handshake.
    pub fn on_peer_connected(&mut self, identity: i32) {
        if self.state != ConnectionState::Connecting {
            log::debug!("handshake signal ignored in state {:?}", self.state);
            return;
        }

        log::info!("connection established, assigned identity {identity}");
        self.state = ConnectionState::Connected;
        self.identity = Some(identity);
        self.reconnect_attempt = 1;
        self.connect_deadline = None;
        self.events.push_back(PeerEvent::Connected { identity });
    }

    /// The transport saw an unexpected peer drop. A no-op unless we are
    /// currently connected, so an in-flight reconnect cycle is never
    /// duplicated.
    pub fn on_peer_disconnected(&mut self, now: Instant) {
        if self.state != ConnectionState::Connected {
            return;
        }

        log::info!("disconnected from server");
        self.identity = None;
        self.events.push_back(PeerEvent::Disconnected {
            reason: DisconnectReason::Remote,
        });
        self.begin_reconnect(now);
    }

    /// The transport received a frame too short to parse. This is a hard
    /// local disconnect, not a retry condition.
    pub fn on_malformed_frame(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        log::warn!("malformed frame from peer, disconnecting");
        self.generation += 1;
        self.connect_deadline = None;
        self.retry_at = None;
        self.identity = None;
        self.state = ConnectionState::Disconnected;
        self.events.push_back(PeerEvent::Disconnected {
            reason: DisconnectReason::MalformedFrame,
        });
    }

    fn begin_reconnect(&mut self, now: Instant) {
        let delay = self.reconnect_delay * self.reconnect_attempt;
        log::info!(
            "trying to reconnect in {:.1} seconds (attempt {})",
            delay.as_secs_f32(),
            self.reconnect_attempt
        );
        self.state = ConnectionState::Reconnecting;
        self.connect_deadline = None;
        self.retry_at = Some((self.generation, now + delay));
    }

    /// Advances timer-driven transitions. Returns true when the owner
    /// should issue a fresh connect attempt.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state {
            ConnectionState::Connecting => {
                if self.connect_deadline.is_some_and(|deadline| now >= deadline) {
                    log::warn!("could not connect to server");
                    self.begin_reconnect(now);
                }
                false
            }
            ConnectionState::Reconnecting => {
                let Some((generation, at)) = self.retry_at else {
                    return false;
                };
                if generation != self.generation || now < at {
                    return false;
                }
                self.retry_at = None;

                if self.reconnect_attempt < self.max_attempts {
                    self.reconnect_attempt += 1;
                    log::info!("reconnecting...");
                    self.state = ConnectionState::Connecting;
                    self.connect_deadline = Some(now + self.connect_timeout);
                    true
                } else {
                    log::warn!("server is not reachable");
                    self.state = ConnectionState::Disconnected;
                    self.events.push_back(PeerEvent::Disconnected {
                        reason: DisconnectReason::Unreachable,
                    });
                    false
                }
            }
            ConnectionState::Disconnected | ConnectionState::Connected => false,
        }
    }

    /// Drains pending lifecycle events in the order they occurred.
    pub fn take_events(&mut self) -> Vec<PeerEvent> {
        self.events.drain(..).collect()
    }
}
