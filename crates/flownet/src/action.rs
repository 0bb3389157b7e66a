use std::collections::HashMap;

use crate::packet::{Packet, PacketError};

/// Decorative prefix stripped from handler names at registration, so a
/// handler reporting itself as `NA_PlayerMove` registers as `PlayerMove`.
pub const NAME_PREFIX: &str = "NA_";

/// An inbound action ID with no registered handler. The offending packet
/// is dropped; routing to a wrong handler is never an option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown action ID {0}")]
    UnknownId(i32),
    #[error("unknown action name {0:?}")]
    UnknownName(String),
}

/// A named, ID-routable message handler.
///
/// `from_peer` runs on a server-side receiver and gets the sender's
/// identity alongside the packet; `from_remote` runs on a client-side
/// receiver. A handler overrides whichever direction it serves; the
/// defaults just log, like an unimplemented virtual.
pub trait Action {
    /// Canonical handler identifier; a leading [`NAME_PREFIX`] is
    /// stripped at registration.
    fn name(&self) -> &'static str;

    fn from_peer(&mut self, sender_id: i32, packet: &mut Packet) -> Result<(), PacketError> {
        let _ = (sender_id, packet);
        log::warn!("action {} has no from_peer handler", self.name());
        Ok(())
    }

    fn from_remote(&mut self, packet: &mut Packet) -> Result<(), PacketError> {
        let _ = packet;
        log::warn!("action {} has no from_remote handler", self.name());
        Ok(())
    }
}

struct Registered {
    name: String,
    handler: Box<dyn Action>,
}

/// Append-only table mapping action name -> sequential ID -> handler.
///
/// IDs are 1-based and assigned in registration order, so both peers must
/// register the same action set in the same order for IDs to line up on
/// the wire. That is a protocol convention this table cannot verify.
///
/// The on-wire ID contract is off by one from the internal table:
/// `resolve_by_id` subtracts one before indexing the zero-based slot list.
#[derive(Default)]
pub struct ActionRegistry {
    by_name: HashMap<String, usize>,
    slots: Vec<Registered>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonical_name(raw: &str) -> &str {
        raw.strip_prefix(NAME_PREFIX).unwrap_or(raw)
    }

    /// Registers a handler under its canonical name and returns its ID.
    /// Registering a name twice is a no-op; the first registration wins
    /// and its ID is returned.
    pub fn register(&mut self, handler: Box<dyn Action>) -> i32 {
        let name = Self::canonical_name(handler.name()).to_string();

        if let Some(&slot) = self.by_name.get(&name) {
            log::debug!("action {name} already registered, keeping first");
            return slot as i32 + 1;
        }

        let slot = self.slots.len();
        self.slots.push(Registered { name: name.clone(), handler });
        self.by_name.insert(name, slot);

        slot as i32 + 1
    }

    /// Resolves an on-wire action ID to its handler.
    pub fn resolve_by_id(&mut self, id: i32) -> Result<&mut dyn Action, RegistryError> {
        let slot = id
            .checked_sub(1)
            .and_then(|slot| usize::try_from(slot).ok());
        match slot.and_then(|slot| self.slots.get_mut(slot)) {
            Some(entry) => Ok(&mut *entry.handler),
            None => Err(RegistryError::UnknownId(id)),
        }
    }

    pub fn resolve_by_name(&mut self, name: &str) -> Result<&mut dyn Action, RegistryError> {
        let name = Self::canonical_name(name);
        match self.by_name.get(name) {
            Some(&slot) => Ok(self.slots[slot].handler.as_mut()),
            None => Err(RegistryError::UnknownName(name.to_string())),
        }
    }

    /// The registered ID for a canonical name, if any. Senders use this
    /// to seed outgoing packets.
    pub fn id_of(&self, name: &str) -> Option<i32> {
        let name = Self::canonical_name(name);
        self.by_name.get(name).map(|&slot| slot as i32 + 1)
    }

    pub fn name_of(&self, id: i32) -> Option<&str> {
        id.checked_sub(1)
            .and_then(|slot| usize::try_from(slot).ok())
            .and_then(|slot| self.slots.get(slot))
            .map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
