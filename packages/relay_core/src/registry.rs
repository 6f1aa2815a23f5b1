//! Live connections across both transports.
//!
//! Primary index: `ConnectionKey → Connection` (admission order).
//! Identifiers are looked up by scan; an identifier may be held once per
//! transport, so a lookup can yield up to one connection per transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{DeliveryError, RelayError};
use crate::id::IdGenerator;
use crate::message::{Outbound, TransportKind};

/// Internal handle for a connection. Never reused within a process.
pub type ConnectionKey = u64;

/// Attempts to generate an unused identifier before giving up.
const MAX_GENERATE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted and sent its history; may still identify.
    Open,
    /// Identified or has sent chat/voice/signal.
    Active,
    /// Transport closed; removed from the registry.
    Closed,
}

/// A live connection as seen by the routers.
#[derive(Debug)]
pub struct Connection {
    key: ConnectionKey,
    identifier: String,
    transport: TransportKind,
    state: ConnectionState,
    tx: mpsc::Sender<Outbound>,
}

impl Connection {
    pub fn key(&self) -> ConnectionKey {
        self.key
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Enqueue without waiting. A full queue drops the message for this
    /// recipient only.
    pub fn offer(&self, msg: Outbound) -> Result<(), DeliveryError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub(crate) fn activate(&mut self) {
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Active;
        }
    }
}

pub struct ConnectionRegistry {
    by_key: BTreeMap<ConnectionKey, Connection>,
    next_key: ConnectionKey,
    ids: Arc<dyn IdGenerator>,
}

impl ConnectionRegistry {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            by_key: BTreeMap::new(),
            next_key: 1,
            ids,
        }
    }

    /// Register a connection. Without a supplied identifier one is generated.
    pub fn admit(
        &mut self,
        transport: TransportKind,
        supplied: Option<String>,
        tx: mpsc::Sender<Outbound>,
    ) -> Result<&Connection, RelayError> {
        let identifier = match supplied {
            Some(id) => {
                self.check_available(transport, &id, None)?;
                id
            }
            None => self.generate_unused(transport)?,
        };

        let key = self.next_key;
        self.next_key += 1;
        let conn = Connection {
            key,
            identifier,
            transport,
            state: ConnectionState::Open,
            tx,
        };
        Ok(self.by_key.entry(key).or_insert(conn))
    }

    /// Remove a connection, returning it marked `Closed`.
    pub fn remove(&mut self, key: ConnectionKey) -> Option<Connection> {
        self.by_key.remove(&key).map(|mut conn| {
            conn.state = ConnectionState::Closed;
            conn
        })
    }

    /// All live connections in admission order. Restartable: each call
    /// iterates afresh.
    pub fn all(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.by_key.values()
    }

    /// Every live connection whose identifier equals `identifier` exactly.
    pub fn find_by_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.by_key
            .values()
            .filter(move |c| c.identifier == identifier)
    }

    pub fn get(&self, key: ConnectionKey) -> Option<&Connection> {
        self.by_key.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: ConnectionKey) -> Option<&mut Connection> {
        self.by_key.get_mut(&key)
    }

    /// Change a connection's identifier. Uniqueness is per transport.
    pub fn rename(&mut self, key: ConnectionKey, identifier: String) -> Result<(), RelayError> {
        let transport = self
            .by_key
            .get(&key)
            .map(|c| c.transport)
            .ok_or(RelayError::UnknownConnection)?;
        self.check_available(transport, &identifier, Some(key))?;
        if let Some(conn) = self.by_key.get_mut(&key) {
            conn.identifier = identifier;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    fn check_available(
        &self,
        transport: TransportKind,
        identifier: &str,
        except: Option<ConnectionKey>,
    ) -> Result<(), RelayError> {
        if identifier.is_empty() {
            return Err(RelayError::EmptyIdentifier);
        }
        let taken = self
            .find_by_identifier(identifier)
            .any(|c| c.transport == transport && Some(c.key) != except);
        if taken {
            return Err(RelayError::IdentifierInUse(identifier.to_string()));
        }
        Ok(())
    }

    fn generate_unused(&self, transport: TransportKind) -> Result<String, RelayError> {
        let mut last = String::new();
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let candidate = self.ids.generate(transport);
            if self.check_available(transport, &candidate, None).is_ok() {
                return Ok(candidate);
            }
            last = candidate;
        }
        Err(RelayError::IdentifierInUse(last))
    }
}
