use std::sync::{PoisonError, RwLock};

use cask_types::Health;

use crate::error::{StoreError, StoreResult};

/// Observable lifecycle state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Open,
    Closed,
}

enum Slot<S> {
    Unopened,
    Open(S),
    Closed,
}

/// Lifecycle state machine and health snapshot shared by every backend.
///
/// `S` is the backend session created by `open` (a storage root, a client
/// handle). It is written once and cloned out for each operation, so data
/// operations only ever take the shared lock.
pub(crate) struct Lifecycle<S> {
    slot: RwLock<Slot<S>>,
    health: RwLock<Health>,
}

impl<S: Clone> Lifecycle<S> {
    pub(crate) fn new() -> Self {
        Self {
            slot: RwLock::new(Slot::Unopened),
            health: RwLock::new(Health::default()),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        match *self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Unopened => ConnectionState::Unopened,
            Slot::Open(_) => ConnectionState::Open,
            Slot::Closed => ConnectionState::Closed,
        }
    }

    /// Check whether `open` still has work to do.
    ///
    /// Returns `Ok(false)` if the connection is already open and
    /// `Err(Connection)` once it has been closed.
    pub(crate) fn needs_open(&self) -> StoreResult<bool> {
        match self.state() {
            ConnectionState::Unopened => Ok(true),
            ConnectionState::Open => Ok(false),
            ConnectionState::Closed => Err(StoreError::Connection(
                "connection has already been closed".into(),
            )),
        }
    }

    /// Install the session produced by a successful open.
    pub(crate) fn mark_open(&self, session: S) -> StoreResult<()> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Slot::Closed => Err(StoreError::Connection(
                "connection was closed while opening".into(),
            )),
            // A concurrent open won the race; keep its session.
            Slot::Open(_) => Ok(()),
            Slot::Unopened => {
                *slot = Slot::Open(session);
                Ok(())
            }
        }
    }

    /// The open session, or `NotConnected`.
    pub(crate) fn session(&self) -> StoreResult<S> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Open(session) => Ok(session.clone()),
            _ => Err(StoreError::NotConnected),
        }
    }

    /// Transition `Open -> Closed`, dropping the session. Returns `true` if
    /// a session was released; any other state is left untouched.
    pub(crate) fn close(&self) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, Slot::Open(_)) {
            *slot = Slot::Closed;
            true
        } else {
            false
        }
    }

    pub(crate) fn health(&self) -> Health {
        self.health
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_health(&self, health: Health) {
        *self.health.write().unwrap_or_else(PoisonError::into_inner) = health;
    }
}
