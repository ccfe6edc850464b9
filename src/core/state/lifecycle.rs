// src/core/state/lifecycle.rs

//! The per-connection lifecycle state machine.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a single connection.
///
/// `Pending -> Admitted -> Connected -> (Reading <-> Dispatching) -> terminal`,
/// where the terminal states are `Disconnected`, `Rejected` and `Errored`.
/// Once a connection reaches a terminal state it never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Pending = 0,
    Admitted = 1,
    Connected = 2,
    Reading = 3,
    Dispatching = 4,
    Disconnected = 5,
    Rejected = 6,
    Errored = 7,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Rejected | ConnectionState::Errored
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Rejected) | (_, Errored) | (_, Disconnected) => true,
            (Pending, Admitted) => true,
            (Admitted, Connected) => true,
            (Connected, Reading) => true,
            (Reading, Dispatching) | (Dispatching, Reading) => true,
            _ => false,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Pending,
            1 => ConnectionState::Admitted,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reading,
            4 => ConnectionState::Dispatching,
            5 => ConnectionState::Disconnected,
            6 => ConnectionState::Rejected,
            _ => ConnectionState::Errored,
        }
    }
}

/// A lock-free cell holding a `ConnectionState`.
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts the transition to `next`. Returns `false` when the current state
    /// does not allow it; concurrent callers racing for a terminal state see exactly
    /// one winner.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if !ConnectionState::from_u8(current).can_transition_to(next) {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
