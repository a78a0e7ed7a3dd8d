//! Per-session cancellation tokens for in-flight dispatches.
//!
//! A [`SessionGuard`] owns a generation counter. Every dispatch captures a
//! [`DispatchToken`] when it is issued; when the session moves on (e.g. the
//! dataset changes) the guard is invalidated and responses carrying an older
//! token are discarded on arrival.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SessionGuard {
    generation: Arc<AtomicU64>,
}

impl SessionGuard {
    pub fn new() -> Self {
        SessionGuard {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Captures the current generation.
    pub fn token(&self) -> DispatchToken {
        DispatchToken {
            issued: self.generation.load(Ordering::SeqCst),
            current: Arc::clone(&self.generation),
        }
    }

    /// Marks every token issued so far as stale. Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct DispatchToken {
    issued: u64,
    current: Arc<AtomicU64>,
}

impl DispatchToken {
    /// True while the session that issued the token is still active.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.issued
    }

    pub fn generation(&self) -> u64 {
        self.issued
    }
}
