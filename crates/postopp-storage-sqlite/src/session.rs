//! In-memory session key context.
//!
//! Holds the one active secret for an unlocked session. The secret is kept
//! only for the lifetime of the handle and is never persisted.

use crate::{Error, Result};
use parking_lot::RwLock;
use postopp_core::Secret;

/// Handle to the active session secret, passed into every store call
#[derive(Default)]
pub struct SessionKeyContext {
    active: RwLock<Option<Secret>>,
}

impl SessionKeyContext {
    /// Create a locked context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context already unlocked with `secret`
    pub fn with_secret(secret: Secret) -> Self {
        Self {
            active: RwLock::new(Some(secret)),
        }
    }

    /// Install the session secret, replacing any previous one.
    pub fn install(&self, secret: Secret) {
        let replaced = self.active.write().replace(secret).is_some();
        tracing::debug!("Session secret installed (replaced={})", replaced);
    }

    /// Drop the session secret.
    pub fn lock(&self) {
        *self.active.write() = None;
        tracing::debug!("Session locked");
    }

    /// Check whether a secret is installed.
    pub fn is_unlocked(&self) -> bool {
        self.active.read().is_some()
    }

    /// Get the active secret.
    pub fn secret(&self) -> Result<Secret> {
        self.active.read().as_ref().cloned().ok_or_else(|| {
            tracing::error!("Store accessed before a session secret was installed");
            Error::KeyNotSet
        })
    }
}
