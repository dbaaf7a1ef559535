//! Injected device capabilities
//!
//! Every platform facility the engine may use (microphone, notifications,
//! geolocation, weather lookups) is handed in as a [`Capability`]. An
//! unavailable capability disables its feature for the rest of the session.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Capability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Capability::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Capability::Available(inner) => Some(inner),
            Capability::Unavailable(_) => None,
        }
    }

    /// Permanently disable for this session.
    pub fn revoke(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Capability revoked for this session: {}", reason);
        *self = Capability::Unavailable(reason);
    }
}

/// Permission state for a user-granted facility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Prompt,
}

/// Notification dispatch collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification. Implementations silently no-op without permission.
    async fn notify(&self, title: &str, body: &str, tag: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoke_is_permanent() {
        let mut mic: Capability<()> = Capability::Available(());
        assert!(mic.is_available());
        mic.revoke("no microphone");
        assert!(!mic.is_available());
        assert!(mic.get().is_none());
    }
}
