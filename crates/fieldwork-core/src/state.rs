//! Shared cross-platform state types.

use crate::sync::SyncStatus;

/// Unified sync state shown by client indicators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    /// The last pass left failed items behind
    Error,
}

impl SyncState {
    /// Collapse a status snapshot into an indicator state
    pub const fn from_status(status: &SyncStatus) -> Self {
        if !status.is_online {
            return Self::Offline;
        }
        if status.is_syncing {
            return Self::Syncing;
        }
        if status.queue.failed > 0 {
            return Self::Error;
        }
        Self::Synced
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
