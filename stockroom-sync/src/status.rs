//! Operator-facing sync status.

use serde::{Deserialize, Serialize};
use stockroom_types::Connectivity;

/// What the status badge shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Online,
    Offline,
    Syncing { pending: usize },
}

impl SyncStatus {
    pub fn for_connectivity(connectivity: Connectivity) -> Self {
        match connectivity {
            Connectivity::Online => Self::Online,
            Connectivity::Offline => Self::Offline,
        }
    }

    /// Short badge text.
    pub fn label(&self) -> String {
        match self {
            Self::Online => "Online".to_string(),
            Self::Offline => "Offline".to_string(),
            Self::Syncing { pending: 1 } => "Syncing 1 change...".to_string(),
            Self::Syncing { pending } => format!("Syncing {pending} changes..."),
        }
    }

    /// Tooltip text.
    pub fn detail(&self) -> &'static str {
        match self {
            Self::Online => "All changes synced",
            Self::Offline => "Working offline - changes will be synced when connection restored",
            Self::Syncing { .. } => "Sending changes recorded while offline",
        }
    }
}
