//! Core types shared across the Stockroom offline layer.
//!
//! - [`Partition`]: the business collections mirrored on the client
//! - [`Record`] / [`RecordId`]: opaque server rows keyed by their `id`
//! - [`QueuedOperation`]: a write deferred while the network was unreachable
//! - [`Connectivity`]: the platform-reported link state

mod operation;
mod partition;
mod record;

pub use operation::{HttpMethod, QueuedOperation};
pub use partition::{Partition, SYNC_QUEUE_PARTITION};
pub use record::{Record, RecordError, RecordId};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Link state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}
