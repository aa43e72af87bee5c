use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the control partition that holds deferred writes.
pub const SYNC_QUEUE_PARTITION: &str = "syncQueue";

/// A business collection mirrored in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Inventory,
    Sales,
    Expenses,
    Transactions,
}

impl Partition {
    /// Every business partition, in creation order.
    pub const ALL: [Partition; 4] = [
        Partition::Inventory,
        Partition::Sales,
        Partition::Expenses,
        Partition::Transactions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Sales => "sales",
            Self::Expenses => "expenses",
            Self::Transactions => "transactions",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown partition: {s}"))
    }
}
