//! Status enums shared between the storage engine and the sync layer.
//!
//! Every variant has a stable snake_case string form used both in JSON
//! (serde) and in SQLite TEXT columns, so the two representations can never
//! drift apart.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synchronization state of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local changes not yet delivered to the remote system of record.
    Pending,
    /// The remote system has acknowledged the latest local state.
    Synced,
    /// Local and remote diverged; awaiting conflict resolution.
    Conflict,
    /// The last delivery attempt failed permanently.
    Error,
}

impl SyncStatus {
    /// Stable string form (matches the serde representation).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "conflict" => Ok(Self::Conflict),
            "error" => Ok(Self::Error),
            other => Err(Error::UnknownValue(format!("sync status: {other}"))),
        }
    }
}

/// The mutation kind captured by an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOperation {
    Create,
    Update,
    Delete,
}

impl QueueOperation {
    /// Stable string form (matches the serde representation).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::UnknownValue(format!("queue operation: {other}"))),
        }
    }
}

/// Delivery state of an outbox entry.
///
/// Lifecycle: `Pending` → (`Syncing`) → `Completed` or `Failed`. Failed
/// entries stay in the pending feed so the external driver can retry them;
/// retry timing is entirely the driver's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
}

impl QueueEntryStatus {
    /// Stable string form (matches the serde representation).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this entry still awaits successful delivery.
    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueEntryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::UnknownValue(format!("queue entry status: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_round_trips_through_str() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Synced,
            SyncStatus::Conflict,
            SyncStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
    }

    #[test]
    fn queue_enums_round_trip_through_str() {
        for op in [
            QueueOperation::Create,
            QueueOperation::Update,
            QueueOperation::Delete,
        ] {
            assert_eq!(op.as_str().parse::<QueueOperation>().unwrap(), op);
        }
        for st in [
            QueueEntryStatus::Pending,
            QueueEntryStatus::Syncing,
            QueueEntryStatus::Completed,
            QueueEntryStatus::Failed,
        ] {
            assert_eq!(st.as_str().parse::<QueueEntryStatus>().unwrap(), st);
        }
    }

    #[test]
    fn serde_form_matches_str_form() {
        let json = serde_json::to_string(&SyncStatus::Conflict).unwrap();
        assert_eq!(json, "\"conflict\"");
        let json = serde_json::to_string(&QueueEntryStatus::Syncing).unwrap();
        assert_eq!(json, "\"syncing\"");
    }

    #[test]
    fn completed_is_not_outstanding() {
        assert!(QueueEntryStatus::Pending.is_outstanding());
        assert!(QueueEntryStatus::Failed.is_outstanding());
        assert!(!QueueEntryStatus::Completed.is_outstanding());
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!("bogus".parse::<SyncStatus>().is_err());
    }
}
