use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a submission left the live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveReason {
    Deleted,
    Published,
}

impl ArchiveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deleted" => Some(Self::Deleted),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of an opponent defense. Rejected rows are deleted outright,
/// so there is no variant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseStatus {
    Pending,
    Approved,
}

impl DefenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

/// A code + image defense sent in by a player.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published: bool,
}

impl Submission {
    pub fn is_pending(&self) -> bool {
        !self.published
    }
}

/// Snapshot of a submission taken when it was deleted or published.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedSubmission {
    pub id: i64,
    /// Id the submission had in the live table.
    pub submission_id: i64,
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub archive_reason: ArchiveReason,
    pub archived_at: DateTime<Utc>,
}

/// Image-only submission of an opponent's formation.
#[derive(Debug, Clone, PartialEq)]
pub struct OpponentDefense {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub image_data: Vec<u8>,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: DefenseStatus,
    /// Set on approval together with `number`.
    pub processed_image: Option<Vec<u8>>,
    pub number: Option<i64>,
    pub published: bool,
}

impl OpponentDefense {
    /// Approved and not yet sent to an output channel.
    pub fn is_publishable(&self) -> bool {
        self.status == DefenseStatus::Approved && !self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_reason_round_trips_through_str() {
        for reason in [ArchiveReason::Deleted, ArchiveReason::Published] {
            assert_eq!(ArchiveReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(ArchiveReason::parse("rejected"), None);
    }

    #[test]
    fn defense_status_rejects_unknown() {
        assert_eq!(DefenseStatus::parse("approved"), Some(DefenseStatus::Approved));
        assert_eq!(DefenseStatus::parse("rejected"), None);
    }
}
