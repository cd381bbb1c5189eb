//! Database row types. These map directly to SQLite rows and are converted
//! into the typed records of `bulwark_types::models` at the store boundary.

use bulwark_types::models::{
    ArchiveReason, ArchivedSubmission, DefenseStatus, OpponentDefense, Submission,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;

use crate::StoreError;

pub(crate) const SUBMISSION_COLUMNS: &str = "id, user_id, username, code, message, extra_mention, \
     image_data, image_filename, created_at, published";

pub(crate) const ARCHIVE_COLUMNS: &str = "id, submission_id, user_id, username, code, message, \
     extra_mention, image_data, image_filename, created_at, archive_reason, archived_at";

pub(crate) const OPPONENT_COLUMNS: &str = "id, user_id, username, image_data, image_filename, \
     created_at, status, processed_image, number, published";

pub struct SubmissionRow {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub image_filename: Option<String>,
    pub created_at: String,
    pub published: bool,
}

pub struct ArchiveRow {
    pub id: i64,
    pub submission_id: i64,
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub image_filename: Option<String>,
    pub created_at: String,
    pub archive_reason: String,
    pub archived_at: String,
}

pub struct OpponentRow {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub image_data: Vec<u8>,
    pub image_filename: Option<String>,
    pub created_at: String,
    pub status: String,
    pub processed_image: Option<Vec<u8>>,
    pub number: Option<i64>,
    pub published: bool,
}

impl SubmissionRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            username: row.get(2)?,
            code: row.get(3)?,
            message: row.get(4)?,
            extra_mention: row.get(5)?,
            image_data: row.get(6)?,
            image_filename: row.get(7)?,
            created_at: row.get(8)?,
            published: row.get(9)?,
        })
    }
}

impl ArchiveRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            submission_id: row.get(1)?,
            user_id: row.get(2)?,
            username: row.get(3)?,
            code: row.get(4)?,
            message: row.get(5)?,
            extra_mention: row.get(6)?,
            image_data: row.get(7)?,
            image_filename: row.get(8)?,
            created_at: row.get(9)?,
            archive_reason: row.get(10)?,
            archived_at: row.get(11)?,
        })
    }
}

impl OpponentRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            username: row.get(2)?,
            image_data: row.get(3)?,
            image_filename: row.get(4)?,
            created_at: row.get(5)?,
            status: row.get(6)?,
            processed_image: row.get(7)?,
            number: row.get(8)?,
            published: row.get(9)?,
        })
    }
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Submission {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            code: row.code,
            message: row.message,
            extra_mention: row.extra_mention,
            image_data: row.image_data,
            image_filename: row.image_filename,
            published: row.published,
        })
    }
}

impl TryFrom<ArchiveRow> for ArchivedSubmission {
    type Error = StoreError;

    fn try_from(row: ArchiveRow) -> Result<Self, Self::Error> {
        let archive_reason = ArchiveReason::parse(&row.archive_reason).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "archive {} has reason '{}'",
                row.id, row.archive_reason
            ))
        })?;

        Ok(ArchivedSubmission {
            created_at: parse_timestamp(&row.created_at)?,
            archived_at: parse_timestamp(&row.archived_at)?,
            archive_reason,
            id: row.id,
            submission_id: row.submission_id,
            user_id: row.user_id,
            username: row.username,
            code: row.code,
            message: row.message,
            extra_mention: row.extra_mention,
            image_data: row.image_data,
            image_filename: row.image_filename,
        })
    }
}

impl TryFrom<OpponentRow> for OpponentDefense {
    type Error = StoreError;

    fn try_from(row: OpponentRow) -> Result<Self, Self::Error> {
        let status = DefenseStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "opponent defense {} has status '{}'",
                row.id, row.status
            ))
        })?;

        if status == DefenseStatus::Approved
            && (row.number.is_none() || row.processed_image.is_none())
        {
            return Err(StoreError::Corrupt(format!(
                "opponent defense {} is approved without number or processed image",
                row.id
            )));
        }

        Ok(OpponentDefense {
            created_at: parse_timestamp(&row.created_at)?,
            status,
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            image_data: row.image_data,
            image_filename: row.image_filename,
            processed_image: row.processed_image,
            number: row.number,
            published: row.published,
        })
    }
}

/// Fixed-width RFC 3339 with microseconds, so text order equals time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's CURRENT_TIMESTAMP form, no timezone. Treated as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

/// Blank optional text is stored as NULL.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
