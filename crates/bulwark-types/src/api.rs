use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ArchiveReason, ArchivedSubmission, DefenseStatus, OpponentDefense, Submission};

// -- Submissions --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_filename: Option<String>,
    /// Base64 image bytes.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published: bool,
}

impl From<&Submission> for SubmissionResponse {
    fn from(sub: &Submission) -> Self {
        Self {
            id: sub.id,
            user_id: sub.user_id.clone(),
            username: sub.username.clone(),
            code: sub.code.clone(),
            message: sub.message.clone(),
            extra_mention: sub.extra_mention.clone(),
            image_filename: sub.image_filename.clone(),
            image: sub.image_data.as_deref().map(|b| B64.encode(b)),
            created_at: sub.created_at,
            published: sub.published,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub extra_mention: Option<String>,
}

// -- Archive --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedSubmissionResponse {
    pub id: i64,
    pub submission_id: i64,
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_filename: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub archive_reason: ArchiveReason,
    pub archived_at: DateTime<Utc>,
}

impl From<&ArchivedSubmission> for ArchivedSubmissionResponse {
    fn from(arch: &ArchivedSubmission) -> Self {
        Self {
            id: arch.id,
            submission_id: arch.submission_id,
            user_id: arch.user_id.clone(),
            username: arch.username.clone(),
            code: arch.code.clone(),
            message: arch.message.clone(),
            extra_mention: arch.extra_mention.clone(),
            image_filename: arch.image_filename.clone(),
            image: arch.image_data.as_deref().map(|b| B64.encode(b)),
            created_at: arch.created_at,
            archive_reason: arch.archive_reason,
            archived_at: arch.archived_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub archive_id: i64,
}

// -- Opponent defenses --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpponentDefenseResponse {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub image_filename: Option<String>,
    pub image: String,
    pub processed_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: DefenseStatus,
    pub number: Option<i64>,
    pub published: bool,
}

impl From<&OpponentDefense> for OpponentDefenseResponse {
    fn from(def: &OpponentDefense) -> Self {
        Self {
            id: def.id,
            user_id: def.user_id.clone(),
            username: def.username.clone(),
            image_filename: def.image_filename.clone(),
            image: B64.encode(&def.image_data),
            processed_image: def.processed_image.as_deref().map(|b| B64.encode(b)),
            created_at: def.created_at,
            status: def.status,
            number: def.number,
            published: def.published,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveResponse {
    pub id: i64,
    pub number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalFailure {
    pub id: i64,
    pub error: String,
}

/// Outcome of approving every pending opponent defense.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveAllReport {
    pub attempted: usize,
    pub approved: Vec<ApproveResponse>,
    pub failed: Vec<ApprovalFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub removed: usize,
}

// -- Publishing --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishRequest {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

/// Result of one bulk publish run. `published_count` counts items that were
/// actually sent and marked, never items merely attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub success: bool,
    pub published_count: usize,
    pub attempted: usize,
    pub error: Option<String>,
}

impl PublishReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            published_count: 0,
            attempted: 0,
            error: Some(error.into()),
        }
    }

    pub fn completed(attempted: usize, published_count: usize) -> Self {
        Self {
            success: true,
            published_count,
            attempted,
            error: None,
        }
    }
}

// -- Scheduling --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleRequest {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    /// `HH:MM`, 24h, UTC.
    pub time: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    pub active: bool,
    pub date: Option<String>,
    pub time: Option<String>,
    pub channel_id: Option<String>,
    pub season: Option<String>,
    pub fires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopScheduleResponse {
    pub stopped: bool,
}

// -- DM intake --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeCommand {
    StartSubmission,
    StartOpponents,
    Done,
    Cancel,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmEventRequest {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub command: Option<IntakeCommand>,
    #[serde(default)]
    pub attachments: Vec<DmAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DmAttachment {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Base64 file bytes.
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntakeResponse {
    pub reply: String,
}

// -- Review sessions --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    #[default]
    Pending,
    Archive,
    OpponentsPending,
    OpponentsApproved,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenReviewRequest {
    #[serde(default)]
    pub mode: Option<ReviewMode>,
    #[serde(default)]
    pub season: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetModeRequest {
    pub mode: ReviewMode,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetSeasonRequest {
    pub season: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewItem {
    Submission(SubmissionResponse),
    Archived(ArchivedSubmissionResponse),
    Opponent(OpponentDefenseResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub review_id: Uuid,
    pub mode: ReviewMode,
    pub season: String,
    /// 1-based position of the cursor; 0 when the list is empty.
    pub position: usize,
    pub total: usize,
    pub item: Option<ReviewItem>,
}
