use std::sync::Arc;

use bulwark_workflow::{
    BulkPublisher, IntakeHandler, OpponentLifecycle, ReviewSessions, Scheduler, SubmissionLifecycle,
};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub submissions: SubmissionLifecycle,
    pub opponents: OpponentLifecycle,
    pub publisher: Arc<BulkPublisher>,
    pub scheduler: Scheduler,
    pub intake: IntakeHandler,
    pub reviews: ReviewSessions,
    pub admin_token: String,
    /// Used when a publish request names no channel.
    pub publish_channel: Option<String>,
    pub default_season: String,
}

impl AppStateInner {
    pub fn channel_or_default(&self, requested: Option<String>) -> Option<String> {
        requested
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.publish_channel.clone())
    }

    pub fn season_or_default(&self, requested: Option<String>) -> String {
        requested
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.default_season.clone())
    }
}
