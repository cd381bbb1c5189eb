use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use bulwark_db::Database;
use bulwark_types::api::{
    ArchivedSubmissionResponse, OpponentDefenseResponse, ReviewItem, ReviewMode, ReviewResponse,
    SubmissionResponse,
};

use crate::{WorkflowError, blocking};

struct ReviewView {
    mode: ReviewMode,
    items: Vec<ReviewItem>,
    cursor: usize,
    season: String,
    touched: Instant,
}

impl ReviewView {
    fn clamp(&mut self) {
        self.cursor = self.cursor.min(self.items.len().saturating_sub(1));
    }

    fn response(&self, review_id: Uuid) -> ReviewResponse {
        ReviewResponse {
            review_id,
            mode: self.mode,
            season: self.season.clone(),
            position: if self.items.is_empty() { 0 } else { self.cursor + 1 },
            total: self.items.len(),
            item: self.items.get(self.cursor).cloned(),
        }
    }
}

/// Admin paging state: a snapshot of one list plus a cursor. Snapshots are
/// only reloaded from the store on refresh or mode change.
pub struct ReviewSessions {
    db: Arc<Database>,
    views: Mutex<HashMap<Uuid, ReviewView>>,
    ttl: Duration,
    default_season: String,
}

impl ReviewSessions {
    pub fn new(db: Arc<Database>, ttl: Duration, default_season: impl Into<String>) -> Self {
        Self {
            db,
            views: Mutex::new(HashMap::new()),
            ttl,
            default_season: default_season.into(),
        }
    }

    pub async fn open(
        &self,
        mode: Option<ReviewMode>,
        season: Option<String>,
    ) -> Result<ReviewResponse, WorkflowError> {
        let mode = mode.unwrap_or_default();
        let items = self.load(mode).await?;
        let review_id = Uuid::new_v4();
        let view = ReviewView {
            mode,
            items,
            cursor: 0,
            season: season
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.default_season.clone()),
            touched: Instant::now(),
        };
        let response = view.response(review_id);
        self.lock().insert(review_id, view);
        debug!("Opened review {} in {:?} mode", review_id, mode);
        Ok(response)
    }

    pub fn view(&self, review_id: Uuid) -> Result<ReviewResponse, WorkflowError> {
        self.with_view(review_id, |_| {})
    }

    pub fn next(&self, review_id: Uuid) -> Result<ReviewResponse, WorkflowError> {
        self.with_view(review_id, |v| {
            v.cursor += 1;
            v.clamp();
        })
    }

    pub fn prev(&self, review_id: Uuid) -> Result<ReviewResponse, WorkflowError> {
        self.with_view(review_id, |v| v.cursor = v.cursor.saturating_sub(1))
    }

    pub fn set_season(&self, review_id: Uuid, season: &str) -> Result<ReviewResponse, WorkflowError> {
        let season = season.trim();
        if season.is_empty() {
            return Err(WorkflowError::Validation("season cannot be empty".into()));
        }
        self.with_view(review_id, |v| v.season = season.to_string())
    }

    /// Switch list and reset the cursor to the first item.
    pub async fn set_mode(
        &self,
        review_id: Uuid,
        mode: ReviewMode,
    ) -> Result<ReviewResponse, WorkflowError> {
        self.ensure_exists(review_id)?;
        let items = self.load(mode).await?;
        self.with_view(review_id, |v| {
            v.mode = mode;
            v.items = items;
            v.cursor = 0;
        })
    }

    /// Reload the current list, keeping the cursor where it can stay.
    pub async fn refresh(&self, review_id: Uuid) -> Result<ReviewResponse, WorkflowError> {
        let mode = self.with_view(review_id, |_| {})?.mode;
        let items = self.load(mode).await?;
        self.with_view(review_id, |v| {
            if v.mode == mode {
                v.items = items;
                v.clamp();
            }
        })
    }

    pub fn close(&self, review_id: Uuid) -> Result<(), WorkflowError> {
        self.lock()
            .remove(&review_id)
            .map(|_| ())
            .ok_or(WorkflowError::SessionNotFound(review_id))
    }

    pub fn prune_expired(&self) -> usize {
        let mut views = self.lock();
        let before = views.len();
        views.retain(|_, v| v.touched.elapsed() < self.ttl);
        before - views.len()
    }

    async fn load(&self, mode: ReviewMode) -> Result<Vec<ReviewItem>, WorkflowError> {
        blocking(&self.db, move |db| {
            Ok(match mode {
                ReviewMode::Pending => db
                    .list_pending()?
                    .iter()
                    .map(|s| ReviewItem::Submission(SubmissionResponse::from(s)))
                    .collect(),
                ReviewMode::Archive => db
                    .list_archived()?
                    .iter()
                    .map(|a| ReviewItem::Archived(ArchivedSubmissionResponse::from(a)))
                    .collect(),
                ReviewMode::OpponentsPending => db
                    .list_pending_opponent_defenses()?
                    .iter()
                    .map(|d| ReviewItem::Opponent(OpponentDefenseResponse::from(d)))
                    .collect(),
                ReviewMode::OpponentsApproved => db
                    .list_approved_opponent_defenses()?
                    .iter()
                    .map(|d| ReviewItem::Opponent(OpponentDefenseResponse::from(d)))
                    .collect(),
            })
        })
        .await
    }

    fn ensure_exists(&self, review_id: Uuid) -> Result<(), WorkflowError> {
        self.with_view(review_id, |_| {}).map(|_| ())
    }

    fn with_view<F>(&self, review_id: Uuid, f: F) -> Result<ReviewResponse, WorkflowError>
    where
        F: FnOnce(&mut ReviewView),
    {
        let mut views = self.lock();
        let view = views
            .get_mut(&review_id)
            .filter(|v| v.touched.elapsed() < self.ttl)
            .ok_or(WorkflowError::SessionNotFound(review_id))?;
        f(view);
        view.touched = Instant::now();
        Ok(view.response(review_id))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ReviewView>> {
        self.views.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use bulwark_db::NewSubmission;
    use bulwark_types::models::ArchiveReason;

    use super::*;

    fn setup(count: usize) -> (Arc<Database>, ReviewSessions) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for i in 0..count {
            db.insert_submission(&NewSubmission {
                user_id: "u".into(),
                username: "u".into(),
                code: format!("C{}", i),
                ..Default::default()
            })
            .unwrap();
        }
        let sessions = ReviewSessions::new(db.clone(), Duration::from_secs(600), "158");
        (db, sessions)
    }

    fn code(resp: &ReviewResponse) -> &str {
        match &resp.item {
            Some(ReviewItem::Submission(s)) => &s.code,
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[tokio::test]
    async fn cursor_is_clamped_at_both_ends() {
        let (_, r) = setup(2);
        let opened = r.open(None, None).await.unwrap();
        let id = opened.review_id;
        assert_eq!((opened.position, opened.total), (1, 2));
        assert_eq!(opened.season, "158");

        assert_eq!(r.prev(id).unwrap().position, 1);
        assert_eq!(code(&r.next(id).unwrap()), "C1");
        assert_eq!(r.next(id).unwrap().position, 2);
    }

    #[tokio::test]
    async fn refresh_clamps_after_removals() {
        let (db, r) = setup(3);
        let id = r.open(None, None).await.unwrap().review_id;
        r.next(id).unwrap();
        r.next(id).unwrap();

        let last = db.list_pending().unwrap()[2].id;
        db.delete_to_archive(last, ArchiveReason::Deleted).unwrap();

        // Snapshot is stale until refreshed.
        assert_eq!(r.view(id).unwrap().total, 3);
        let refreshed = r.refresh(id).await.unwrap();
        assert_eq!((refreshed.position, refreshed.total), (2, 2));
    }

    #[tokio::test]
    async fn switching_mode_resets_cursor() {
        let (db, r) = setup(2);
        let first = db.list_pending().unwrap()[0].id;
        db.delete_to_archive(first, ArchiveReason::Deleted).unwrap();

        let id = r.open(None, Some("200".into())).await.unwrap().review_id;
        let archive = r.set_mode(id, ReviewMode::Archive).await.unwrap();
        assert_eq!(archive.mode, ReviewMode::Archive);
        assert_eq!((archive.position, archive.total), (1, 1));
        assert!(matches!(archive.item, Some(ReviewItem::Archived(_))));
        assert_eq!(archive.season, "200");

        let empty = r.set_mode(id, ReviewMode::OpponentsPending).await.unwrap();
        assert_eq!((empty.position, empty.total), (0, 0));
        assert!(empty.item.is_none());
    }

    #[tokio::test]
    async fn unknown_and_closed_reviews() {
        let (_, r) = setup(0);
        let id = r.open(None, None).await.unwrap().review_id;
        assert!(matches!(r.set_season(id, " "), Err(WorkflowError::Validation(_))));
        assert_eq!(r.set_season(id, "159").unwrap().season, "159");

        r.close(id).unwrap();
        assert!(matches!(r.view(id), Err(WorkflowError::SessionNotFound(_))));
        assert!(matches!(
            r.set_mode(id, ReviewMode::Archive).await,
            Err(WorkflowError::SessionNotFound(_))
        ));
        assert!(r.close(id).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_reviews_expire() {
        let (_, r) = setup(1);
        let id = r.open(None, None).await.unwrap().review_id;
        tokio::time::advance(Duration::from_secs(601)).await;

        assert!(matches!(r.view(id), Err(WorkflowError::SessionNotFound(_))));
        assert_eq!(r.prune_expired(), 1);
    }
}
