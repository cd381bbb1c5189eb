use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use bulwark_db::Database;
use bulwark_gateway::{ChannelSender, DirectSender};
use bulwark_types::api::PublishReport;
use bulwark_types::models::{OpponentDefense, Submission};
use bulwark_types::outbound::{Attachment, OutboundMessage};

use crate::WorkflowError;
use crate::announcements::{self, CODE_THREAD_TITLE, SEPARATOR};

/// Pacing between consecutive items of a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchPolicy {
    pub inter_item_delay: Duration,
}

impl DispatchPolicy {
    pub fn paced(delay: Duration) -> Self {
        Self {
            inter_item_delay: delay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub submissions: DispatchPolicy,
    pub opponents: DispatchPolicy,
    pub thread_title: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            submissions: DispatchPolicy::default(),
            opponents: DispatchPolicy::paced(Duration::from_millis(500)),
            thread_title: CODE_THREAD_TITLE.to_string(),
        }
    }
}

/// Emits every eligible item to an output channel and marks it published.
///
/// Only one batch runs at a time, whichever entry point started it. Items are
/// sent sequentially; a failing item is logged and skipped, and the report
/// counts only items that were both sent and marked.
pub struct BulkPublisher {
    db: Arc<Database>,
    channels: Arc<dyn ChannelSender>,
    direct: Arc<dyn DirectSender>,
    config: PublisherConfig,
    in_progress: Mutex<()>,
}

impl BulkPublisher {
    pub fn new(
        db: Arc<Database>,
        channels: Arc<dyn ChannelSender>,
        direct: Arc<dyn DirectSender>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            db,
            channels,
            direct,
            config,
            in_progress: Mutex::new(()),
        }
    }

    pub fn is_publishing(&self) -> bool {
        self.in_progress.try_lock().is_err()
    }

    /// Publish all pending submissions, oldest first.
    pub async fn publish_submissions(&self, channel_id: &str, season: &str) -> PublishReport {
        let Ok(_guard) = self.in_progress.try_lock() else {
            warn!("Publish to {} refused: another batch is running", channel_id);
            return PublishReport::failed(WorkflowError::PublishInProgress.to_string());
        };

        info!("Starting submission publish to {} (season {})", channel_id, season);
        match self.run_submissions(channel_id, season).await {
            Ok(report) => report,
            Err(e) => {
                error!("Submission publish to {} aborted: {}", channel_id, e);
                PublishReport::failed(e.to_string())
            }
        }
    }

    /// Publish every approved opponent defense that has not been sent yet.
    pub async fn publish_opponents(&self, channel_id: &str, season: &str) -> PublishReport {
        let Ok(_guard) = self.in_progress.try_lock() else {
            warn!("Opponent publish to {} refused: another batch is running", channel_id);
            return PublishReport::failed(WorkflowError::PublishInProgress.to_string());
        };

        info!("Starting opponent publish to {} (season {})", channel_id, season);
        match self.run_opponents(channel_id, season).await {
            Ok(report) => report,
            Err(e) => {
                error!("Opponent publish to {} aborted: {}", channel_id, e);
                PublishReport::failed(e.to_string())
            }
        }
    }

    async fn run_submissions(
        &self,
        channel_id: &str,
        season: &str,
    ) -> Result<PublishReport, WorkflowError> {
        if !self.channels.channel_exists(channel_id).await? {
            return Ok(PublishReport::failed(format!("Channel {} not found", channel_id)));
        }

        let pending = self.store(|db| db.list_pending()).await?;
        if pending.is_empty() {
            info!("No submissions to publish");
            return Ok(PublishReport::failed("No submissions to publish."));
        }

        self.channels
            .send(channel_id, &OutboundMessage::text(announcements::submission_intro(season)))
            .await?;

        let ordinals = per_user_ordinals(&pending);
        let mut published = 0;
        for (i, (sub, ordinal)) in pending.iter().zip(ordinals).enumerate() {
            if i > 0 {
                pace(self.config.submissions).await;
            }
            match self.publish_submission(channel_id, sub, ordinal).await {
                Ok(()) => {
                    published += 1;
                    info!("Published submission {} from {}", sub.id, sub.username);
                    self.acknowledge(&sub.user_id, &announcements::submission_published_ack(channel_id))
                        .await;
                }
                Err(e) => error!("Error publishing submission {}: {}", sub.id, e),
            }
        }

        info!("Submission publish finished: {}/{}", published, pending.len());
        Ok(PublishReport::completed(pending.len(), published))
    }

    async fn publish_submission(
        &self,
        channel_id: &str,
        sub: &Submission,
        ordinal: Option<usize>,
    ) -> Result<(), WorkflowError> {
        let mut message = OutboundMessage::text(announcements::submission_caption(sub, ordinal));
        if let Some(data) = &sub.image_data {
            let filename = sub.image_filename.as_deref().unwrap_or("image.png");
            message = message.with_file(Attachment::new(filename, data.clone()));
        }

        let posted = self.channels.send(channel_id, &message).await?;
        let thread = self
            .channels
            .start_thread(&posted, &self.config.thread_title)
            .await?;
        self.channels
            .send_to_thread(&thread, &OutboundMessage::text(sub.code.clone()))
            .await?;

        let id = sub.id;
        self.store(move |db| db.mark_published(id)).await?;
        Ok(())
    }

    async fn run_opponents(
        &self,
        channel_id: &str,
        season: &str,
    ) -> Result<PublishReport, WorkflowError> {
        if !self.channels.channel_exists(channel_id).await? {
            return Ok(PublishReport::failed(format!("Channel {} not found", channel_id)));
        }

        let approved = self
            .store(|db| db.list_publishable_opponent_defenses())
            .await?;
        if approved.is_empty() {
            info!("No opponent defenses to publish");
            return Ok(PublishReport::failed("No approved opponent defenses to publish."));
        }

        self.channels
            .send(channel_id, &OutboundMessage::text(announcements::opponents_opening(season)))
            .await?;
        self.send_trailer(channel_id, SEPARATOR).await;

        let mut published = 0;
        for (i, def) in approved.iter().enumerate() {
            if i > 0 {
                pace(self.config.opponents).await;
            }
            match self.publish_opponent(channel_id, def).await {
                Ok(number) => {
                    published += 1;
                    info!("Published opponent defense {} as #{}", def.id, number);
                    self.acknowledge(
                        &def.user_id,
                        &announcements::opponent_published_ack(number, channel_id),
                    )
                    .await;
                }
                Err(e) => error!("Error publishing opponent defense {}: {}", def.id, e),
            }
        }

        self.send_trailer(channel_id, SEPARATOR).await;
        self.send_trailer(channel_id, &announcements::opponents_closing())
            .await;

        info!("Opponent publish finished: {}/{}", published, approved.len());
        Ok(PublishReport::completed(approved.len(), published))
    }

    async fn publish_opponent(
        &self,
        channel_id: &str,
        def: &OpponentDefense,
    ) -> Result<i64, WorkflowError> {
        let number = def.number.ok_or_else(|| {
            WorkflowError::Validation(format!("opponent defense {} has no number", def.id))
        })?;
        let image = def.processed_image.as_ref().unwrap_or(&def.image_data);
        let attachment = Attachment::new(format!("defense_{}.png", number), image.clone());

        self.channels
            .send(channel_id, &OutboundMessage::file(attachment))
            .await?;

        let id = def.id;
        self.store(move |db| db.mark_opponent_published(id)).await?;
        Ok(number)
    }

    async fn send_trailer(&self, channel_id: &str, text: &str) {
        if let Err(e) = self
            .channels
            .send(channel_id, &OutboundMessage::text(text))
            .await
        {
            warn!("Could not post announcement to {}: {}", channel_id, e);
        }
    }

    async fn acknowledge(&self, user_id: &str, content: &str) {
        if let Err(e) = self.direct.send_direct(user_id, content).await {
            warn!("Could not DM user {}: {}", user_id, e);
        }
    }

    async fn store<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&Database) -> bulwark_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        crate::blocking(&self.db, f).await
    }
}

async fn pace(policy: DispatchPolicy) {
    if !policy.inter_item_delay.is_zero() {
        tokio::time::sleep(policy.inter_item_delay).await;
    }
}

/// `Some(n)` for the n-th item of a user who has several items in the batch,
/// `None` for users with a single item.
fn per_user_ordinals(items: &[Submission]) -> Vec<Option<usize>> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for sub in items {
        *totals.entry(sub.user_id.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    items
        .iter()
        .map(|sub| {
            let n = seen.entry(sub.user_id.as_str()).or_default();
            *n += 1;
            (totals[sub.user_id.as_str()] > 1).then_some(*n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bulwark_db::{NewOpponentDefense, NewSubmission};
    use bulwark_gateway::{MemoryTransport, SentRecord};

    use super::*;

    struct Fixture {
        db: Arc<Database>,
        transport: Arc<MemoryTransport>,
        publisher: BulkPublisher,
    }

    fn fixture(transport: MemoryTransport) -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let transport = Arc::new(transport);
        let publisher = BulkPublisher::new(
            db.clone(),
            transport.clone(),
            transport.clone(),
            PublisherConfig::default(),
        );
        Fixture {
            db,
            transport,
            publisher,
        }
    }

    fn submit(db: &Database, user: &str, code: &str) -> i64 {
        db.insert_submission(&NewSubmission {
            user_id: user.into(),
            username: user.into(),
            code: code.into(),
            image_data: Some(vec![1, 2, 3]),
            image_filename: Some("shot.png".into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn approved_defense(db: &Database, user: &str) -> i64 {
        let id = db
            .insert_opponent_defense(&NewOpponentDefense {
                user_id: user.into(),
                username: user.into(),
                image_data: vec![7],
                image_filename: None,
            })
            .unwrap();
        let number = db.next_opponent_number().unwrap();
        db.approve_opponent_defense(id, &[number as u8], number)
            .unwrap();
        id
    }

    fn captions(transport: &MemoryTransport) -> Vec<String> {
        transport
            .channel_messages()
            .into_iter()
            .skip(1)
            .filter_map(|(_, m)| m.content)
            .collect()
    }

    #[tokio::test]
    async fn ordinals_only_for_users_with_several_items() {
        let f = fixture(MemoryTransport::accepting_all());
        submit(&f.db, "A", "a1");
        submit(&f.db, "B", "b1");
        submit(&f.db, "A", "a2");
        submit(&f.db, "B", "b2");
        submit(&f.db, "B", "b3");
        submit(&f.db, "C", "c1");

        let report = f.publisher.publish_submissions("out", "158").await;

        assert!(report.success);
        assert_eq!(report.published_count, 6);
        assert_eq!(
            captions(&f.transport),
            vec!["<@A> - 1", "<@B> - 1", "<@A> - 2", "<@B> - 2", "<@B> - 3", "<@C>"]
        );
        assert!(f.db.list_pending().unwrap().is_empty());
        assert_eq!(f.db.list_archived().unwrap().len(), 6);
        assert_eq!(f.transport.direct_messages().len(), 6);
    }

    #[tokio::test]
    async fn each_item_gets_a_code_thread() {
        let f = fixture(MemoryTransport::accepting_all());
        submit(&f.db, "A", "CODE-123");

        f.publisher.publish_submissions("out", "158").await;

        let sent = f.transport.sent();
        assert!(matches!(
            &sent[0],
            SentRecord::Channel { message, .. }
                if message.content.as_deref().is_some_and(|c| c.contains("s158"))
        ));
        assert!(matches!(
            &sent[1],
            SentRecord::Channel { message, .. } if message.files[0].filename == "shot.png"
        ));
        assert!(matches!(&sent[2], SentRecord::ThreadOpened { title, .. } if title == "Code"));
        assert!(matches!(
            &sent[3],
            SentRecord::Thread { message, .. } if message.content.as_deref() == Some("CODE-123")
        ));
    }

    #[tokio::test]
    async fn a_failed_item_stays_pending() {
        let transport = MemoryTransport::accepting_all();
        transport.fail_when_content_contains("<@B> - 2");
        let f = fixture(transport);
        submit(&f.db, "A", "a1");
        submit(&f.db, "A", "a2");
        submit(&f.db, "B", "b1");
        let failing = submit(&f.db, "B", "b2");
        submit(&f.db, "B", "b3");

        let report = f.publisher.publish_submissions("out", "158").await;

        assert!(report.success);
        assert_eq!(report.attempted, 5);
        assert_eq!(report.published_count, 4);
        let pending = f.db.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, failing);
        assert!(!f.db.get_submission(failing).unwrap().unwrap().published);
    }

    #[tokio::test]
    async fn dm_failures_do_not_count_against_the_batch() {
        let transport = MemoryTransport::accepting_all();
        transport.fail_direct_to("A");
        let f = fixture(transport);
        submit(&f.db, "A", "a1");

        let report = f.publisher.publish_submissions("out", "158").await;
        assert_eq!(report.published_count, 1);
    }

    #[tokio::test]
    async fn unknown_channel_or_empty_queue_fail_without_sending() {
        let f = fixture(MemoryTransport::with_channels(["out"]));

        let empty = f.publisher.publish_submissions("out", "158").await;
        assert!(!empty.success);
        assert_eq!(empty.error.as_deref(), Some("No submissions to publish."));

        submit(&f.db, "A", "a1");
        let missing = f.publisher.publish_submissions("elsewhere", "158").await;
        assert!(!missing.success);
        assert_eq!(missing.published_count, 0);
        assert!(f.transport.sent().is_empty());
        assert_eq!(f.db.list_pending().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn intro_failure_aborts_before_any_item() {
        let transport = MemoryTransport::accepting_all();
        transport.fail_channel_sends_from(0);
        let f = fixture(transport);
        submit(&f.db, "A", "a1");

        let report = f.publisher.publish_submissions("out", "158").await;

        assert!(!report.success);
        assert_eq!(report.published_count, 0);
        assert_eq!(f.db.list_pending().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_batch_is_refused_while_one_runs() {
        let f = fixture(MemoryTransport::accepting_all());
        submit(&f.db, "A", "a1");

        let _held = f.publisher.in_progress.try_lock().unwrap();
        assert!(f.publisher.is_publishing());

        let report = f.publisher.publish_submissions("out", "158").await;
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("publish already in progress"));
        assert_eq!(f.db.list_pending().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn opponents_publish_once_with_opening_and_closing() {
        let f = fixture(MemoryTransport::accepting_all());
        let first = approved_defense(&f.db, "A");
        approved_defense(&f.db, "B");
        f.db.insert_opponent_defense(&NewOpponentDefense {
            user_id: "C".into(),
            username: "C".into(),
            image_data: vec![9],
            image_filename: None,
        })
        .unwrap();

        let report = f.publisher.publish_opponents("out", "158").await;

        assert!(report.success);
        assert_eq!(report.published_count, 2);
        let messages = f.transport.channel_messages();
        assert_eq!(messages.len(), 6);
        assert!(messages[0].1.content.as_deref().is_some_and(|c| c.contains("SEASON 158")));
        assert_eq!(messages[2].1.files[0].filename, "defense_1.png");
        assert_eq!(messages[2].1.files[0].data, vec![1]);
        assert_eq!(messages[3].1.files[0].filename, "defense_2.png");
        assert!(f.db.get_opponent_defense(first).unwrap().unwrap().published);

        let again = f.publisher.publish_opponents("out", "158").await;
        assert!(!again.success);
        assert_eq!(f.transport.channel_messages().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn opponent_sends_are_paced() {
        let f = fixture(MemoryTransport::accepting_all());
        approved_defense(&f.db, "A");
        approved_defense(&f.db, "B");
        approved_defense(&f.db, "C");

        let started = tokio::time::Instant::now();
        f.publisher.publish_opponents("out", "158").await;

        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
