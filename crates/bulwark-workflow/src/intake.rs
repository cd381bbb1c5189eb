use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use bulwark_db::{NewOpponentDefense, NewSubmission};
use bulwark_gateway::ChannelSender;
use bulwark_types::api::IntakeCommand;
use bulwark_types::outbound::{Attachment, OutboundMessage};

use crate::{OpponentLifecycle, SubmissionLifecycle, WorkflowError, announcements};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Where a user is in the DM conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingCodeAndImage,
    AwaitingOpponentImages { received: usize },
}

struct SessionEntry {
    state: SessionState,
    touched: Instant,
}

/// Per-user DM conversation state. Entries untouched for longer than the TTL
/// read as `Idle`.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, user_id: &str) -> SessionState {
        self.lock()
            .get(user_id)
            .filter(|e| e.touched.elapsed() < self.ttl)
            .map(|e| e.state)
            .unwrap_or_default()
    }

    pub fn set(&self, user_id: &str, state: SessionState) {
        let mut sessions = self.lock();
        if state == SessionState::Idle {
            sessions.remove(user_id);
            return;
        }
        sessions.insert(
            user_id.to_string(),
            SessionEntry {
                state,
                touched: Instant::now(),
            },
        );
    }

    pub fn clear(&self, user_id: &str) {
        self.lock().remove(user_id);
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, e| e.touched.elapsed() < self.ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct IncomingAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl IncomingAttachment {
    pub fn is_image(&self) -> bool {
        if let Some(ct) = &self.content_type {
            return ct.starts_with("image/");
        }
        self.filename
            .rsplit_once('.')
            .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }
}

/// One direct message from a player.
#[derive(Debug, Clone, Default)]
pub struct IncomingDm {
    pub user_id: String,
    pub username: String,
    pub content: Option<String>,
    pub command: Option<IntakeCommand>,
    pub attachments: Vec<IncomingAttachment>,
}

impl IncomingDm {
    fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn images(&self) -> impl Iterator<Item = &IncomingAttachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }
}

/// Turns player DMs into pending submissions and opponent defenses, and
/// produces the reply text for each one.
pub struct IntakeHandler {
    submissions: SubmissionLifecycle,
    opponents: OpponentLifecycle,
    sessions: Arc<SessionStore>,
    notifier: Option<(Arc<dyn ChannelSender>, String)>,
}

impl IntakeHandler {
    pub fn new(
        submissions: SubmissionLifecycle,
        opponents: OpponentLifecycle,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            submissions,
            opponents,
            sessions,
            notifier: None,
        }
    }

    /// Post a notice for every new submission to `channel_id`.
    pub fn with_admin_channel(
        mut self,
        channels: Arc<dyn ChannelSender>,
        channel_id: impl Into<String>,
    ) -> Self {
        self.notifier = Some((channels, channel_id.into()));
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn handle(&self, dm: IncomingDm) -> Result<String, WorkflowError> {
        let state = self.sessions.get(&dm.user_id);
        let command = dm.command.or_else(|| match state {
            SessionState::AwaitingOpponentImages { .. } => text_command(dm.text()),
            _ => None,
        });
        debug!("DM from {} in {:?} (command {:?})", dm.user_id, state, command);

        match (command, state) {
            (Some(IntakeCommand::StartSubmission), _) => {
                self.sessions
                    .set(&dm.user_id, SessionState::AwaitingCodeAndImage);
                Ok(announcements::submission_prompt())
            }
            (Some(IntakeCommand::StartOpponents), _) => {
                self.sessions
                    .set(&dm.user_id, SessionState::AwaitingOpponentImages { received: 0 });
                Ok(announcements::opponents_prompt())
            }
            (Some(IntakeCommand::Cancel), SessionState::Idle) => {
                Ok(announcements::nothing_in_progress())
            }
            (Some(IntakeCommand::Cancel), _) => {
                self.sessions.clear(&dm.user_id);
                Ok(announcements::cancelled())
            }
            (Some(IntakeCommand::Done), SessionState::AwaitingOpponentImages { received }) => {
                self.sessions.clear(&dm.user_id);
                info!("{} finished opponent intake with {} image(s)", dm.username, received);
                Ok(announcements::opponents_finished(received))
            }
            (Some(IntakeCommand::Done), _) => Ok(announcements::nothing_in_progress()),
            (None, SessionState::AwaitingOpponentImages { received }) => {
                self.take_opponent_images(dm, received).await
            }
            (None, _) => self.take_submission(dm).await,
        }
    }

    async fn take_submission(&self, dm: IncomingDm) -> Result<String, WorkflowError> {
        let Some(image) = dm.images().next().cloned() else {
            return Ok(announcements::missing_image());
        };
        let Some(code) = dm.text().map(str::to_string) else {
            return Ok(announcements::missing_code());
        };

        let new = NewSubmission {
            user_id: dm.user_id.clone(),
            username: dm.username.clone(),
            code: code.clone(),
            image_data: Some(image.data.clone()),
            image_filename: Some(image.filename.clone()),
            ..Default::default()
        };
        let submissions = self.submissions.clone();
        let id = tokio::task::spawn_blocking(move || submissions.submit(&new)).await??;
        self.sessions.clear(&dm.user_id);

        self.notify_admins(id, &dm, &code, &image).await;
        Ok(announcements::submission_receipt(id, &code))
    }

    async fn take_opponent_images(
        &self,
        dm: IncomingDm,
        received: usize,
    ) -> Result<String, WorkflowError> {
        let images: Vec<NewOpponentDefense> = dm
            .images()
            .map(|a| NewOpponentDefense {
                user_id: dm.user_id.clone(),
                username: dm.username.clone(),
                image_data: a.data.clone(),
                image_filename: Some(a.filename.clone()),
            })
            .collect();
        if images.is_empty() {
            // Still counts as activity.
            self.sessions
                .set(&dm.user_id, SessionState::AwaitingOpponentImages { received });
            return Ok(announcements::opponents_need_image());
        }

        // Stored all or nothing.
        let opponents = self.opponents.clone();
        let added = tokio::task::spawn_blocking(move || opponents.submit(&images))
            .await??
            .len();

        let total = received + added;
        self.sessions
            .set(&dm.user_id, SessionState::AwaitingOpponentImages { received: total });
        info!("{} sent {} opponent defense image(s)", dm.username, added);
        Ok(announcements::opponents_received(added, total))
    }

    async fn notify_admins(
        &self,
        id: i64,
        dm: &IncomingDm,
        code: &str,
        image: &IncomingAttachment,
    ) {
        let Some((channels, channel_id)) = &self.notifier else {
            return;
        };

        let result = async {
            let notice = OutboundMessage::text(announcements::admin_notification(
                id,
                &dm.user_id,
                &dm.username,
            ))
            .with_file(Attachment::new(image.filename.clone(), image.data.clone()));
            let posted = channels.send(channel_id, &notice).await?;
            let thread = channels
                .start_thread(&posted, &format!("Code - {}", dm.username))
                .await?;
            channels
                .send_to_thread(
                    &thread,
                    &OutboundMessage::file(Attachment::new(image.filename.clone(), image.data.clone())),
                )
                .await?;
            channels
                .send_to_thread(&thread, &OutboundMessage::text(format!("```\n{}\n```", code)))
                .await
        }
        .await;

        if let Err(e) = result {
            warn!("Error sending admin notification for submission {}: {}", id, e);
        }
    }
}

fn text_command(text: Option<&str>) -> Option<IntakeCommand> {
    match text?.to_ascii_lowercase().as_str() {
        "done" => Some(IntakeCommand::Done),
        "cancel" => Some(IntakeCommand::Cancel),
        _ => None,
    }
}
