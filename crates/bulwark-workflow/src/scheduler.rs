use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use bulwark_types::api::{ScheduleRequest, ScheduleStatus};

use crate::{BulkPublisher, WorkflowError};

struct ArmedJob {
    status: ScheduleStatus,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    job: Option<ArmedJob>,
    /// Bumped on every arm and stop. A timer only clears the slot if the
    /// generation it was armed with is still current.
    generation: u64,
}

/// Single-slot, one-shot publish timer. Arming a new job cancels the old one
/// under the same lock, so two timers are never live at once.
pub struct Scheduler {
    publisher: Arc<BulkPublisher>,
    default_channel: Option<String>,
    default_season: String,
    slot: Arc<Mutex<Slot>>,
}

impl Scheduler {
    pub fn new(
        publisher: Arc<BulkPublisher>,
        default_channel: Option<String>,
        default_season: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            default_channel,
            default_season: default_season.into(),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn schedule(&self, req: &ScheduleRequest) -> Result<ScheduleStatus, WorkflowError> {
        self.schedule_at(req, Utc::now())
    }

    /// Arm a publish for `req.date` `req.time` (UTC), replacing any armed job.
    /// `now` is the reference instant for the future check.
    pub fn schedule_at(
        &self,
        req: &ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<ScheduleStatus, WorkflowError> {
        let date = parse_date(&req.date)?;
        let time = parse_time(&req.time)?;
        let fires_at = date.and_time(time).and_utc();

        if fires_at <= now {
            return Err(WorkflowError::InvalidSchedule(format!(
                "{} {} UTC is not in the future",
                req.date,
                time.format("%H:%M")
            )));
        }

        let channel_id = req
            .channel_id
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.default_channel.clone())
            .ok_or_else(|| WorkflowError::Validation("no publish channel given or configured".into()))?;
        let season = req
            .season
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.default_season.clone());

        let delay = (fires_at - now)
            .to_std()
            .map_err(|e| WorkflowError::InvalidSchedule(e.to_string()))?;

        let status = ScheduleStatus {
            active: true,
            date: Some(date.format("%Y-%m-%d").to_string()),
            time: Some(time.format("%H:%M").to_string()),
            channel_id: Some(channel_id.clone()),
            season: Some(season.clone()),
            fires_at: Some(fires_at),
        };

        let mut slot = lock(&self.slot);
        if let Some(old) = slot.job.take() {
            old.handle.abort();
            info!("Replacing scheduled publish for {:?}", old.status.fires_at);
        }
        slot.generation += 1;
        let generation = slot.generation;

        let publisher = self.publisher.clone();
        let slot_ref = self.slot.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = lock(&slot_ref);
                if slot.generation != generation {
                    return;
                }
                // Cleared before publishing so a re-arm during the batch
                // cannot abort it.
                slot.job = None;
            }

            info!("Scheduled publish firing for channel {}", channel_id);
            let report = publisher.publish_submissions(&channel_id, &season).await;
            if report.success {
                info!(
                    "Scheduled publish done: {}/{} published",
                    report.published_count, report.attempted
                );
            } else {
                error!(
                    "Scheduled publish failed: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        });

        slot.job = Some(ArmedJob {
            status: status.clone(),
            handle,
        });
        info!(
            "Publish scheduled for {} UTC to {} (in {} minutes)",
            fires_at,
            status.channel_id.as_deref().unwrap_or_default(),
            delay.as_secs() / 60
        );
        Ok(status)
    }

    /// Cancel the armed job. Returns whether one was armed.
    pub fn stop(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        match slot.job.take() {
            Some(job) => {
                job.handle.abort();
                info!("Scheduled publish cancelled");
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> ScheduleStatus {
        lock(&self.slot)
            .job
            .as_ref()
            .map(|job| job.status.clone())
            .unwrap_or_default()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(job) = lock(&self.slot).job.take() {
            warn!("Scheduler dropped with an armed job; cancelling it");
            job.handle.abort();
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Strict `YYYY-MM-DD`.
fn parse_date(raw: &str) -> Result<NaiveDate, WorkflowError> {
    let invalid = || WorkflowError::Validation("Invalid date format! Use YYYY-MM-DD (e.g., 2025-12-15)".into());
    let bytes = raw.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())
}

/// `H:MM` or `HH:MM`, 24h.
fn parse_time(raw: &str) -> Result<NaiveTime, WorkflowError> {
    let invalid = || WorkflowError::Validation("Invalid time format! Use HH:MM (e.g., 22:30)".into());
    let (h, m) = raw.split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(1..=2).contains(&h.len()) || m.len() != 2 || !digits(h) || !digits(m) {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}
