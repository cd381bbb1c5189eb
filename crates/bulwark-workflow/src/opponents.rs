use std::sync::Arc;

use tracing::{info, warn};

use bulwark_db::{Database, NewOpponentDefense};
use bulwark_imaging::ImageTransform;
use bulwark_types::api::{ApprovalFailure, ApproveAllReport, ApproveResponse};
use bulwark_types::models::{DefenseStatus, OpponentDefense};

use crate::WorkflowError;

/// Review of opponent-defense images:
///
/// ```text
/// PENDING --approve--> APPROVED(number, processed image) --publish--> PUBLISHED
/// PENDING --reject---> gone
/// APPROVED --remove--> gone
/// ```
#[derive(Clone)]
pub struct OpponentLifecycle {
    db: Arc<Database>,
    transform: Arc<dyn ImageTransform>,
}

impl OpponentLifecycle {
    pub fn new(db: Arc<Database>, transform: Arc<dyn ImageTransform>) -> Self {
        Self { db, transform }
    }

    /// Store a batch of uploaded images as pending defenses. Nothing is stored
    /// if any image is rejected.
    pub fn submit(&self, batch: &[NewOpponentDefense]) -> Result<Vec<i64>, WorkflowError> {
        let ids = self.db.insert_opponent_defenses(batch)?;
        for (id, new) in ids.iter().zip(batch) {
            info!("New opponent defense {} from {}", id, new.username);
        }
        Ok(ids)
    }

    pub fn pending(&self) -> Result<Vec<OpponentDefense>, WorkflowError> {
        Ok(self.db.list_pending_opponent_defenses()?)
    }

    pub fn approved(&self) -> Result<Vec<OpponentDefense>, WorkflowError> {
        Ok(self.db.list_approved_opponent_defenses()?)
    }

    pub fn get(&self, id: i64) -> Result<OpponentDefense, WorkflowError> {
        self.db
            .get_opponent_defense(id)?
            .ok_or(WorkflowError::NotFound {
                entity: "opponent defense",
                id,
            })
    }

    /// Number and process one pending defense. The number is drawn before the
    /// transform runs, so a failed transform burns it.
    pub fn approve(&self, id: i64) -> Result<ApproveResponse, WorkflowError> {
        let defense = self.get(id)?;
        if defense.status != DefenseStatus::Pending {
            return Err(WorkflowError::Validation(format!(
                "opponent defense {} is not pending",
                id
            )));
        }

        let number = self.db.next_opponent_number()?;
        let processed = self
            .transform
            .apply(&defense.image_data, number)
            .inspect_err(|e| warn!("Image processing failed for defense {} (#{}): {}", id, number, e))?;
        self.db.approve_opponent_defense(id, &processed, number)?;

        info!("Opponent defense {} approved as #{}", id, number);
        Ok(ApproveResponse { id, number })
    }

    /// Approve every pending defense in listing order. Each item stands on its
    /// own: a failure is recorded and the loop moves on.
    pub fn approve_all(&self) -> Result<ApproveAllReport, WorkflowError> {
        let pending = self.pending()?;
        let mut report = ApproveAllReport {
            attempted: pending.len(),
            ..Default::default()
        };

        for defense in &pending {
            match self.approve(defense.id) {
                Ok(approved) => report.approved.push(approved),
                Err(e) => report.failed.push(ApprovalFailure {
                    id: defense.id,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            "Approve all: {}/{} approved",
            report.approved.len(),
            report.attempted
        );
        Ok(report)
    }

    pub fn reject(&self, id: i64) -> Result<(), WorkflowError> {
        self.db.reject_opponent_defense(id)?;
        info!("Opponent defense {} removed", id);
        Ok(())
    }

    pub fn clear_all(&self) -> Result<usize, WorkflowError> {
        let removed = self.db.clear_all_opponent_defenses()?;
        info!("Cleared {} opponent defenses", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use bulwark_imaging::ImageError;

    use super::*;

    /// Appends the number to the input; refuses inputs starting with `bad`.
    struct Stamp;

    impl ImageTransform for Stamp {
        fn apply(&self, image: &[u8], number: i64) -> Result<Vec<u8>, ImageError> {
            if image.starts_with(b"bad") {
                return Err(ImageError::TooSmall {
                    width: 0,
                    height: 0,
                });
            }
            let mut out = image.to_vec();
            out.extend_from_slice(number.to_string().as_bytes());
            Ok(out)
        }
    }

    fn setup() -> (Arc<Database>, OpponentLifecycle) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let lc = OpponentLifecycle::new(db.clone(), Arc::new(Stamp));
        (db, lc)
    }

    fn submit(lc: &OpponentLifecycle, user: &str, image: &[u8]) -> i64 {
        lc.submit(&[NewOpponentDefense {
            user_id: user.into(),
            username: user.into(),
            image_data: image.to_vec(),
            image_filename: None,
        }])
        .unwrap()[0]
    }

    #[test]
    fn approve_stores_number_and_processed_image() {
        let (_, lc) = setup();
        let id = submit(&lc, "u1", b"img");

        let approved = lc.approve(id).unwrap();

        assert_eq!(approved.number, 1);
        let def = lc.get(id).unwrap();
        assert_eq!(def.status, DefenseStatus::Approved);
        assert_eq!(def.processed_image.as_deref(), Some(&b"img1"[..]));
        assert_eq!(def.image_data, b"img");
    }

    #[test]
    fn failed_transform_burns_the_number() {
        let (db, lc) = setup();
        let bad = submit(&lc, "u1", b"bad-img");
        let good = submit(&lc, "u2", b"img");

        assert!(matches!(
            lc.approve(bad).unwrap_err(),
            WorkflowError::ImageProcessing(_)
        ));
        assert_eq!(lc.get(bad).unwrap().status, DefenseStatus::Pending);
        assert_eq!(db.current_opponent_number().unwrap(), 1);

        assert_eq!(lc.approve(good).unwrap().number, 2);
    }

    #[test]
    fn approve_all_isolates_failures() {
        let (_, lc) = setup();
        let a = submit(&lc, "u1", b"a");
        let bad = submit(&lc, "u2", b"bad");
        let c = submit(&lc, "u3", b"c");

        let report = lc.approve_all().unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, bad);
        let approved_ids: Vec<i64> = report.approved.iter().map(|r| r.id).collect();
        assert_eq!(approved_ids, vec![a, c]);

        let numbers: Vec<i64> = report.approved.iter().map(|r| r.number).collect();
        assert!(numbers[0] < numbers[1]);

        let pending = lc.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, bad);
    }

    #[test]
    fn only_pending_can_be_approved() {
        let (_, lc) = setup();
        let id = submit(&lc, "u1", b"img");
        lc.approve(id).unwrap();
        assert!(matches!(
            lc.approve(id).unwrap_err(),
            WorkflowError::Validation(_)
        ));
        assert!(matches!(
            lc.approve(404).unwrap_err(),
            WorkflowError::NotFound { .. }
        ));
    }

    #[test]
    fn remove_and_clear() {
        let (_, lc) = setup();
        let a = submit(&lc, "u1", b"a");
        submit(&lc, "u2", b"b");
        lc.approve(a).unwrap();

        lc.reject(a).unwrap();
        assert!(lc.approved().unwrap().is_empty());
        assert_eq!(lc.clear_all().unwrap(), 1);
        assert!(lc.pending().unwrap().is_empty());
    }
}
