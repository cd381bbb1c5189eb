pub mod announcements;
pub mod error;
pub mod intake;
pub mod lifecycle;
pub mod opponents;
pub mod publisher;
pub mod review;
pub mod scheduler;

pub use error::WorkflowError;
pub use intake::{IncomingAttachment, IncomingDm, IntakeHandler, SessionState, SessionStore};
pub use lifecycle::SubmissionLifecycle;
pub use opponents::OpponentLifecycle;
pub use publisher::{BulkPublisher, DispatchPolicy, PublisherConfig};
pub use review::ReviewSessions;
pub use scheduler::Scheduler;

use std::sync::Arc;

use bulwark_db::Database;

/// Run a store call on the blocking pool.
pub(crate) async fn blocking<T, F>(db: &Arc<Database>, f: F) -> Result<T, WorkflowError>
where
    F: FnOnce(&Database) -> bulwark_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
}
