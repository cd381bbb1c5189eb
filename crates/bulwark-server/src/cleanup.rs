use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use bulwark_api::AppState;
use bulwark_workflow::SessionStore;

/// Background task that drops idle DM sessions and review sessions.
pub async fn run_cleanup_loop(state: AppState, sessions: Arc<SessionStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let dms = sessions.prune_expired();
        let reviews = state.reviews.prune_expired();
        if dms + reviews > 0 {
            debug!("Cleanup: pruned {} DM session(s), {} review(s)", dms, reviews);
        }
    }
}
