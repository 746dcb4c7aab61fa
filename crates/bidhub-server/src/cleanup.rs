use std::time::Duration;

use tracing::{info, warn};

use bidhub_api::AppState;
use bidhub_db::encode_timestamp;

/// Background task that prunes expired password reset tokens.
///
/// Only removes tokens that can no longer validate; live tokens are never
/// touched or extended.
pub async fn run_token_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match prune_expired(state.clone()).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} expired reset tokens", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

async fn prune_expired(state: AppState) -> anyhow::Result<usize> {
    let now = encode_timestamp(state.clock.now());
    tokio::task::spawn_blocking(move || state.db.prune_expired_reset_tokens(&now)).await?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bidhub_api::AppStateInner;
    use bidhub_api::clock::ManualClock;
    use bidhub_api::email::RecordingEmailSender;
    use bidhub_api::images::DiskImageStore;
    use bidhub_db::Database;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn prunes_only_expired_tokens() {
        let uploads = tempfile::tempdir().unwrap();
        let images = DiskImageStore::new(uploads.path().to_path_buf(), "http://test/uploads")
            .await
            .unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test".into(),
            public_url: "http://test".into(),
            clock: Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap())),
            email: Arc::new(RecordingEmailSender::new()),
            images: Arc::new(images),
        });
        state
            .db
            .create_reset_token("old", "a@b.com", "2026-03-01T12:00:00.000Z", "2026-02-28T12:00:00.000Z")
            .unwrap();
        state
            .db
            .create_reset_token("live", "a@b.com", "2026-03-02T12:00:00.000Z", "2026-03-01T12:00:00.000Z")
            .unwrap();

        assert_eq!(prune_expired(state.clone()).await.unwrap(), 1);
        assert!(state.db.find_reset_token("old").unwrap().is_none());
        assert!(state.db.find_reset_token("live").unwrap().is_some());
    }
}
