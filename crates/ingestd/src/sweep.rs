use std::time::Duration;

use library::backfill_missing_hashes;
use tracing::{info, warn};

use crate::state::AppState;

/// Schedules the fingerprint backfill once, `delay` after startup. Failures
/// are logged and end the task; nothing is retried until the next start.
pub fn start_hash_sweep(state: AppState, delay: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!("Starting fingerprint sweep");
        let catalog = state.catalog.clone();
        let roots = state.roots.clone();
        let hash_window = state.hash_window();
        let result = tokio::task::spawn_blocking(move || {
            backfill_missing_hashes(&catalog, &roots, hash_window)
        })
        .await;
        match result {
            Ok(Ok(stats)) => info!(
                "Fingerprint sweep complete: {} of {} tracks hashed",
                stats.hashed, stats.candidates
            ),
            Ok(Err(err)) => warn!("Fingerprint sweep failed: {}", err),
            Err(err) => warn!("Fingerprint sweep join error: {}", err),
        }
    })
}
