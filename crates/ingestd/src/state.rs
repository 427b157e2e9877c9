use std::path::Path;
use std::sync::Arc;

use common::MediaRoots;
use library::{Catalog, Scanner};
use notify::RecommendedWatcher;
use parking_lot::RwLock;

use crate::config::IngestConfig;
use crate::import::ImportTracker;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<IngestConfig>>,
    pub catalog: Catalog,
    pub roots: MediaRoots,
    pub scanner: Scanner,
    pub tasks: ImportTracker,
    /// Dropping the watcher closes its event channel and ends the watch loop.
    pub watcher: Arc<RwLock<Option<RecommendedWatcher>>>,
}

impl AppState {
    pub fn new(
        config_path: &Path,
        config: IngestConfig,
        catalog: Catalog,
        scanner: Scanner,
    ) -> Self {
        let roots = config.media_roots(config_path);
        Self {
            config: Arc::new(RwLock::new(config)),
            catalog,
            roots,
            scanner,
            tasks: ImportTracker::default(),
            watcher: Arc::new(RwLock::new(None)),
        }
    }

    pub fn hash_window(&self) -> u64 {
        self.config.read().hash_window()
    }
}
