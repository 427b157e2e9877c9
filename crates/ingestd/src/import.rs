use std::collections::HashMap;
use std::sync::Arc;

use library::{run_import, ImportMode, ImportProgress, ImportSummary};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::watch::configure_watcher;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Initializing,
    Parsing,
    Success,
    Failed,
}

impl ImportStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ImportStatus::Initializing | ImportStatus::Parsing)
    }
}

/// Snapshot of one import run, as polled by callers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTask {
    pub id: String,
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file_name: Option<String>,
    pub mode: ImportMode,
}

#[derive(Debug)]
pub enum ImportError {
    AlreadyRunning(String),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::AlreadyRunning(id) => write!(f, "import {} is already running", id),
        }
    }
}

impl std::error::Error for ImportError {}

/// Task table. At most one task is INITIALIZING or PARSING at a time.
#[derive(Clone, Default)]
pub struct ImportTracker {
    inner: Arc<RwLock<TrackerInner>>,
}

#[derive(Default)]
struct TrackerInner {
    tasks: HashMap<String, ImportTask>,
    running: Option<String>,
}

impl ImportTracker {
    pub fn begin(&self, mode: ImportMode) -> Result<ImportTask, ImportError> {
        let mut inner = self.inner.write();
        if let Some(id) = inner.running.as_ref() {
            return Err(ImportError::AlreadyRunning(id.clone()));
        }
        let task = ImportTask {
            id: Uuid::new_v4().to_string(),
            status: ImportStatus::Initializing,
            message: None,
            total: None,
            current: None,
            current_file_name: None,
            mode,
        };
        inner.running = Some(task.id.clone());
        inner.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Option<ImportTask> {
        self.inner.read().tasks.get(id).cloned()
    }

    pub fn running(&self) -> Option<ImportTask> {
        let inner = self.inner.read();
        let id = inner.running.as_ref()?;
        inner
            .tasks
            .get(id)
            .filter(|task| task.status.is_running())
            .cloned()
    }

    pub fn succeed(&self, id: &str) {
        self.finish(id, ImportStatus::Success, None);
    }

    pub fn fail(&self, id: &str, message: String) {
        self.finish(id, ImportStatus::Failed, Some(message));
    }

    fn finish(&self, id: &str, status: ImportStatus, message: Option<String>) {
        let mut inner = self.inner.write();
        if let Some(task) = inner.tasks.get_mut(id) {
            task.status = status;
            task.message = message;
        }
        if inner.running.as_deref() == Some(id) {
            inner.running = None;
        }
    }

    fn update<F: FnOnce(&mut ImportTask)>(&self, id: &str, f: F) {
        if let Some(task) = self.inner.write().tasks.get_mut(id) {
            f(task);
        }
    }
}

/// Feeds scanner progress into the task table.
struct TaskProgress {
    tracker: ImportTracker,
    id: String,
}

impl ImportProgress for TaskProgress {
    fn started(&mut self, total: usize) {
        self.tracker.update(&self.id, |task| {
            task.status = ImportStatus::Parsing;
            task.total = Some(total);
            task.current = Some(0);
        });
    }

    fn file(&mut self, name: &str) {
        self.tracker.update(&self.id, |task| {
            task.current_file_name = Some(name.to_string());
        });
    }

    fn advanced(&mut self, current: usize) {
        self.tracker.update(&self.id, |task| {
            task.current = Some(current);
        });
    }
}

/// Starts an import in the background and returns its initial snapshot.
/// The watcher is off while the task runs and is re-armed on success.
pub fn create_task(state: &AppState, mode: ImportMode) -> Result<ImportTask, ImportError> {
    let task = state.tasks.begin(mode)?;
    *state.watcher.write() = None;
    info!("Import {} queued ({})", task.id, mode.as_str());

    let state = state.clone();
    let id = task.id.clone();
    tokio::spawn(async move {
        run_task(state, id, mode).await;
    });
    Ok(task)
}

pub fn get_task(state: &AppState, id: &str) -> Option<ImportTask> {
    state.tasks.get(id)
}

pub fn running_task(state: &AppState) -> Option<ImportTask> {
    state.tasks.running()
}

async fn run_task(state: AppState, id: String, mode: ImportMode) {
    let catalog = state.catalog.clone();
    let scanner = state.scanner.clone();
    let roots = state.roots.clone();
    let hash_window = state.hash_window();
    let mut progress = TaskProgress {
        tracker: state.tasks.clone(),
        id: id.clone(),
    };

    let result = tokio::task::spawn_blocking(move || {
        run_import(&catalog, &scanner, &roots, hash_window, mode, &mut progress)
    })
    .await;

    match result {
        Ok(Ok(summary)) => {
            state.tasks.succeed(&id);
            log_summary(&id, &summary);
            configure_watcher(&state);
        }
        Ok(Err(err)) => {
            warn!("Import {} failed: {}", id, err);
            state.tasks.fail(&id, err.to_string());
        }
        Err(err) => {
            warn!("Import {} join error: {}", id, err);
            state.tasks.fail(&id, err.to_string());
        }
    }

    if let Some(task) = state.tasks.get(&id) {
        if let Ok(json) = serde_json::to_string(&task) {
            info!("Import task: {}", json);
        }
    }
}

fn log_summary(id: &str, summary: &ImportSummary) {
    info!(
        "Import {} complete: {} active tracks, {} active albums, {} active artists, {} folders",
        id,
        summary.stats.active_tracks,
        summary.stats.active_albums,
        summary.stats.active_artists,
        summary.stats.folders
    );
}
