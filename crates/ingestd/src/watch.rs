use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use library::{Reconciler, Scanner};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::state::AppState;

/// Last thing seen on a path inside the debounce window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Change {
    Created,
    Modified,
    Removed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    change: Change,
    deadline: Instant,
}

/// What a settled path turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Add,
    Change,
    Unlink,
    AddDirectory,
    Ignore,
}

/// Arms the watcher on every existing root with a fresh reconciliation
/// session. Replaces any watcher already running.
pub fn configure_watcher(state: &AppState) {
    let config = state.config.read().clone();
    if !config.watch_enabled {
        info!("Watcher disabled (watch_enabled=false)");
        *state.watcher.write() = None;
        return;
    }

    let roots: Vec<PathBuf> = [state.roots.music.clone(), state.roots.audiobook.clone()]
        .into_iter()
        .filter(|root| root.is_dir())
        .collect();
    if roots.is_empty() {
        warn!("No media roots exist; watcher not started");
        *state.watcher.write() = None;
        return;
    }

    let debounce = config.debounce();
    let reconciler = Reconciler::new(state.catalog.clone(), state.roots.clone())
        .with_hash_window(config.hash_window());
    let session = Arc::new(Mutex::new(reconciler));

    match setup_watcher(&roots, session, state.scanner.clone(), debounce) {
        Ok(watcher) => {
            info!(
                "Watching {:?} for changes (debounce {}ms)",
                roots,
                debounce.as_millis()
            );
            *state.watcher.write() = Some(watcher);
        }
        Err(err) => {
            warn!("Failed to start watcher: {}", err);
            *state.watcher.write() = None;
        }
    }
}

fn setup_watcher(
    roots: &[PathBuf],
    session: Arc<Mutex<Reconciler>>,
    scanner: Scanner,
    debounce: Duration,
) -> Result<RecommendedWatcher, notify::Error> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(err) => warn!("Watch error: {}", err),
        },
        NotifyConfig::default(),
    )?;

    for root in roots {
        watcher.watch(root, RecursiveMode::Recursive)?;
    }

    tokio::spawn(async move {
        watch_loop(session, scanner, rx, debounce).await;
        debug!("Watch loop stopped");
    });

    Ok(watcher)
}

async fn watch_loop(
    session: Arc<Mutex<Reconciler>>,
    scanner: Scanner,
    mut rx: UnboundedReceiver<Event>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, Pending> = HashMap::new();
    loop {
        let next_deadline = pending.values().map(|p| p.deadline).min();
        match next_deadline {
            None => match rx.recv().await {
                Some(event) => record_event(&mut pending, &event, Instant::now() + debounce),
                None => return,
            },
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        let due = take_due(&mut pending, Instant::now());
                        dispatch(&session, &scanner, due).await;
                    }
                    maybe_event = rx.recv() => {
                        match maybe_event {
                            Some(event) => record_event(&mut pending, &event, Instant::now() + debounce),
                            None => return,
                        }
                    }
                }
            }
        }
    }
}

/// Folds one notify event into the per-path pending map. Each touched path
/// gets its deadline pushed out; a create followed by writes stays a create.
fn record_event(pending: &mut HashMap<PathBuf, Pending>, event: &Event, deadline: Instant) {
    let changes: Vec<(&PathBuf, Change)> = match event.kind {
        EventKind::Create(_) => event.paths.iter().map(|p| (p, Change::Created)).collect(),
        EventKind::Remove(_) => event.paths.iter().map(|p| (p, Change::Removed)).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(|p| (p, Change::Removed)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push((from, Change::Removed));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((to, Change::Created));
            }
            changes
        }
        // To, or a rename whose side is unknown; existence decides later.
        EventKind::Modify(ModifyKind::Name(_)) => {
            event.paths.iter().map(|p| (p, Change::Created)).collect()
        }
        EventKind::Modify(_) => event.paths.iter().map(|p| (p, Change::Modified)).collect(),
        _ => Vec::new(),
    };

    for (path, change) in changes {
        let change = match (pending.get(path).map(|p| p.change), change) {
            (Some(Change::Created), Change::Modified) => Change::Created,
            (_, change) => change,
        };
        pending.insert(path.clone(), Pending { change, deadline });
    }
}

fn take_due(pending: &mut HashMap<PathBuf, Pending>, now: Instant) -> Vec<(PathBuf, Change)> {
    let due: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, p)| p.deadline <= now)
        .map(|(path, _)| path.clone())
        .collect();
    let mut out: Vec<(PathBuf, Change)> = due
        .into_iter()
        .filter_map(|path| pending.remove(&path).map(|p| (path, p.change)))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn route(change: Change, exists: bool, is_dir: bool) -> Route {
    if !exists {
        return Route::Unlink;
    }
    if is_dir {
        return match change {
            Change::Created => Route::AddDirectory,
            _ => Route::Ignore,
        };
    }
    match change {
        Change::Created | Change::Removed => Route::Add,
        Change::Modified => Route::Change,
    }
}

/// Routes a settled batch against the filesystem. Unlinks come first so a
/// moved file's old track is trashed before its new path is added, which
/// lets the add resurrect it.
fn plan(due: Vec<(PathBuf, Change)>) -> Vec<(PathBuf, Route)> {
    let mut routed: Vec<(PathBuf, Route)> = due
        .into_iter()
        .map(|(path, change)| {
            let target = route(change, path.exists(), path.is_dir());
            (path, target)
        })
        .collect();
    routed.sort_by(|a, b| {
        (a.1 != Route::Unlink, &a.0).cmp(&(b.1 != Route::Unlink, &b.0))
    });
    routed
}

async fn dispatch(session: &Arc<Mutex<Reconciler>>, scanner: &Scanner, due: Vec<(PathBuf, Change)>) {
    if due.is_empty() {
        return;
    }
    let session = Arc::clone(session);
    let scanner = scanner.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut reconciler = session.lock();
        for (path, target) in plan(due) {
            handle(&mut reconciler, &scanner, &path, target);
        }
    })
    .await;
    if let Err(err) = result {
        warn!("Watch handler join error: {}", err);
    }
}

fn handle(reconciler: &mut Reconciler, scanner: &Scanner, path: &Path, route: Route) {
    if reconciler.roots().classify(path).is_none() {
        debug!("Ignoring event outside media roots: {:?}", path);
        return;
    }
    match route {
        Route::Add if scanner.accepts(path) => {
            info!("[Watcher] File added: {:?}", path);
            if let Err(err) = reconciler.ingest(path, scanner) {
                warn!("Failed to add {:?}: {}", path, err);
            }
        }
        Route::Change if scanner.accepts(path) => {
            info!("[Watcher] File changed: {:?}", path);
            if let Err(err) = reconciler.refresh(path, scanner) {
                warn!("Failed to refresh {:?}: {}", path, err);
            }
        }
        Route::Unlink if scanner.accepts(path) => {
            info!("[Watcher] File removed: {:?}", path);
            if let Err(err) = reconciler.trash(path) {
                warn!("Failed to trash {:?}: {}", path, err);
            }
        }
        Route::Unlink => match reconciler.trash_directory(path) {
            Ok(0) => {}
            Ok(count) => info!("[Watcher] Directory removed: {:?} ({} tracks)", path, count),
            Err(err) => warn!("Failed to trash directory {:?}: {}", path, err),
        },
        Route::AddDirectory => {
            info!("[Watcher] Directory added: {:?}", path);
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_file() && scanner.accepts(entry.path()) {
                    if let Err(err) = reconciler.ingest(entry.path(), scanner) {
                        warn!("Failed to add {:?}: {}", entry.path(), err);
                    }
                }
            }
        }
        Route::Add | Route::Change | Route::Ignore => {}
    }
}
