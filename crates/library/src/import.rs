use std::time::Instant;

use common::{MediaRoots, MediaType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::reconcile::{ReconcileAction, Reconciler};
use crate::scanner::{ScanProfile, Scanner};
use crate::{Catalog, CatalogStats, LibraryError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Incremental,
    Full,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Incremental => "incremental",
            ImportMode::Full => "full",
        }
    }
}

/// Receives progress while an import runs.
pub trait ImportProgress {
    /// Called once after the counting pre-pass, before any file is parsed.
    fn started(&mut self, total: usize);
    /// Called before a parsed file is reconciled.
    fn file(&mut self, name: &str);
    /// Called after a file has been reconciled.
    fn advanced(&mut self, current: usize);
}

impl ImportProgress for () {
    fn started(&mut self, _total: usize) {}
    fn file(&mut self, _name: &str) {}
    fn advanced(&mut self, _current: usize) {}
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: usize,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub resurrected: usize,
    pub stats: CatalogStats,
}

/// Runs one import over both roots with a fresh reconciliation session.
/// Full mode purges the catalog first.
pub fn run_import(
    catalog: &Catalog,
    scanner: &Scanner,
    roots: &MediaRoots,
    hash_window: u64,
    mode: ImportMode,
    progress: &mut dyn ImportProgress,
) -> Result<ImportSummary, LibraryError> {
    let start = Instant::now();
    info!("Import started ({})", mode.as_str());
    if mode == ImportMode::Full {
        catalog.purge()?;
    }

    let mut reconciler =
        Reconciler::new(catalog.clone(), roots.clone()).with_hash_window(hash_window);
    let mut summary = ImportSummary {
        total: scanner.count_files(&roots.music) + scanner.count_files(&roots.audiobook),
        ..ImportSummary::default()
    };
    progress.started(summary.total);

    for media in [MediaType::Music, MediaType::Audiobook] {
        let root = roots.root(media).to_path_buf();
        if !root.is_dir() {
            info!("Skipping missing {} root {:?}", media.as_str(), root);
            continue;
        }
        scanner.scan(&root, ScanProfile::for_media(media), |item| {
            progress.file(&item.display_name());
            let folder_id = reconciler.resolve_folder(item.path(), media)?;
            let hash = reconciler.fingerprint(item.path());
            let outcome = reconciler.reconcile(item, media, folder_id, hash.as_deref())?;
            match outcome.action {
                ReconcileAction::Created => summary.created += 1,
                ReconcileAction::Updated | ReconcileAction::Refreshed => summary.updated += 1,
                ReconcileAction::Resurrected => summary.resurrected += 1,
                ReconcileAction::Unchanged => {}
            }
            summary.processed += 1;
            progress.advanced(summary.processed);
            Ok(())
        })?;
    }

    summary.stats = catalog.stats()?;
    info!(
        "Import finished in {:.2?}: {} files, {} created, {} updated, {} resurrected",
        start.elapsed(),
        summary.processed,
        summary.created,
        summary.updated,
        summary.resurrected
    );
    info!("Catalog: {:?}", summary.stats);
    Ok(summary)
}
