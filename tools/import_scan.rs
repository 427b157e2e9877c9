use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use common::MediaRoots;
use library::{
    backfill_missing_hashes, run_import, Catalog, ImportMode, LoftyExtractor, Scanner,
    DEFAULT_HASH_WINDOW,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut mode = ImportMode::Incremental;
    let mut positional = Vec::new();
    for arg in env::args().skip(1) {
        if arg == "--full" {
            mode = ImportMode::Full;
        } else {
            positional.push(arg);
        }
    }
    let mut args = positional.into_iter();

    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let audiobook_root = args
        .next()
        .or_else(|| env::var("AUDIOBOOK_ROOT").ok())
        .unwrap_or_else(|| "audiobooks".to_string());
    let artwork_cache = args
        .next()
        .or_else(|| env::var("ARTWORK_CACHE").ok())
        .unwrap_or_else(|| "data/covers".to_string());
    let index_path = args
        .next()
        .or_else(|| env::var("INDEX_PATH").ok())
        .unwrap_or_else(|| "data/catalog.redb".to_string());

    let roots = MediaRoots::new(
        PathBuf::from(music_root),
        PathBuf::from(audiobook_root),
        PathBuf::from(artwork_cache),
    );
    std::fs::create_dir_all(&roots.covers)?;
    let catalog = Catalog::open(&PathBuf::from(&index_path))?;
    info!("Opened catalog at {}", index_path);
    let scanner = Scanner::new(Arc::new(LoftyExtractor), roots.covers.clone());

    let summary = run_import(&catalog, &scanner, &roots, DEFAULT_HASH_WINDOW, mode, &mut ())?;
    let sweep = backfill_missing_hashes(&catalog, &roots, DEFAULT_HASH_WINDOW)?;

    println!(
        "Imported ({}): {} files, {} created, {} updated, {} resurrected, {} hashes backfilled",
        mode.as_str(),
        summary.processed,
        summary.created,
        summary.updated,
        summary.resurrected,
        sweep.hashed
    );
    println!(
        "Catalog: {} artists, {} albums, {} tracks ({} trashed), {} folders",
        summary.stats.active_artists,
        summary.stats.active_albums,
        summary.stats.active_tracks,
        summary.stats.trashed_tracks,
        summary.stats.folders
    );

    Ok(())
}
