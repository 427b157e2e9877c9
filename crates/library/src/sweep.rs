use common::MediaRoots;
use tracing::{debug, info, warn};

use crate::fingerprint::fingerprint_with_window;
use crate::{Catalog, LibraryError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub candidates: usize,
    pub hashed: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Fingerprints active tracks stored without one. Files that are gone or
/// unreadable are skipped and retried on the next sweep.
pub fn backfill_missing_hashes(
    catalog: &Catalog,
    roots: &MediaRoots,
    hash_window: u64,
) -> Result<SweepStats, LibraryError> {
    let tracks = catalog.active_tracks_missing_hash()?;
    let mut stats = SweepStats {
        candidates: tracks.len(),
        ..SweepStats::default()
    };
    if tracks.is_empty() {
        debug!("No tracks missing a fingerprint");
        return Ok(stats);
    }
    info!("Fingerprinting {} tracks", tracks.len());

    for track in tracks {
        let path = match roots.resolve_url(&track.path) {
            Some((_, path)) => path,
            None => {
                warn!("Track {} has an unmappable path {}", track.id, track.path);
                stats.failed += 1;
                continue;
            }
        };
        if !path.is_file() {
            stats.missing += 1;
            continue;
        }
        let hash = match fingerprint_with_window(&path, hash_window) {
            Some(hash) => hash,
            None => {
                warn!("Could not fingerprint {:?}", path);
                stats.failed += 1;
                continue;
            }
        };
        if catalog.set_track_hash(track.id, &hash)? {
            stats.hashed += 1;
        }
    }

    info!(
        "Fingerprint sweep done: {} hashed, {} missing, {} failed",
        stats.hashed, stats.missing, stats.failed
    );
    Ok(stats)
}
