use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::MediaRoots;
use metadata::{MetadataError, ScanRecord};
use tempfile::TempDir;

use crate::{Catalog, MetadataExtractor, Scanner};

pub(crate) fn temp_catalog() -> (TempDir, Catalog) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(&dir.path().join("catalog.redb")).unwrap();
    (dir, catalog)
}

/// Derives tags from the path: `<artist>/<album>/<title>.<ext>`. Files named
/// `*.bad.*` fail to parse.
pub(crate) struct StubExtractor;

impl MetadataExtractor for StubExtractor {
    fn extract(&self, path: &Path) -> Result<Option<ScanRecord>, MetadataError> {
        let meta = fs::metadata(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if stem.ends_with(".bad") {
            return Err(MetadataError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad file",
            )));
        }
        let album_dir = path.parent();
        let artist_dir = album_dir.and_then(Path::parent);
        let name_of = |p: Option<&Path>| {
            p.and_then(Path::file_name)
                .map(|s| s.to_string_lossy().to_string())
        };
        Ok(Some(ScanRecord {
            path: path.to_path_buf(),
            title: Some(stem),
            artist: name_of(artist_dir),
            album: name_of(album_dir),
            duration_ms: 61_400,
            size: meta.len(),
            mtime: Some(1_700_000_000),
            ..ScanRecord::default()
        }))
    }
}

/// Temp media roots plus a catalog inside the same directory.
pub(crate) struct Fixture {
    pub dir: TempDir,
    pub roots: MediaRoots,
    pub catalog: Catalog,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let roots = MediaRoots::new(
            dir.path().join("music"),
            dir.path().join("audiobooks"),
            dir.path().join("covers"),
        );
        fs::create_dir_all(&roots.music).unwrap();
        fs::create_dir_all(&roots.audiobook).unwrap();
        let catalog = Catalog::open(&dir.path().join("catalog.redb")).unwrap();
        Self {
            dir,
            roots,
            catalog,
        }
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(Arc::new(StubExtractor), self.roots.covers.clone())
    }

    /// Writes `bytes` at `rel` under the music root.
    pub fn music_file(&self, rel: &str, bytes: &[u8]) -> PathBuf {
        write_file(&self.roots.music.join(rel), bytes)
    }

    pub fn audiobook_file(&self, rel: &str, bytes: &[u8]) -> PathBuf {
        write_file(&self.roots.audiobook.join(rel), bytes)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
    path.to_path_buf()
}
