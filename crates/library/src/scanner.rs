use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::MediaType;
use metadata::ScanRecord;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::artwork;
use crate::{LibraryError, MetadataExtractor};

pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "m4a"];

/// How a root is interpreted. Audiobook roots take album (and missing
/// artist) names from the containing directory and fall back to a directory
/// image for the cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanProfile {
    Music,
    Audiobook,
}

impl ScanProfile {
    pub fn media_type(&self) -> MediaType {
        match self {
            ScanProfile::Music => MediaType::Music,
            ScanProfile::Audiobook => MediaType::Audiobook,
        }
    }

    pub fn for_media(media: MediaType) -> Self {
        match media {
            MediaType::Music => ScanProfile::Music,
            MediaType::Audiobook => ScanProfile::Audiobook,
        }
    }
}

/// One parsed file. Artwork bytes are moved to the cache during parsing, so
/// `record.cover` is always empty here and `cover_path` points at the copy.
#[derive(Debug, Clone)]
pub struct ScanItem {
    pub record: ScanRecord,
    pub cover_path: Option<PathBuf>,
}

impl ScanItem {
    pub fn path(&self) -> &Path {
        &self.record.path
    }

    /// Title, else the file name.
    pub fn display_name(&self) -> String {
        match &self.record.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => self.record.file_name(),
        }
    }
}

#[derive(Clone)]
pub struct Scanner {
    extractor: Arc<dyn MetadataExtractor>,
    extensions: Vec<String>,
    covers_dir: PathBuf,
}

impl Scanner {
    pub fn new(extractor: Arc<dyn MetadataExtractor>, covers_dir: PathBuf) -> Self {
        Self {
            extractor,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            covers_dir,
        }
    }

    /// Replaces the accepted extensions. An empty list keeps the defaults.
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        let extensions: Vec<String> = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if !extensions.is_empty() {
            self.extensions = extensions;
        }
        self
    }

    pub fn accepts(&self, path: &Path) -> bool {
        let ext = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
            None => return false,
        };
        self.extensions.iter().any(|accepted| *accepted == ext)
    }

    /// Accepted files under `root`, without parsing them.
    pub fn count_files(&self, root: &Path) -> usize {
        self.audio_files(root).count()
    }

    /// Walks `root`, parsing every accepted file and handing it to `on_item`.
    /// Files that fail to parse are skipped; an `on_item` error stops the walk.
    pub fn scan<F>(
        &self,
        root: &Path,
        profile: ScanProfile,
        mut on_item: F,
    ) -> Result<Vec<ScanItem>, LibraryError>
    where
        F: FnMut(&ScanItem) -> Result<(), LibraryError>,
    {
        let mut items = Vec::new();
        for path in self.audio_files(root) {
            let item = match self.parse_file(&path, profile) {
                Some(item) => item,
                None => continue,
            };
            on_item(&item)?;
            items.push(item);
        }
        Ok(items)
    }

    /// Extracts one file and applies the profile's post-processing. `None`
    /// when the extractor fails or declines the file.
    pub fn parse_file(&self, path: &Path, profile: ScanProfile) -> Option<ScanItem> {
        let mut record = match self.extractor.extract(path) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Extractor skipped {:?}", path);
                return None;
            }
            Err(err) => {
                warn!("Failed to parse {:?}: {}", path, err);
                return None;
            }
        };

        let mut cover_path = None;
        if let Some(cover) = record.cover.take() {
            match artwork::cache_embedded_cover(&self.covers_dir, path, &cover) {
                Ok(cached) => cover_path = Some(cached),
                Err(err) => warn!("Failed to cache cover for {:?}: {}", path, err),
            }
        }

        if profile == ScanProfile::Audiobook {
            let dir = path.parent();
            if let Some(folder_name) = dir
                .and_then(Path::file_name)
                .map(|s| s.to_string_lossy().to_string())
            {
                if record.artist.is_none() {
                    record.artist = Some(folder_name.clone());
                }
                record.album = Some(folder_name);
            }
            if cover_path.is_none() {
                if let Some(image) = dir.and_then(artwork::find_directory_cover) {
                    match artwork::cache_directory_cover(&self.covers_dir, &image) {
                        Ok(cached) => cover_path = Some(cached),
                        Err(err) => warn!("Failed to cache cover {:?}: {}", image, err),
                    }
                }
            }
        }

        Some(ScanItem { record, cover_path })
    }

    fn audio_files<'a>(&'a self, root: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(move |path| self.accepts(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, StubExtractor};
    use metadata::{CoverArt, MetadataError};
    use std::fs;

    struct CoverExtractor;

    impl MetadataExtractor for CoverExtractor {
        fn extract(&self, path: &Path) -> Result<Option<ScanRecord>, MetadataError> {
            Ok(Some(ScanRecord {
                path: path.to_path_buf(),
                title: Some("Chapter".to_string()),
                cover: Some(CoverArt {
                    data: vec![0xFF, 0xD8, 0xFF, 0xE0],
                    mime: Some("image/jpeg".to_string()),
                }),
                ..ScanRecord::default()
            }))
        }
    }

    #[test]
    fn counts_only_accepted_extensions() {
        let fx = Fixture::new();
        fx.music_file("A/B/01.mp3", b"1");
        fx.music_file("A/B/02.FLAC", b"2");
        fx.music_file("A/B/cover.jpg", b"3");
        fx.music_file("A/B/notes.txt", b"4");
        fx.music_file("C/03.m4a", b"5");

        let scanner = fx.scanner();
        assert_eq!(scanner.count_files(&fx.roots.music), 3);
        let scanner = scanner.with_extensions(&[".mp3"]);
        assert_eq!(scanner.count_files(&fx.roots.music), 1);
    }

    #[test]
    fn parse_failures_do_not_stop_the_walk() {
        let fx = Fixture::new();
        fx.music_file("A/B/01.mp3", b"1");
        fx.music_file("A/B/02.bad.mp3", b"2");
        fx.music_file("A/C/03.mp3", b"3");

        let mut seen = Vec::new();
        let items = fx
            .scanner()
            .scan(&fx.roots.music, ScanProfile::Music, |item| {
                seen.push(item.display_name());
                Ok(())
            })
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(seen, vec!["01".to_string(), "03".to_string()]);
    }

    #[test]
    fn missing_root_scans_nothing() {
        let fx = Fixture::new();
        let missing = fx.dir.path().join("nowhere");
        let scanner = fx.scanner();
        assert_eq!(scanner.count_files(&missing), 0);
        let items = scanner
            .scan(&missing, ScanProfile::Music, |_| Ok(()))
            .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn audiobook_profile_uses_folder_name_and_directory_cover() {
        let fx = Fixture::new();
        let file = fx.audiobook_file("Narrator/Some Book/ch01.mp3", b"audio");
        fs::write(file.parent().unwrap().join("art.webp"), b"webp").unwrap();

        let scanner = Scanner::new(Arc::new(StubExtractor), fx.roots.covers.clone());
        let item = scanner.parse_file(&file, ScanProfile::Audiobook).unwrap();

        assert_eq!(item.record.album.as_deref(), Some("Some Book"));
        assert_eq!(item.record.artist.as_deref(), Some("Narrator"));
        assert_eq!(
            item.cover_path,
            Some(fx.roots.covers.join("Some Book_cover.webp"))
        );
    }

    #[test]
    fn audiobook_artist_falls_back_to_folder_name() {
        let fx = Fixture::new();
        let file = fx.audiobook_file("Book/ch01.mp3", b"audio");
        let scanner = Scanner::new(Arc::new(CoverExtractor), fx.roots.covers.clone());

        let item = scanner.parse_file(&file, ScanProfile::Audiobook).unwrap();

        assert_eq!(item.record.artist.as_deref(), Some("Book"));
        assert_eq!(item.record.album.as_deref(), Some("Book"));
        assert!(item.record.cover.is_none());
        assert_eq!(
            item.cover_path,
            Some(fx.roots.covers.join("ch01.mp3.jpeg"))
        );
    }
}
