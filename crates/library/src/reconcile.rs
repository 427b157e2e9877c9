use std::path::Path;

use common::{Album, Artist, EntityStatus, MediaRoots, MediaType, Track, UNKNOWN_NAME};
use redb::WriteTransaction;
use tracing::{debug, info};

use crate::cascade;
use crate::episode::episode_number;
use crate::fingerprint::{fingerprint_with_window, DEFAULT_HASH_WINDOW};
use crate::scanner::{ScanItem, ScanProfile, Scanner};
use crate::store::{self, Sequence};
use crate::{now_secs, Catalog, FolderCache, LibraryError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    /// Folder or fingerprint backfilled on an existing track.
    Updated,
    Unchanged,
    Resurrected,
    /// Metadata re-read after an on-disk edit.
    Refreshed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub track_id: u64,
    pub action: ReconcileAction,
}

/// One reconciliation session: the catalog, the roots it maps paths
/// against, and the session's own folder cache.
pub struct Reconciler {
    catalog: Catalog,
    roots: MediaRoots,
    folders: FolderCache,
    hash_window: u64,
}

impl Reconciler {
    pub fn new(catalog: Catalog, roots: MediaRoots) -> Self {
        Self {
            catalog,
            roots,
            folders: FolderCache::new(),
            hash_window: DEFAULT_HASH_WINDOW,
        }
    }

    pub fn with_hash_window(mut self, window: u64) -> Self {
        if window > 0 {
            self.hash_window = window;
        }
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn roots(&self) -> &MediaRoots {
        &self.roots
    }

    pub fn fingerprint(&self, path: &Path) -> Option<String> {
        fingerprint_with_window(path, self.hash_window)
    }

    pub fn resolve_folder(
        &mut self,
        path: &Path,
        media: MediaType,
    ) -> Result<Option<u64>, LibraryError> {
        let root = self.roots.root(media).to_path_buf();
        self.folders.resolve(&self.catalog, path, &root, media)
    }

    /// Upserts the track for one scanned file.
    ///
    /// An active track at the same URL only gets its folder and missing
    /// fingerprint refreshed. Otherwise a trashed track with the same
    /// fingerprint is moved here, or a new track is created together with any
    /// missing artist and album.
    pub fn reconcile(
        &self,
        item: &ScanItem,
        media: MediaType,
        folder_id: Option<u64>,
        hash: Option<&str>,
    ) -> Result<ReconcileOutcome, LibraryError> {
        let url = self.url_for(item.path(), media)?;
        let hash = hash.filter(|hash| !hash.is_empty());
        let cover = item
            .cover_path
            .as_deref()
            .and_then(|cover| self.roots.cover_url(cover));

        self.catalog.write(|txn| {
            if let Some(existing) = store::active_track_by_path(txn, &url)? {
                return backfill(txn, existing, folder_id, hash);
            }
            if let Some(hash) = hash {
                if let Some(outcome) = resurrect(txn, hash, media, &url, folder_id)? {
                    return Ok(outcome);
                }
            }
            create(txn, item, media, &url, folder_id, hash, cover)
        })
    }

    /// Handles a new file on disk. A fingerprint match against a trashed
    /// track resurrects it without parsing; an existing active track at the
    /// same URL is treated as an edit. `Ok(None)` when the path is outside
    /// the roots or the file was skipped.
    pub fn ingest(
        &mut self,
        path: &Path,
        scanner: &Scanner,
    ) -> Result<Option<ReconcileOutcome>, LibraryError> {
        let media = match self.roots.classify(path) {
            Some(media) => media,
            None => return Ok(None),
        };
        let url = self.url_for(path, media)?;
        if self.catalog.active_track_by_path(&url)?.is_some() {
            return self.refresh(path, scanner);
        }

        let hash = self.fingerprint(path);
        let folder_id = self.resolve_folder(path, media)?;
        if let Some(hash) = hash.as_deref() {
            if let Some(outcome) = self.resurrect_by_hash(path, media, folder_id, hash)? {
                return Ok(Some(outcome));
            }
        }

        let item = match scanner.parse_file(path, ScanProfile::for_media(media)) {
            Some(item) => item,
            None => return Ok(None),
        };
        self.reconcile(&item, media, folder_id, hash.as_deref())
            .map(Some)
    }

    /// Moves the lowest-id trashed track carrying `hash` to `path`.
    pub fn resurrect_by_hash(
        &self,
        path: &Path,
        media: MediaType,
        folder_id: Option<u64>,
        hash: &str,
    ) -> Result<Option<ReconcileOutcome>, LibraryError> {
        let url = self.url_for(path, media)?;
        self.catalog
            .write(|txn| resurrect(txn, hash, media, &url, folder_id))
    }

    /// Re-reads an edited file and updates the active track in place. Artist
    /// and album links are left alone. A file with no active track yet is
    /// ingested instead.
    pub fn refresh(
        &mut self,
        path: &Path,
        scanner: &Scanner,
    ) -> Result<Option<ReconcileOutcome>, LibraryError> {
        let media = match self.roots.classify(path) {
            Some(media) => media,
            None => return Ok(None),
        };
        let url = self.url_for(path, media)?;
        if self.catalog.active_track_by_path(&url)?.is_none() {
            return self.ingest(path, scanner);
        }

        let item = match scanner.parse_file(path, ScanProfile::for_media(media)) {
            Some(item) => item,
            None => return Ok(None),
        };
        let hash = self.fingerprint(path);

        self.catalog.write(|txn| {
            let previous = match store::active_track_by_path(txn, &url)? {
                Some(track) => track,
                None => return Ok(None),
            };
            let mut track = previous.clone();
            track.name = item.display_name();
            track.duration = item.record.duration_secs();
            if hash.is_some() {
                track.file_hash = hash.clone();
            }
            track.file_modified_at = Some(item.record.mtime.unwrap_or_else(now_secs));
            store::write_track(txn, Some(&previous), &track)?;
            debug!("Refreshed track {} ({})", track.id, track.path);
            Ok(Some(ReconcileOutcome {
                track_id: track.id,
                action: ReconcileAction::Refreshed,
            }))
        })
    }

    /// Soft-deletes the active track at `path` and cascades. Returns the
    /// trashed track id.
    pub fn trash(&self, path: &Path) -> Result<Option<u64>, LibraryError> {
        let media = match self.roots.classify(path) {
            Some(media) => media,
            None => return Ok(None),
        };
        let url = self.url_for(path, media)?;
        self.catalog.write(|txn| match store::active_track_by_path(txn, &url)? {
            Some(track) => trash_track(txn, track).map(Some),
            None => Ok(None),
        })
    }

    /// Soft-deletes every active track below a removed directory.
    pub fn trash_directory(&self, dir: &Path) -> Result<usize, LibraryError> {
        let media = match self.roots.classify(dir) {
            Some(media) => media,
            None => return Ok(0),
        };
        let url = self.url_for(dir, media)?;
        self.catalog.write(|txn| {
            let tracks = store::active_tracks_under(txn, &url)?;
            let count = tracks.len();
            for track in tracks {
                trash_track(txn, track)?;
            }
            Ok(count)
        })
    }

    fn url_for(&self, path: &Path, media: MediaType) -> Result<String, LibraryError> {
        self.roots
            .servable_url(path, media)
            .ok_or_else(|| LibraryError::OutsideRoot(path.to_path_buf()))
    }
}

fn backfill(
    txn: &WriteTransaction,
    existing: Track,
    folder_id: Option<u64>,
    hash: Option<&str>,
) -> Result<ReconcileOutcome, LibraryError> {
    let mut track = existing.clone();
    if track.folder_id != folder_id {
        track.folder_id = folder_id;
    }
    let missing_hash = track.file_hash.as_deref().map(str::is_empty).unwrap_or(true);
    if missing_hash {
        if let Some(hash) = hash {
            track.file_hash = Some(hash.to_string());
        }
    }

    let action = if track == existing {
        ReconcileAction::Unchanged
    } else {
        store::write_track(txn, Some(&existing), &track)?;
        ReconcileAction::Updated
    };
    Ok(ReconcileOutcome {
        track_id: track.id,
        action,
    })
}

fn resurrect(
    txn: &WriteTransaction,
    hash: &str,
    media: MediaType,
    url: &str,
    folder_id: Option<u64>,
) -> Result<Option<ReconcileOutcome>, LibraryError> {
    let previous = match store::trashed_track_by_hash(txn, hash, media)? {
        Some(track) => track,
        None => return Ok(None),
    };

    let mut track = previous.clone();
    track.path = url.to_string();
    track.folder_id = folder_id;
    track.status = EntityStatus::Active;
    track.trashed_at = None;
    track.file_modified_at = Some(now_secs());
    store::write_track(txn, Some(&previous), &track)?;
    info!("Resurrected track {} ({} -> {})", track.id, previous.path, track.path);

    cascade::update_album_status(txn, track.album_id)?;
    Ok(Some(ReconcileOutcome {
        track_id: track.id,
        action: ReconcileAction::Resurrected,
    }))
}

fn create(
    txn: &WriteTransaction,
    item: &ScanItem,
    media: MediaType,
    url: &str,
    folder_id: Option<u64>,
    hash: Option<&str>,
    cover: Option<String>,
) -> Result<ReconcileOutcome, LibraryError> {
    let record = &item.record;
    let artist_name = non_empty(record.artist.as_deref()).unwrap_or(UNKNOWN_NAME);
    let album_name = non_empty(record.album.as_deref()).unwrap_or(UNKNOWN_NAME);
    let now = now_secs();

    let artist_id = match store::artist_by_name(txn, media, artist_name)? {
        Some(mut artist) => {
            if !artist.status.is_active() {
                artist.status = EntityStatus::Active;
                artist.trashed_at = None;
                store::write_artist(txn, &artist)?;
            }
            artist.id
        }
        None => {
            let artist = Artist {
                id: store::next_id(txn, Sequence::Artist)?,
                name: artist_name.to_string(),
                avatar: cover.clone(),
                media_type: media,
                status: EntityStatus::Active,
                trashed_at: None,
                created_at: now,
            };
            store::write_artist(txn, &artist)?;
            artist.id
        }
    };

    let album_id = match store::album_by_name(txn, media, artist_name, album_name)? {
        Some(mut album) => {
            if !album.status.is_active() {
                album.status = EntityStatus::Active;
                album.trashed_at = None;
                store::write_album(txn, &album)?;
            }
            album.id
        }
        None => {
            let album = Album {
                id: store::next_id(txn, Sequence::Album)?,
                name: album_name.to_string(),
                artist: artist_name.to_string(),
                cover,
                year: record.year.map(|year| year.to_string()),
                media_type: media,
                status: EntityStatus::Active,
                trashed_at: None,
                created_at: now,
            };
            store::write_album(txn, &album)?;
            album.id
        }
    };

    let name = item.display_name();
    let track = Track {
        id: store::next_id(txn, Sequence::Track)?,
        episode_number: episode_number(record.title.as_deref().unwrap_or("")),
        name,
        path: url.to_string(),
        artist_id,
        album_id,
        folder_id,
        duration: record.duration_secs(),
        lyrics: record.lyrics.clone(),
        track_index: record.track_no,
        media_type: media,
        file_hash: hash.map(str::to_string),
        file_modified_at: record.mtime,
        status: EntityStatus::Active,
        trashed_at: None,
        created_at: now,
    };
    store::write_track(txn, None, &track)?;
    debug!("Created track {} ({})", track.id, track.path);

    Ok(ReconcileOutcome {
        track_id: track.id,
        action: ReconcileAction::Created,
    })
}

fn trash_track(txn: &WriteTransaction, previous: Track) -> Result<u64, LibraryError> {
    let mut track = previous.clone();
    track.status = EntityStatus::Trashed;
    track.trashed_at = Some(now_secs());
    store::write_track(txn, Some(&previous), &track)?;
    info!("Trashed track {} ({})", track.id, track.path);
    cascade::update_album_status(txn, track.album_id)?;
    Ok(track.id)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use std::fs;

    fn scan_music(fx: &Fixture, reconciler: &mut Reconciler) -> Vec<ReconcileOutcome> {
        let scanner = fx.scanner();
        let mut outcomes = Vec::new();
        let items = scanner
            .scan(&fx.roots.music, ScanProfile::Music, |_| Ok(()))
            .unwrap();
        for item in items {
            let folder_id = reconciler
                .resolve_folder(item.path(), MediaType::Music)
                .unwrap();
            let hash = reconciler.fingerprint(item.path());
            outcomes.push(
                reconciler
                    .reconcile(&item, MediaType::Music, folder_id, hash.as_deref())
                    .unwrap(),
            );
        }
        outcomes
    }

    #[test]
    fn fresh_import_builds_one_album() {
        let fx = Fixture::new();
        fx.music_file("Artist1/Album1/01 - Song.mp3", b"first song");
        fx.music_file("Artist1/Album1/02 - Song.mp3", b"second song");
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());

        scan_music(&fx, &mut reconciler);

        let catalog = &fx.catalog;
        assert_eq!(catalog.artists().unwrap().len(), 1);
        assert_eq!(catalog.albums().unwrap().len(), 1);
        let folders = catalog.folders().unwrap();
        assert_eq!(folders.len(), 2);
        let leaf = folders.iter().find(|f| f.name == "Album1").unwrap();

        let tracks = catalog.tracks().unwrap();
        assert_eq!(tracks.len(), 2);
        for track in &tracks {
            assert_eq!(track.status, EntityStatus::Active);
            assert_eq!(track.folder_id, Some(leaf.id));
            assert!(track.file_hash.is_some());
        }
        assert_eq!(tracks[0].path, "/music/Artist1/Album1/01 - Song.mp3");
        assert_eq!(tracks[0].duration, 61);
        assert_eq!(tracks[0].episode_number, 1);
    }

    #[test]
    fn rescanning_is_idempotent() {
        let fx = Fixture::new();
        fx.music_file("A/B/01.mp3", b"one");
        fx.music_file("A/C/02.mp3", b"two");
        fx.music_file("loose.mp3", b"three");
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());

        scan_music(&fx, &mut reconciler);
        let tracks = fx.catalog.tracks().unwrap();
        let albums = fx.catalog.albums().unwrap();
        let artists = fx.catalog.artists().unwrap();

        let mut second = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let outcomes = scan_music(&fx, &mut second);

        assert!(outcomes
            .iter()
            .all(|outcome| outcome.action == ReconcileAction::Unchanged));
        assert_eq!(fx.catalog.tracks().unwrap(), tracks);
        assert_eq!(fx.catalog.albums().unwrap(), albums);
        assert_eq!(fx.catalog.artists().unwrap(), artists);
    }

    #[test]
    fn missing_hash_is_backfilled_on_rescan() {
        let fx = Fixture::new();
        fx.music_file("A/B/01.mp3", b"one");
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let items = scanner
            .scan(&fx.roots.music, ScanProfile::Music, |_| Ok(()))
            .unwrap();
        let folder_id = reconciler
            .resolve_folder(items[0].path(), MediaType::Music)
            .unwrap();
        reconciler
            .reconcile(&items[0], MediaType::Music, folder_id, None)
            .unwrap();

        let outcomes = scan_music(&fx, &mut reconciler);

        assert_eq!(outcomes[0].action, ReconcileAction::Updated);
        let track = fx.catalog.track(outcomes[0].track_id).unwrap().unwrap();
        assert_eq!(track.file_hash, reconciler.fingerprint(&fx.roots.music.join("A/B/01.mp3")));
    }

    #[test]
    fn moved_file_keeps_its_track() {
        let fx = Fixture::new();
        let old = fx.music_file("A/song.mp3", b"the same bytes");
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let created = reconciler.ingest(&old, &scanner).unwrap().unwrap();
        assert_eq!(created.action, ReconcileAction::Created);

        let new = fx.roots.music.join("B/song.mp3");
        fs::create_dir_all(new.parent().unwrap()).unwrap();
        fs::rename(&old, &new).unwrap();
        reconciler.trash(&old).unwrap();
        let moved = reconciler.ingest(&new, &scanner).unwrap().unwrap();

        assert_eq!(moved.action, ReconcileAction::Resurrected);
        assert_eq!(moved.track_id, created.track_id);
        let tracks = fx.catalog.tracks().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].path, "/music/B/song.mp3");
        assert_eq!(tracks[0].status, EntityStatus::Active);
        let folder = fx.catalog.folder(tracks[0].folder_id.unwrap()).unwrap().unwrap();
        assert_eq!(folder.name, "B");
    }

    #[test]
    fn delete_and_restore_cascades() {
        let fx = Fixture::new();
        let file = fx.music_file("Solo/Only/01.mp3", b"lonely");
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let created = reconciler.ingest(&file, &scanner).unwrap().unwrap();

        let removed = fs::read(&file).unwrap();
        fs::remove_file(&file).unwrap();
        assert_eq!(reconciler.trash(&file).unwrap(), Some(created.track_id));

        let track = fx.catalog.track(created.track_id).unwrap().unwrap();
        assert_eq!(track.status, EntityStatus::Trashed);
        assert!(track.trashed_at.is_some());
        assert_eq!(fx.catalog.album(track.album_id).unwrap().unwrap().status, EntityStatus::Trashed);
        assert_eq!(fx.catalog.artist(track.artist_id).unwrap().unwrap().status, EntityStatus::Trashed);

        fs::write(&file, removed).unwrap();
        let restored = reconciler.ingest(&file, &scanner).unwrap().unwrap();

        assert_eq!(restored.action, ReconcileAction::Resurrected);
        let track = fx.catalog.track(created.track_id).unwrap().unwrap();
        assert_eq!(track.status, EntityStatus::Active);
        assert_eq!(track.trashed_at, None);
        assert_eq!(fx.catalog.album(track.album_id).unwrap().unwrap().status, EntityStatus::Active);
        assert_eq!(fx.catalog.artist(track.artist_id).unwrap().unwrap().status, EntityStatus::Active);
    }

    #[test]
    fn resurrection_matches_within_media_type() {
        let fx = Fixture::new();
        let bytes = b"identical content in both libraries";
        let book = fx.audiobook_file("Reader/Book/ch01.mp3", bytes);
        let song = fx.music_file("A/B/song.mp3", bytes);
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let book_track = reconciler.ingest(&book, &scanner).unwrap().unwrap();
        let song_track = reconciler.ingest(&song, &scanner).unwrap().unwrap();
        assert!(book_track.track_id < song_track.track_id);
        reconciler.trash(&book).unwrap();
        reconciler.trash(&song).unwrap();
        fs::remove_file(&book).unwrap();
        fs::remove_file(&song).unwrap();

        let moved = fx.music_file("C/D/song.mp3", bytes);
        let outcome = reconciler.ingest(&moved, &scanner).unwrap().unwrap();

        assert_eq!(outcome.action, ReconcileAction::Resurrected);
        assert_eq!(outcome.track_id, song_track.track_id);
        let book_row = fx.catalog.track(book_track.track_id).unwrap().unwrap();
        assert_eq!(book_row.status, EntityStatus::Trashed);
    }

    #[test]
    fn edit_refreshes_fields_but_not_links() {
        let fx = Fixture::new();
        let file = fx.music_file("A/B/01.mp3", b"before");
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let created = reconciler.ingest(&file, &scanner).unwrap().unwrap();
        let before = fx.catalog.track(created.track_id).unwrap().unwrap();

        fs::write(&file, b"after, and longer").unwrap();
        let refreshed = reconciler.ingest(&file, &scanner).unwrap().unwrap();

        assert_eq!(refreshed.action, ReconcileAction::Refreshed);
        let after = fx.catalog.track(created.track_id).unwrap().unwrap();
        assert_ne!(after.file_hash, before.file_hash);
        assert_eq!(after.album_id, before.album_id);
        assert_eq!(after.artist_id, before.artist_id);
        assert_eq!(fx.catalog.tracks().unwrap().len(), 1);
    }

    #[test]
    fn removed_directory_trashes_everything_below() {
        let fx = Fixture::new();
        let a = fx.music_file("Gone/X/01.mp3", b"a");
        let b = fx.music_file("Gone/Y/02.mp3", b"b");
        let keep = fx.music_file("Gone2/03.mp3", b"c");
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        for path in [&a, &b, &keep] {
            reconciler.ingest(path, &scanner).unwrap();
        }

        let trashed = reconciler
            .trash_directory(&fx.roots.music.join("Gone"))
            .unwrap();

        assert_eq!(trashed, 2);
        let stats = fx.catalog.stats().unwrap();
        assert_eq!(stats.active_tracks, 1);
        assert_eq!(stats.trashed_tracks, 2);
    }

    #[test]
    fn audiobook_tracks_group_by_folder() {
        let fx = Fixture::new();
        let first = fx.audiobook_file("Reader/Book One/第一章.mp3", b"c1");
        let second = fx.audiobook_file("Reader/Book One/第二章.mp3", b"c2");
        let scanner = fx.scanner();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        reconciler.ingest(&first, &scanner).unwrap();
        reconciler.ingest(&second, &scanner).unwrap();

        let albums = fx.catalog.albums().unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, "Book One");
        assert_eq!(albums[0].media_type, MediaType::Audiobook);
        let mut episodes: Vec<u32> = fx
            .catalog
            .tracks()
            .unwrap()
            .iter()
            .map(|track| track.episode_number)
            .collect();
        episodes.sort();
        assert_eq!(episodes, vec![1, 2]);
        assert!(fx.catalog.tracks().unwrap()[0].path.starts_with("/audio/Reader/Book One/"));
    }

    struct UntaggedExtractor;

    impl crate::MetadataExtractor for UntaggedExtractor {
        fn extract(
            &self,
            path: &Path,
        ) -> Result<Option<metadata::ScanRecord>, metadata::MetadataError> {
            Ok(Some(metadata::ScanRecord {
                path: path.to_path_buf(),
                ..metadata::ScanRecord::default()
            }))
        }
    }

    #[test]
    fn missing_tags_use_placeholder_names() {
        let fx = Fixture::new();
        let file = fx.music_file("Some Dir/track07.mp3", b"untagged");
        let scanner = Scanner::new(std::sync::Arc::new(UntaggedExtractor), fx.roots.covers.clone());
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());
        let created = reconciler.ingest(&file, &scanner).unwrap().unwrap();

        let track = fx.catalog.track(created.track_id).unwrap().unwrap();
        assert_eq!(track.name, "track07.mp3");
        assert_eq!(track.episode_number, 0);
        let album = fx.catalog.album(track.album_id).unwrap().unwrap();
        assert_eq!(album.name, UNKNOWN_NAME);
        assert_eq!(album.artist, UNKNOWN_NAME);
        let artist = fx.catalog.artist(track.artist_id).unwrap().unwrap();
        assert_eq!(artist.name, UNKNOWN_NAME);
    }

    #[test]
    fn paths_outside_roots_are_ignored() {
        let fx = Fixture::new();
        let stray = fx.dir.path().join("elsewhere/x.mp3");
        fs::create_dir_all(stray.parent().unwrap()).unwrap();
        fs::write(&stray, b"x").unwrap();
        let mut reconciler = Reconciler::new(fx.catalog.clone(), fx.roots.clone());

        assert!(reconciler.ingest(&stray, &fx.scanner()).unwrap().is_none());
        assert!(reconciler.trash(&stray).unwrap().is_none());
    }
}
