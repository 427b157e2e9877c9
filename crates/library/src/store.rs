use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{Album, Artist, EntityStatus, Folder, MediaType, Track};
use redb::{Database, ReadableTable, TableDefinition, TableError, TableHandle, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{decode_value, encode_value, user, LibraryError};

const CATALOG_VERSION: u64 = 1;
const KEY_SEP: char = '\x1f';

type EntityTable = TableDefinition<'static, u64, &'static [u8]>;
type IndexTable = TableDefinition<'static, &'static str, u64>;

const META_TABLE: IndexTable = TableDefinition::new("meta");
const TRACKS_TABLE: EntityTable = TableDefinition::new("tracks");
const TRACKS_BY_PATH_TABLE: IndexTable = TableDefinition::new("tracks_by_path");
const TRACKS_BY_HASH_TABLE: IndexTable = TableDefinition::new("tracks_by_hash");
const ALBUM_TRACKS_TABLE: IndexTable = TableDefinition::new("album_tracks");
const ALBUMS_TABLE: EntityTable = TableDefinition::new("albums");
const ALBUMS_BY_KEY_TABLE: IndexTable = TableDefinition::new("albums_by_key");
const ARTISTS_TABLE: EntityTable = TableDefinition::new("artists");
const ARTISTS_BY_KEY_TABLE: IndexTable = TableDefinition::new("artists_by_key");
const FOLDERS_TABLE: EntityTable = TableDefinition::new("folders");
const FOLDERS_BY_PATH_TABLE: IndexTable = TableDefinition::new("folders_by_path");

const META_VERSION_KEY: &str = "version";

const ENTITY_TABLES: [EntityTable; 4] = [TRACKS_TABLE, ALBUMS_TABLE, ARTISTS_TABLE, FOLDERS_TABLE];
const INDEX_TABLES: [IndexTable; 6] = [
    TRACKS_BY_PATH_TABLE,
    TRACKS_BY_HASH_TABLE,
    ALBUM_TRACKS_TABLE,
    ALBUMS_BY_KEY_TABLE,
    ARTISTS_BY_KEY_TABLE,
    FOLDERS_BY_PATH_TABLE,
];

/// Id sequences kept in the meta table. Ids are never reused, even across
/// full imports.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Sequence {
    Track,
    Album,
    Artist,
    Folder,
}

impl Sequence {
    fn key(&self) -> &'static str {
        match self {
            Sequence::Track => "seq_track",
            Sequence::Album => "seq_album",
            Sequence::Artist => "seq_artist",
            Sequence::Folder => "seq_folder",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub active_tracks: usize,
    pub trashed_tracks: usize,
    pub active_albums: usize,
    pub trashed_albums: usize,
    pub active_artists: usize,
    pub trashed_artists: usize,
    pub folders: usize,
}

/// The persistent catalog: artists, albums, tracks and folders in one redb
/// file, plus the unique-key indexes the reconciler upserts through.
#[derive(Clone)]
pub struct Catalog {
    db: Arc<Database>,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let db = open_or_create_db(path)?;
        let catalog = Self { db: Arc::new(db) };
        catalog.init_tables()?;
        Ok(catalog)
    }

    fn init_tables(&self) -> Result<(), LibraryError> {
        let write_txn = self.db.begin_write()?;
        {
            for table in ENTITY_TABLES {
                let _ = write_txn.open_table(table)?;
            }
            for table in INDEX_TABLES {
                let _ = write_txn.open_table(table)?;
            }
            user::init_tables(&write_txn)?;

            let mut meta = write_txn.open_table(META_TABLE)?;
            let version = meta.get(META_VERSION_KEY)?.map(|v| v.value());
            match version {
                Some(version) if version == CATALOG_VERSION => {}
                Some(version) => return Err(LibraryError::VersionMismatch(version as u32)),
                None => {
                    meta.insert(META_VERSION_KEY, CATALOG_VERSION)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn db(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Runs `f` in one write transaction; an `Err` from `f` aborts it.
    pub fn write<T, F>(&self, f: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&WriteTransaction) -> Result<T, LibraryError>,
    {
        let write_txn = self.db.begin_write()?;
        let value = f(&write_txn)?;
        write_txn.commit()?;
        Ok(value)
    }

    pub fn track(&self, id: u64) -> Result<Option<Track>, LibraryError> {
        self.read_entity(TRACKS_TABLE, id)
    }

    pub fn album(&self, id: u64) -> Result<Option<Album>, LibraryError> {
        self.read_entity(ALBUMS_TABLE, id)
    }

    pub fn artist(&self, id: u64) -> Result<Option<Artist>, LibraryError> {
        self.read_entity(ARTISTS_TABLE, id)
    }

    pub fn folder(&self, id: u64) -> Result<Option<Folder>, LibraryError> {
        self.read_entity(FOLDERS_TABLE, id)
    }

    pub fn tracks(&self) -> Result<Vec<Track>, LibraryError> {
        self.read_all(TRACKS_TABLE)
    }

    pub fn albums(&self) -> Result<Vec<Album>, LibraryError> {
        self.read_all(ALBUMS_TABLE)
    }

    pub fn artists(&self) -> Result<Vec<Artist>, LibraryError> {
        self.read_all(ARTISTS_TABLE)
    }

    pub fn folders(&self) -> Result<Vec<Folder>, LibraryError> {
        self.read_all(FOLDERS_TABLE)
    }

    pub fn active_track_by_path(&self, url: &str) -> Result<Option<Track>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TRACKS_BY_PATH_TABLE)?;
        let id = match index.get(url)? {
            Some(value) => value.value(),
            None => return Ok(None),
        };
        let tracks = read_txn.open_table(TRACKS_TABLE)?;
        read_entity(&tracks, id)
    }

    pub fn active_tracks_missing_hash(&self) -> Result<Vec<Track>, LibraryError> {
        let tracks = self.tracks()?;
        Ok(tracks
            .into_iter()
            .filter(|track| {
                track.status.is_active()
                    && track.file_hash.as_deref().map(str::is_empty).unwrap_or(true)
            })
            .collect())
    }

    /// Stores a fingerprint on a track. Returns false when the track is gone.
    pub fn set_track_hash(&self, track_id: u64, hash: &str) -> Result<bool, LibraryError> {
        self.write(|txn| {
            let previous: Track = match get_track(txn, track_id)? {
                Some(track) => track,
                None => return Ok(false),
            };
            let mut track = previous.clone();
            track.file_hash = Some(hash.to_string());
            write_track(txn, Some(&previous), &track)?;
            Ok(true)
        })
    }

    pub fn stats(&self) -> Result<CatalogStats, LibraryError> {
        let mut stats = CatalogStats::default();
        for track in self.tracks()? {
            if track.status.is_active() {
                stats.active_tracks += 1;
            } else {
                stats.trashed_tracks += 1;
            }
        }
        for album in self.albums()? {
            if album.status.is_active() {
                stats.active_albums += 1;
            } else {
                stats.trashed_albums += 1;
            }
        }
        for artist in self.artists()? {
            if artist.status.is_active() {
                stats.active_artists += 1;
            } else {
                stats.trashed_artists += 1;
            }
        }
        stats.folders = self.folders()?.len();
        Ok(stats)
    }

    /// Deletes every catalog row and every user row that references one.
    /// Id sequences survive so ids are never handed out twice.
    pub fn purge(&self) -> Result<(), LibraryError> {
        info!("Purging catalog");
        self.write(|txn| {
            user::clear_tables(txn)?;
            for table in ENTITY_TABLES {
                clear_table(txn, table)?;
                let _ = txn.open_table(table)?;
            }
            for table in INDEX_TABLES {
                clear_table(txn, table)?;
                let _ = txn.open_table(table)?;
            }
            Ok(())
        })?;
        info!("Catalog purge complete");
        Ok(())
    }

    fn read_entity<T>(
        &self,
        table: EntityTable,
        id: u64,
    ) -> Result<Option<T>, LibraryError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        read_entity(&table, id)
    }

    fn read_all<T>(&self, table: EntityTable) -> Result<Vec<T>, LibraryError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        let mut items = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            items.push(decode_value(entry.1.value())?);
        }
        Ok(items)
    }
}

fn open_or_create_db(path: &Path) -> Result<Database, LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

pub(crate) fn clear_table(txn: &WriteTransaction, table: impl TableHandle) -> Result<(), LibraryError> {
    match txn.delete_table(table) {
        Ok(_) => Ok(()),
        Err(TableError::TableDoesNotExist(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn read_entity<T, R>(table: &R, id: u64) -> Result<Option<T>, LibraryError>
where
    T: for<'de> Deserialize<'de>,
    R: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(decode_value(value.value())?)),
        None => Ok(None),
    }
}

fn write_entity<T: Serialize>(
    txn: &WriteTransaction,
    table: EntityTable,
    id: u64,
    value: &T,
) -> Result<(), LibraryError> {
    let bytes = encode_value(value)?;
    let mut table = txn.open_table(table)?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}

fn lookup(
    txn: &WriteTransaction,
    table: IndexTable,
    key: &str,
) -> Result<Option<u64>, LibraryError> {
    let table = txn.open_table(table)?;
    let id = table.get(key)?.map(|value| value.value());
    Ok(id)
}

/// Values stored under `prefix + KEY_SEP`, in key order.
fn prefixed_ids(
    txn: &WriteTransaction,
    table: IndexTable,
    prefix: &str,
) -> Result<Vec<u64>, LibraryError> {
    let table = txn.open_table(table)?;
    let start = prefix_key(prefix);
    let mut end = start.clone();
    end.push('\u{10ffff}');
    let mut ids = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let entry = entry?;
        ids.push(entry.1.value());
    }
    Ok(ids)
}

pub(crate) fn next_id(txn: &WriteTransaction, sequence: Sequence) -> Result<u64, LibraryError> {
    let mut meta = txn.open_table(META_TABLE)?;
    let current = meta.get(sequence.key())?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    meta.insert(sequence.key(), next)?;
    Ok(next)
}

pub(crate) fn get_track(txn: &WriteTransaction, id: u64) -> Result<Option<Track>, LibraryError> {
    let table = txn.open_table(TRACKS_TABLE)?;
    read_entity(&table, id)
}

pub(crate) fn get_album(txn: &WriteTransaction, id: u64) -> Result<Option<Album>, LibraryError> {
    let table = txn.open_table(ALBUMS_TABLE)?;
    read_entity(&table, id)
}

pub(crate) fn get_artist(txn: &WriteTransaction, id: u64) -> Result<Option<Artist>, LibraryError> {
    let table = txn.open_table(ARTISTS_TABLE)?;
    read_entity(&table, id)
}

pub(crate) fn active_track_by_path(
    txn: &WriteTransaction,
    url: &str,
) -> Result<Option<Track>, LibraryError> {
    match lookup(txn, TRACKS_BY_PATH_TABLE, url)? {
        Some(id) => get_track(txn, id),
        None => Ok(None),
    }
}

/// Active tracks whose URL sits below `url_dir` (a directory URL).
pub(crate) fn active_tracks_under(
    txn: &WriteTransaction,
    url_dir: &str,
) -> Result<Vec<Track>, LibraryError> {
    let ids = {
        let table = txn.open_table(TRACKS_BY_PATH_TABLE)?;
        let start = format!("{}/", url_dir.trim_end_matches('/'));
        let mut end = start.clone();
        end.push('\u{10ffff}');
        let mut ids = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let entry = entry?;
            ids.push(entry.1.value());
        }
        ids
    };
    let mut tracks = Vec::new();
    for id in ids {
        if let Some(track) = get_track(txn, id)? {
            tracks.push(track);
        }
    }
    Ok(tracks)
}

/// The lowest-id trashed track of `media` carrying `hash`.
pub(crate) fn trashed_track_by_hash(
    txn: &WriteTransaction,
    hash: &str,
    media: MediaType,
) -> Result<Option<Track>, LibraryError> {
    if hash.is_empty() {
        return Ok(None);
    }
    for id in prefixed_ids(txn, TRACKS_BY_HASH_TABLE, hash)? {
        if let Some(track) = get_track(txn, id)? {
            if track.status == EntityStatus::Trashed && track.media_type == media {
                return Ok(Some(track));
            }
        }
    }
    Ok(None)
}

pub(crate) fn album_tracks(
    txn: &WriteTransaction,
    album_id: u64,
) -> Result<Vec<Track>, LibraryError> {
    let mut tracks = Vec::new();
    for id in prefixed_ids(txn, ALBUM_TRACKS_TABLE, &id_key(album_id))? {
        if let Some(track) = get_track(txn, id)? {
            tracks.push(track);
        }
    }
    Ok(tracks)
}

/// Albums credited to `artist` within `media`.
pub(crate) fn artist_albums(
    txn: &WriteTransaction,
    media: MediaType,
    artist: &str,
) -> Result<Vec<Album>, LibraryError> {
    let prefix = join_key(&[media.as_str(), artist]);
    let mut albums = Vec::new();
    for id in prefixed_ids(txn, ALBUMS_BY_KEY_TABLE, &prefix)? {
        if let Some(album) = get_album(txn, id)? {
            albums.push(album);
        }
    }
    Ok(albums)
}

pub(crate) fn artist_by_name(
    txn: &WriteTransaction,
    media: MediaType,
    name: &str,
) -> Result<Option<Artist>, LibraryError> {
    match lookup(txn, ARTISTS_BY_KEY_TABLE, &artist_key(media, name))? {
        Some(id) => get_artist(txn, id),
        None => Ok(None),
    }
}

pub(crate) fn album_by_name(
    txn: &WriteTransaction,
    media: MediaType,
    artist: &str,
    name: &str,
) -> Result<Option<Album>, LibraryError> {
    match lookup(txn, ALBUMS_BY_KEY_TABLE, &album_key(media, artist, name))? {
        Some(id) => get_album(txn, id),
        None => Ok(None),
    }
}

pub(crate) fn folder_id_by_path(
    txn: &WriteTransaction,
    path: &str,
) -> Result<Option<u64>, LibraryError> {
    lookup(txn, FOLDERS_BY_PATH_TABLE, path)
}

/// Persists `track` and moves its index entries over from `previous`.
pub(crate) fn write_track(
    txn: &WriteTransaction,
    previous: Option<&Track>,
    track: &Track,
) -> Result<(), LibraryError> {
    write_entity(txn, TRACKS_TABLE, track.id, track)?;

    {
        let mut by_path = txn.open_table(TRACKS_BY_PATH_TABLE)?;
        if let Some(prev) = previous.filter(|prev| prev.status.is_active()) {
            let owned = by_path.get(prev.path.as_str())?.map(|v| v.value()) == Some(prev.id);
            if owned {
                by_path.remove(prev.path.as_str())?;
            }
        }
        if track.status.is_active() {
            by_path.insert(track.path.as_str(), track.id)?;
        }
    }

    {
        let mut by_hash = txn.open_table(TRACKS_BY_HASH_TABLE)?;
        if let Some(hash) = previous.and_then(|prev| prev.file_hash.as_deref()) {
            if !hash.is_empty() {
                by_hash.remove(hash_key(hash, track.id).as_str())?;
            }
        }
        if let Some(hash) = track.file_hash.as_deref() {
            if !hash.is_empty() {
                by_hash.insert(hash_key(hash, track.id).as_str(), track.id)?;
            }
        }
    }

    {
        let mut album_tracks = txn.open_table(ALBUM_TRACKS_TABLE)?;
        if let Some(prev) = previous.filter(|prev| prev.album_id != track.album_id) {
            album_tracks.remove(album_track_key(prev.album_id, track.id).as_str())?;
        }
        album_tracks.insert(album_track_key(track.album_id, track.id).as_str(), track.id)?;
    }

    Ok(())
}

pub(crate) fn write_album(txn: &WriteTransaction, album: &Album) -> Result<(), LibraryError> {
    write_entity(txn, ALBUMS_TABLE, album.id, album)?;
    let mut index = txn.open_table(ALBUMS_BY_KEY_TABLE)?;
    let key = album_key(album.media_type, &album.artist, &album.name);
    index.insert(key.as_str(), album.id)?;
    Ok(())
}

pub(crate) fn write_artist(txn: &WriteTransaction, artist: &Artist) -> Result<(), LibraryError> {
    write_entity(txn, ARTISTS_TABLE, artist.id, artist)?;
    let mut index = txn.open_table(ARTISTS_BY_KEY_TABLE)?;
    let key = artist_key(artist.media_type, &artist.name);
    index.insert(key.as_str(), artist.id)?;
    Ok(())
}

pub(crate) fn write_folder(txn: &WriteTransaction, folder: &Folder) -> Result<(), LibraryError> {
    write_entity(txn, FOLDERS_TABLE, folder.id, folder)?;
    let mut index = txn.open_table(FOLDERS_BY_PATH_TABLE)?;
    index.insert(folder.path.as_str(), folder.id)?;
    Ok(())
}

fn artist_key(media: MediaType, name: &str) -> String {
    join_key(&[media.as_str(), name])
}

fn album_key(media: MediaType, artist: &str, name: &str) -> String {
    join_key(&[media.as_str(), artist, name])
}

fn hash_key(hash: &str, track_id: u64) -> String {
    join_key(&[hash, &id_key(track_id)])
}

fn album_track_key(album_id: u64, track_id: u64) -> String {
    join_key(&[&id_key(album_id), &id_key(track_id)])
}

fn id_key(id: u64) -> String {
    format!("{:020}", id)
}

fn join_key(parts: &[&str]) -> String {
    let mut out = String::new();
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            out.push(KEY_SEP);
        }
        out.push_str(part);
    }
    out
}

fn prefix_key(prefix: &str) -> String {
    let mut out = String::new();
    out.push_str(prefix);
    out.push(KEY_SEP);
    out
}
