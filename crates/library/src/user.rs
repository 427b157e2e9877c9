use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::store::clear_table;
use crate::{now_secs, LibraryError};

type RelationTable = TableDefinition<'static, &'static str, u64>;

const TRACK_LIKES_TABLE: RelationTable = TableDefinition::new("user_track_likes");
const TRACK_HISTORY_TABLE: RelationTable = TableDefinition::new("user_track_history");
const ALBUM_LIKES_TABLE: RelationTable = TableDefinition::new("user_album_likes");
const ALBUM_HISTORY_TABLE: RelationTable = TableDefinition::new("user_album_history");
const PLAYLIST_TRACKS_TABLE: RelationTable = TableDefinition::new("playlist_tracks");

const RELATION_TABLES: [RelationTable; 5] = [
    TRACK_LIKES_TABLE,
    TRACK_HISTORY_TABLE,
    ALBUM_LIKES_TABLE,
    ALBUM_HISTORY_TABLE,
    PLAYLIST_TRACKS_TABLE,
];

const KEY_SEP: char = '\x1f';

/// User-facing rows that point at catalog entities by id: likes, play
/// history and playlist membership. They live in the catalog file so a full
/// import can purge them together with the rows they reference.
#[derive(Clone)]
pub struct UserData {
    db: Arc<Database>,
}

impl UserData {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn like_track(&self, user: &str, track_id: u64) -> Result<(), LibraryError> {
        self.put(TRACK_LIKES_TABLE, user, track_id)
    }

    pub fn liked_tracks(&self, user: &str) -> Result<Vec<u64>, LibraryError> {
        self.list(TRACK_LIKES_TABLE, user)
    }

    fn put(&self, table: RelationTable, owner: &str, id: u64) -> Result<(), LibraryError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(relation_key(owner, id).as_str(), now_secs())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list(&self, table: RelationTable, owner: &str) -> Result<Vec<u64>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        let mut start = owner.to_string();
        start.push(KEY_SEP);
        let mut end = start.clone();
        end.push('\u{10ffff}');

        let mut ids = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let entry = entry?;
            let key = entry.0.value();
            let (_, id) = key
                .rsplit_once(KEY_SEP)
                .ok_or_else(|| LibraryError::KeyParse(key.to_string()))?;
            let id = id
                .parse::<u64>()
                .map_err(|_| LibraryError::KeyParse(key.to_string()))?;
            ids.push(id);
        }
        Ok(ids)
    }
}

pub(crate) fn init_tables(txn: &WriteTransaction) -> Result<(), LibraryError> {
    for table in RELATION_TABLES {
        let _ = txn.open_table(table)?;
    }
    Ok(())
}

pub(crate) fn clear_tables(txn: &WriteTransaction) -> Result<(), LibraryError> {
    for table in RELATION_TABLES {
        clear_table(txn, table)?;
        let _ = txn.open_table(table)?;
    }
    Ok(())
}

fn relation_key(owner: &str, id: u64) -> String {
    let mut out = String::new();
    out.push_str(owner);
    out.push(KEY_SEP);
    out.push_str(&format!("{:020}", id));
    out
}
