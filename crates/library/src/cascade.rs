use common::{EntityStatus, MediaType};
use redb::WriteTransaction;
use tracing::info;

use crate::store;
use crate::{now_secs, LibraryError};

/// Re-derives an album's status from its active tracks and, when the album
/// crosses the zero boundary, re-derives its artist's.
pub(crate) fn update_album_status(txn: &WriteTransaction, album_id: u64) -> Result<(), LibraryError> {
    let mut album = match store::get_album(txn, album_id)? {
        Some(album) => album,
        None => return Ok(()),
    };
    let active = store::album_tracks(txn, album_id)?
        .iter()
        .filter(|track| track.status.is_active())
        .count();

    let changed = match (active, album.status) {
        (0, EntityStatus::Active) => {
            album.status = EntityStatus::Trashed;
            album.trashed_at = Some(now_secs());
            info!("Album trashed: {} ({})", album.name, album.id);
            true
        }
        (n, EntityStatus::Trashed) if n > 0 => {
            album.status = EntityStatus::Active;
            album.trashed_at = None;
            info!("Album restored: {} ({})", album.name, album.id);
            true
        }
        _ => false,
    };
    if !changed {
        return Ok(());
    }

    store::write_album(txn, &album)?;
    update_artist_status(txn, album.media_type, &album.artist)
}

/// Artists have no parent, so this ends the chain.
pub(crate) fn update_artist_status(
    txn: &WriteTransaction,
    media: MediaType,
    name: &str,
) -> Result<(), LibraryError> {
    let mut artist = match store::artist_by_name(txn, media, name)? {
        Some(artist) => artist,
        None => return Ok(()),
    };
    let active = store::artist_albums(txn, media, name)?
        .iter()
        .filter(|album| album.status.is_active())
        .count();

    match (active, artist.status) {
        (0, EntityStatus::Active) => {
            artist.status = EntityStatus::Trashed;
            artist.trashed_at = Some(now_secs());
            info!("Artist trashed: {} ({})", artist.name, artist.id);
        }
        (n, EntityStatus::Trashed) if n > 0 => {
            artist.status = EntityStatus::Active;
            artist.trashed_at = None;
            info!("Artist restored: {} ({})", artist.name, artist.id);
        }
        _ => return Ok(()),
    }
    store::write_artist(txn, &artist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{write_album, write_artist, write_track};
    use crate::testing::temp_catalog;
    use common::{Album, Artist, Track};

    fn artist(id: u64, name: &str) -> Artist {
        Artist {
            id,
            name: name.to_string(),
            avatar: None,
            media_type: MediaType::Music,
            status: EntityStatus::Active,
            trashed_at: None,
            created_at: 0,
        }
    }

    fn album(id: u64, name: &str, artist: &str) -> Album {
        Album {
            id,
            name: name.to_string(),
            artist: artist.to_string(),
            cover: None,
            year: None,
            media_type: MediaType::Music,
            status: EntityStatus::Active,
            trashed_at: None,
            created_at: 0,
        }
    }

    fn track(id: u64, album_id: u64, status: EntityStatus) -> Track {
        Track {
            id,
            name: format!("t{}", id),
            path: format!("/music/t{}.mp3", id),
            artist_id: 1,
            album_id,
            folder_id: None,
            duration: 1,
            lyrics: None,
            track_index: None,
            episode_number: 0,
            media_type: MediaType::Music,
            file_hash: None,
            file_modified_at: None,
            status,
            trashed_at: None,
            created_at: 0,
        }
    }

    #[test]
    fn last_track_trashes_album_then_artist() {
        let (_dir, catalog) = temp_catalog();
        catalog
            .write(|txn| {
                write_artist(txn, &artist(1, "A"))?;
                write_album(txn, &album(1, "One", "A"))?;
                write_track(txn, None, &track(1, 1, EntityStatus::Trashed))?;
                update_album_status(txn, 1)
            })
            .unwrap();

        let album = catalog.album(1).unwrap().unwrap();
        assert_eq!(album.status, EntityStatus::Trashed);
        assert!(album.trashed_at.is_some());
        assert_eq!(catalog.artist(1).unwrap().unwrap().status, EntityStatus::Trashed);
    }

    #[test]
    fn artist_stays_active_while_another_album_is() {
        let (_dir, catalog) = temp_catalog();
        catalog
            .write(|txn| {
                write_artist(txn, &artist(1, "A"))?;
                write_album(txn, &album(1, "One", "A"))?;
                write_album(txn, &album(2, "Two", "A"))?;
                write_track(txn, None, &track(1, 1, EntityStatus::Trashed))?;
                write_track(txn, None, &track(2, 2, EntityStatus::Active))?;
                update_album_status(txn, 1)
            })
            .unwrap();

        assert_eq!(catalog.album(1).unwrap().unwrap().status, EntityStatus::Trashed);
        assert_eq!(catalog.artist(1).unwrap().unwrap().status, EntityStatus::Active);
    }

    #[test]
    fn active_track_restores_album_and_artist() {
        let (_dir, catalog) = temp_catalog();
        catalog
            .write(|txn| {
                let mut a = artist(1, "A");
                a.status = EntityStatus::Trashed;
                a.trashed_at = Some(5);
                write_artist(txn, &a)?;
                let mut b = album(1, "One", "A");
                b.status = EntityStatus::Trashed;
                b.trashed_at = Some(5);
                write_album(txn, &b)?;
                write_track(txn, None, &track(1, 1, EntityStatus::Active))?;
                update_album_status(txn, 1)
            })
            .unwrap();

        let album = catalog.album(1).unwrap().unwrap();
        let artist = catalog.artist(1).unwrap().unwrap();
        assert_eq!(album.status, EntityStatus::Active);
        assert_eq!(album.trashed_at, None);
        assert_eq!(artist.status, EntityStatus::Active);
        assert_eq!(artist.trashed_at, None);
    }
}
