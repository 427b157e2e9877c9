use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Placeholder used when a file carries no artist or album tag.
pub const UNKNOWN_NAME: &str = "未知";

pub const MUSIC_URL_PREFIX: &str = "/music";
pub const AUDIOBOOK_URL_PREFIX: &str = "/audio";
pub const COVER_URL_PREFIX: &str = "/covers";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Music,
    Audiobook,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Music => "MUSIC",
            MediaType::Audiobook => "AUDIOBOOK",
        }
    }

    pub fn url_prefix(&self) -> &'static str {
        match self {
            MediaType::Music => MUSIC_URL_PREFIX,
            MediaType::Audiobook => AUDIOBOOK_URL_PREFIX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Active,
    Trashed,
}

impl EntityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EntityStatus::Active)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    pub name: String,
    pub avatar: Option<String>,
    pub media_type: MediaType,
    pub status: EntityStatus,
    pub trashed_at: Option<u64>,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: u64,
    pub name: String,
    /// Artist name, not id. Albums join artists by name within a media type.
    pub artist: String,
    pub cover: Option<String>,
    pub year: Option<String>,
    pub media_type: MediaType,
    pub status: EntityStatus,
    pub trashed_at: Option<u64>,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub name: String,
    /// Servable URL, e.g. `/music/Artist/Album/01.mp3`.
    pub path: String,
    pub artist_id: u64,
    pub album_id: u64,
    pub folder_id: Option<u64>,
    /// Whole seconds.
    pub duration: u32,
    pub lyrics: Option<String>,
    pub track_index: Option<u16>,
    pub episode_number: u32,
    pub media_type: MediaType,
    pub file_hash: Option<String>,
    pub file_modified_at: Option<u64>,
    pub status: EntityStatus,
    pub trashed_at: Option<u64>,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: u64,
    /// Absolute directory path.
    pub path: String,
    pub name: String,
    pub parent_id: Option<u64>,
    pub media_type: MediaType,
    pub created_at: u64,
}

/// The configured media roots and the artwork cache, plus the mapping between
/// files on disk and the URLs the serving layer exposes for them.
#[derive(Clone, Debug)]
pub struct MediaRoots {
    pub music: PathBuf,
    pub audiobook: PathBuf,
    pub covers: PathBuf,
}

impl MediaRoots {
    pub fn new(music: PathBuf, audiobook: PathBuf, covers: PathBuf) -> Self {
        Self {
            music,
            audiobook,
            covers,
        }
    }

    pub fn root(&self, media: MediaType) -> &Path {
        match media {
            MediaType::Music => &self.music,
            MediaType::Audiobook => &self.audiobook,
        }
    }

    /// Music wins when both roots contain the path.
    pub fn classify(&self, path: &Path) -> Option<MediaType> {
        if is_under(&self.music, path) {
            Some(MediaType::Music)
        } else if is_under(&self.audiobook, path) {
            Some(MediaType::Audiobook)
        } else {
            None
        }
    }

    pub fn servable_url(&self, path: &Path, media: MediaType) -> Option<String> {
        let rel = relpath_from(self.root(media), path)?;
        if rel.is_empty() {
            return None;
        }
        Some(format!("{}/{}", media.url_prefix(), rel))
    }

    pub fn cover_url(&self, cover_path: &Path) -> Option<String> {
        let name = cover_path.file_name()?.to_string_lossy();
        Some(format!("{}/{}", COVER_URL_PREFIX, name))
    }

    /// Inverse of [`MediaRoots::servable_url`].
    pub fn resolve_url(&self, url: &str) -> Option<(MediaType, PathBuf)> {
        for media in [MediaType::Music, MediaType::Audiobook] {
            let prefix = media.url_prefix();
            if let Some(rest) = url.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                if rest.is_empty() {
                    return None;
                }
                return Some((media, join_relpath(self.root(media), rest)));
            }
        }
        None
    }

    pub fn resolve_cover_url(&self, url: &str) -> Option<PathBuf> {
        let name = url
            .strip_prefix(COVER_URL_PREFIX)
            .and_then(|r| r.strip_prefix('/'))?;
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(self.covers.join(name))
    }
}

fn is_under(root: &Path, path: &Path) -> bool {
    !root.as_os_str().is_empty() && path.starts_with(root) && path != root
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

pub fn join_relpath(root: &Path, relpath: &str) -> PathBuf {
    let mut out = PathBuf::from(root);
    for part in relpath.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        out.push(part);
    }
    out
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
