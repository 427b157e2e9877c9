use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use lofty::error::LoftyError;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};

/// Everything the catalog needs from one audio file.
#[derive(Debug, Default, Clone)]
pub struct ScanRecord {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub track_no: Option<u16>,
    pub duration_ms: u32,
    pub cover: Option<CoverArt>,
    pub lyrics: Option<String>,
    /// Seconds since the unix epoch.
    pub mtime: Option<u64>,
    pub size: u64,
}

impl ScanRecord {
    pub fn duration_secs(&self) -> u32 {
        ((u64::from(self.duration_ms) + 500) / 1000) as u32
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

impl CoverArt {
    /// File extension for a cached copy, taken from the mime subtype.
    pub fn extension(&self) -> &str {
        self.mime
            .as_deref()
            .and_then(|mime| mime.split('/').nth(1))
            .filter(|ext| !ext.is_empty())
            .unwrap_or("jpg")
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

pub fn read_record(path: &Path) -> Result<ScanRecord, MetadataError> {
    let file_meta = fs::metadata(path)?;
    let tagged_file = lofty::read_from_path(path)?;
    let properties = tagged_file.properties();

    let mut record = ScanRecord {
        path: path.to_path_buf(),
        size: file_meta.len(),
        mtime: file_meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs()),
        ..ScanRecord::default()
    };

    let duration_ms = properties.duration().as_millis();
    record.duration_ms = duration_ms.min(u128::from(u32::MAX)) as u32;

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        record.title = tag.get_string(&ItemKey::TrackTitle).and_then(clean_text);
        record.album = tag.get_string(&ItemKey::AlbumTitle).and_then(clean_text);
        let album_artist = tag.get_string(&ItemKey::AlbumArtist).and_then(clean_text);
        let track_artist = tag.get_string(&ItemKey::TrackArtist).and_then(clean_text);
        record.artist = track_artist.or(album_artist);
        record.track_no = tag.get_string(&ItemKey::TrackNumber).and_then(parse_u16);
        record.year = tag
            .get_string(&ItemKey::Year)
            .or_else(|| tag.get_string(&ItemKey::RecordingDate))
            .and_then(parse_year);
        record.lyrics = tag.get_string(&ItemKey::Lyrics).and_then(clean_text);
        record.cover = pick_picture(tag.pictures()).map(|picture| {
            let data = picture.data().to_vec();
            let mime = guess_mime(&data);
            CoverArt { data, mime }
        });
    }

    if record.title.is_none() {
        record.title = path.file_stem().map(|s| s.to_string_lossy().to_string());
    }
    if record.lyrics.is_none() {
        record.lyrics = find_lyrics_file(path);
    }

    Ok(record)
}

/// Looks for `<stem>.lrc`, then `<stem>.txt`, next to the audio file.
pub fn find_lyrics_file(path: &Path) -> Option<String> {
    for ext in ["lrc", "txt"] {
        let candidate = path.with_extension(ext);
        if candidate == path || !candidate.is_file() {
            continue;
        }
        if let Ok(text) = fs::read_to_string(&candidate) {
            return clean_text(&text);
        }
    }
    None
}

fn clean_text(text: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| *c != '\0').collect();
    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn parse_u16(text: &str) -> Option<u16> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn parse_year(text: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            if digits.len() == 4 {
                break;
            }
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(picture);
        }
    }
    pictures.first()
}

pub fn guess_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg".to_string())
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png".to_string())
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_track_numbers_with_totals() {
        assert_eq!(parse_u16("3/12"), Some(3));
        assert_eq!(parse_u16(" 7 "), Some(7));
        assert_eq!(parse_u16("x"), None);
    }

    #[test]
    fn parses_leading_year() {
        assert_eq!(parse_year("1999-04-01"), Some(1999));
        assert_eq!(parse_year("c. 2004"), Some(2004));
        assert_eq!(parse_year("unknown"), None);
    }

    #[test]
    fn cover_extension_follows_mime() {
        let jpeg = CoverArt {
            data: vec![0xFF, 0xD8, 0xFF, 0x00],
            mime: guess_mime(&[0xFF, 0xD8, 0xFF, 0x00]),
        };
        assert_eq!(jpeg.extension(), "jpeg");
        let unknown = CoverArt {
            data: vec![1, 2, 3],
            mime: None,
        };
        assert_eq!(unknown.extension(), "jpg");
    }

    #[test]
    fn lyrics_sidecar_prefers_lrc_and_strips_nul() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("song.mp3");
        fs::write(&audio, b"not really audio").unwrap();
        fs::write(dir.path().join("song.txt"), "plain").unwrap();
        fs::write(dir.path().join("song.lrc"), "[00:01]la\0la").unwrap();

        assert_eq!(find_lyrics_file(&audio).as_deref(), Some("[00:01]lala"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_record(&dir.path().join("missing.mp3")).unwrap_err();
        assert!(matches!(err, MetadataError::Io(_)));
    }
}
