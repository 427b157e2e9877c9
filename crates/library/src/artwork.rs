//! Artwork cache. Covers are written flat into one directory and served by
//! file name.

use std::fs;
use std::path::{Path, PathBuf};

use metadata::CoverArt;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Writes embedded artwork as `<audio file name>.<image subtype>`.
pub fn cache_embedded_cover(
    covers_dir: &Path,
    audio_path: &Path,
    cover: &CoverArt,
) -> std::io::Result<PathBuf> {
    let file_name = audio_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "cover".to_string());
    let target = covers_dir.join(format!("{}.{}", file_name, cover.extension()));
    write_if_changed(&target, &cover.data)?;
    Ok(target)
}

/// First image file directly inside `dir`, by file name.
pub fn find_directory_cover(dir: &Path) -> Option<PathBuf> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    images.sort();
    images.into_iter().next()
}

/// Copies a directory image to `<dir name>_cover.<ext>`.
pub fn cache_directory_cover(covers_dir: &Path, image: &Path) -> std::io::Result<PathBuf> {
    let dir_name = image
        .parent()
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "folder".to_string());
    let ext = image
        .extension()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    let target = covers_dir.join(format!("{}_cover.{}", dir_name, ext));
    let data = fs::read(image)?;
    write_if_changed(&target, &data)?;
    Ok(target)
}

fn is_image(path: &Path) -> bool {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
        None => return false,
    };
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

fn write_if_changed(target: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Ok(existing) = fs::read(target) {
        if existing == data {
            return Ok(());
        }
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, data)
}
