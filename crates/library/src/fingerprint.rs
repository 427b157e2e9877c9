use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

/// Bytes read from each end of a file.
pub const DEFAULT_HASH_WINDOW: u64 = 16 * 1024;

/// Content fingerprint of `path` over its size, head and tail. `None` when the
/// file cannot be read; callers must not use a missing fingerprint as a match
/// key.
pub fn fingerprint(path: &Path) -> Option<String> {
    fingerprint_with_window(path, DEFAULT_HASH_WINDOW)
}

pub fn fingerprint_with_window(path: &Path, window: u64) -> Option<String> {
    let window = if window == 0 { DEFAULT_HASH_WINDOW } else { window };
    match hash_file(path, window) {
        Ok(hash) => Some(hash),
        Err(err) => {
            debug!("Fingerprint failed for {:?}: {}", path, err);
            None
        }
    }
}

fn hash_file(path: &Path, window: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut hasher = blake3::Hasher::new();
    hasher.update(size.to_string().as_bytes());

    let head_len = size.min(window) as usize;
    let mut buffer = vec![0u8; head_len];
    file.read_exact(&mut buffer)?;
    hasher.update(&buffer);

    if size > window {
        buffer.resize(window as usize, 0);
        file.seek(SeekFrom::End(-(window as i64)))?;
        file.read_exact(&mut buffer)?;
        hasher.update(&buffer);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
