use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use common::{Folder, MediaType};

use crate::store::{self, Sequence};
use crate::{now_secs, Catalog, LibraryError};

/// Directory path -> folder id, owned by one reconciliation session.
///
/// Entries are only added after the transaction that created the rows has
/// committed, so every cached id exists in the catalog.
#[derive(Debug, Default)]
pub struct FolderCache {
    ids: HashMap<PathBuf, u64>,
}

impl FolderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Folder id of the directory holding `file_path`, creating one row per
    /// missing path segment below `root`. `None` when the file sits directly
    /// in `root` or outside it.
    pub fn resolve(
        &mut self,
        catalog: &Catalog,
        file_path: &Path,
        root: &Path,
        media: MediaType,
    ) -> Result<Option<u64>, LibraryError> {
        let dir = match file_path.parent() {
            Some(dir) => dir,
            None => return Ok(None),
        };
        let rel = match dir.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => return Ok(None),
        };
        let segments: Vec<&std::ffi::OsStr> = rel
            .components()
            .filter_map(|component| match component {
                Component::Normal(segment) => Some(segment),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            return Ok(None);
        }
        if let Some(id) = self.ids.get(dir) {
            return Ok(Some(*id));
        }

        let cached = &self.ids;
        let (resolved, leaf) = catalog.write(|txn| {
            let mut resolved = Vec::with_capacity(segments.len());
            let mut current = root.to_path_buf();
            let mut parent_id = None;
            for segment in &segments {
                current.push(segment);
                if let Some(id) = cached.get(&current) {
                    parent_id = Some(*id);
                    continue;
                }
                let key = current.to_string_lossy().to_string();
                let id = match store::folder_id_by_path(txn, &key)? {
                    Some(id) => id,
                    None => {
                        let folder = Folder {
                            id: store::next_id(txn, Sequence::Folder)?,
                            path: key,
                            name: segment.to_string_lossy().to_string(),
                            parent_id,
                            media_type: media,
                            created_at: now_secs(),
                        };
                        store::write_folder(txn, &folder)?;
                        folder.id
                    }
                };
                resolved.push((current.clone(), id));
                parent_id = Some(id);
            }
            Ok((resolved, parent_id))
        })?;

        for (path, id) in resolved {
            self.ids.insert(path, id);
        }
        Ok(leaf)
    }
}
