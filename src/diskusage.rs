//! Filesystem usage of a directory tree, used for the writable layer of a container.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to stat `{path}`: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read directory `{path}`: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Bytes and inodes used below a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskUsage {
    /// Sum of the apparent sizes of all entries.
    pub bytes_used: u64,
    /// Number of entries, including the root itself.
    pub inodes_used: u64,
}

/// Walks the tree rooted at `path` and sums the apparent size of every entry.
///
/// Symlinks are counted but not followed. Entries removed while the walk is in
/// progress are skipped, as the writable layer of a running container changes
/// underneath the walk.
///
/// # Errors
///
/// Returns [`Error::Stat`] if `path` itself cannot be inspected, or any error
/// other than `NotFound` for an entry below it.
pub fn disk_usage(path: impl AsRef<Path>) -> Result<DiskUsage> {
    let root = path.as_ref();
    let metadata = std::fs::symlink_metadata(root).map_err(|source| Error::Stat {
        path: root.to_path_buf(),
        source,
    })?;

    let mut usage = DiskUsage {
        bytes_used: metadata.len(),
        inodes_used: 1,
    };
    if !metadata.is_dir() {
        return Ok(usage);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound && dir != root => continue,
            Err(source) => return Err(Error::ReadDir { path: dir, source }),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(Error::ReadDir {
                        path: dir.clone(),
                        source,
                    });
                }
            };
            let path = entry.path();
            let metadata = match std::fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    log::trace!("`{}` vanished during disk usage walk", path.display());
                    continue;
                }
                Err(source) => return Err(Error::Stat { path, source }),
            };

            usage.bytes_used = usage.bytes_used.saturating_add(metadata.len());
            usage.inodes_used += 1;
            if metadata.is_dir() {
                stack.push(path);
            }
        }
    }

    Ok(usage)
}
