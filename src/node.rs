//! Host capabilities that influence how resources are converted.
//!
//! - the cgroup v2 mount point, read from a `mountinfo` file;
//! - the process's own cgroup, read from `/proc/self/cgroup`;
//! - whether swap accounting (`memory.swap.max`) is available.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::StorageDriver;
use crate::fsutil;
use crate::runtime::CgroupManager;

/// Node properties the adapter was configured with, reported at startup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Capabilities {
    pub cgroup_root: PathBuf,
    pub cgroup_manager: CgroupManager,
    pub storage_driver: StorageDriver,
    /// Whether memory limits are mirrored into the memory+swap limit.
    pub memory_swap: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read line for file `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mountinfo line {line} in `{path}`: {content:?}")]
    InvalidMountInfo {
        path: PathBuf,
        line: usize,
        content: String,
    },
    #[error("failed to detect cgroup v2 mount point in file `{path}`")]
    MissingCgroup2Mount { path: PathBuf },
    #[error("invalid cgroup line in `{path}`: {source}")]
    InvalidCgroupLine {
        path: PathBuf,
        #[source]
        source: CgroupLineError,
    },
    #[error("no unified cgroup entry in `{path}`")]
    MissingUnifiedCgroup { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum CgroupLineError {
    #[error("invalid cgroup line format: {0:?}")]
    InvalidFormat(String),
    #[error("invalid hierarchy id in cgroup line: {0:?}")]
    InvalidHierarchyID(String),
}

/// A parsed `/proc/<pid>/cgroup` line: `<hierarchy-id>:<controller-list>:<cgroup-path>`.
#[derive(Debug, PartialEq, Eq)]
pub struct CgroupLine<'a> {
    /// Always `0` for the cgroup v2 unified hierarchy.
    pub hierarchy_id: u32,
    /// Empty for the cgroup v2 unified hierarchy.
    pub controller_list: Vec<&'a str>,
    pub cgroup_path: &'a str,
}

impl CgroupLine<'_> {
    pub fn is_unified(&self) -> bool {
        self.hierarchy_id == 0 && self.controller_list.is_empty()
    }
}

/// Parses one line of a `/proc/<pid>/cgroup` file.
///
/// The cgroup path may itself contain `:`, so only the first two separators split.
pub fn parse_cgroup_line(line: &str) -> std::result::Result<CgroupLine<'_>, CgroupLineError> {
    let mut it = line.trim_end_matches('\n').splitn(3, ':');
    let hierarchy_id = it
        .next()
        .ok_or_else(|| CgroupLineError::InvalidFormat(line.to_owned()))?
        .parse::<u32>()
        .map_err(|_| CgroupLineError::InvalidHierarchyID(line.to_owned()))?;
    let controller_list = it
        .next()
        .ok_or_else(|| CgroupLineError::InvalidFormat(line.to_owned()))?;
    let controller_list = if controller_list.is_empty() {
        Vec::default()
    } else {
        controller_list.split(',').collect()
    };
    let cgroup_path = it
        .next()
        .ok_or_else(|| CgroupLineError::InvalidFormat(line.to_owned()))?;

    Ok(CgroupLine {
        hierarchy_id,
        controller_list,
        cgroup_path,
    })
}

/// Returns the mount point of the first `cgroup2` filesystem in a `mountinfo` file.
///
/// # Errors
///
/// - [`Error::FileOpen`] / [`Error::ReadLine`] on I/O failures.
/// - [`Error::InvalidMountInfo`] if a line lacks the ` - ` separator or required fields.
/// - [`Error::MissingCgroup2Mount`] if no `cgroup2` mount is listed.
pub fn detect_cgroup2_mount_point(mountinfo: impl AsRef<Path>) -> Result<PathBuf> {
    let path = mountinfo.as_ref();
    let mut reader = fsutil::open_file_reader(path)?;
    let mut line = String::with_capacity(256);
    let mut lineno = 0;

    while reader
        .read_line(&mut line)
        .map_err(|source| Error::ReadLine {
            path: path.to_path_buf(),
            source,
        })?
        != 0
    {
        lineno += 1;
        let (mount_point, fs_type) =
            mount_point_and_fs_type(&line).ok_or_else(|| Error::InvalidMountInfo {
                path: path.to_path_buf(),
                line: lineno,
                content: line.trim_end().to_owned(),
            })?;
        if fs_type == "cgroup2" {
            log::debug!("Found `cgroup2` mount point: {}", mount_point);
            return Ok(PathBuf::from(mount_point));
        }
        line.clear();
    }

    Err(Error::MissingCgroup2Mount {
        path: path.to_path_buf(),
    })
}

/// Extracts the mount point (5th field) and filesystem type (first field after ` - `).
fn mount_point_and_fs_type(line: &str) -> Option<(&str, &str)> {
    let (pre, post) = line.split_once(" - ")?;
    let mount_point = pre.split_whitespace().nth(4)?;
    let fs_type = post.split_whitespace().next()?;
    Some((mount_point, fs_type))
}

/// Reads the unified cgroup path of a process from its `cgroup` file.
pub fn unified_cgroup_path(proc_cgroup: impl AsRef<Path>) -> Result<PathBuf> {
    let path = proc_cgroup.as_ref();
    let mut reader = fsutil::open_file_reader(path)?;
    let mut line = String::with_capacity(256);

    while reader
        .read_line(&mut line)
        .map_err(|source| Error::ReadLine {
            path: path.to_path_buf(),
            source,
        })?
        != 0
    {
        let cgroup_line = parse_cgroup_line(&line).map_err(|source| Error::InvalidCgroupLine {
            path: path.to_path_buf(),
            source,
        })?;
        if cgroup_line.is_unified() {
            return Ok(PathBuf::from(cgroup_line.cgroup_path));
        }
        line.clear();
    }

    Err(Error::MissingUnifiedCgroup {
        path: path.to_path_buf(),
    })
}

/// Returns `true` if the cgroup the process lives in exposes `memory.swap.max`.
///
/// # Errors
///
/// Returns an error if `proc_cgroup` cannot be read or has no unified entry.
pub fn cgroup_has_memory_swap(
    cgroup_root: impl AsRef<Path>,
    proc_cgroup: impl AsRef<Path>,
) -> Result<bool> {
    let own = unified_cgroup_path(proc_cgroup)?;
    let own = own.strip_prefix("/").unwrap_or(&own);
    let swap_file = cgroup_root.as_ref().join(own).join("memory.swap.max");
    log::trace!("checking for {}", swap_file.display());

    Ok(swap_file.exists())
}

/// Cached result of [`detect_memory_swap`] for the current process.
pub fn memory_swap_supported(cgroup_root: &Path, rootfs: &Path) -> bool {
    static HAS_SWAP: OnceLock<bool> = OnceLock::new();
    *HAS_SWAP.get_or_init(|| detect_memory_swap(cgroup_root, rootfs))
}

/// Checks swap accounting using the `/proc/self/cgroup` seen under `rootfs`.
///
/// A detection failure is logged and treated as "no swap".
pub fn detect_memory_swap(cgroup_root: &Path, rootfs: &Path) -> bool {
    match cgroup_has_memory_swap(cgroup_root, rootfs.join("proc/self/cgroup")) {
        Ok(has_swap) => {
            log::debug!("cgroup memory swap accounting available: {}", has_swap);
            has_swap
        }
        Err(err) => {
            log::warn!("failed to detect cgroup memory swap support: {}", err);
            false
        }
    }
}
