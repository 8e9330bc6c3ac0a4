use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use oci_spec::runtime::{LinuxCpu, LinuxMemory, LinuxResources};

use crate::container::{Container, ContainerID};
use crate::fsutil;
use crate::registry::ContainerStore;

use super::stats::{CpuStat, MemoryCurrent, MemoryStat};
use super::{Error, RawStats, Result, Runtime, StatParseError};

/// Prefix of the cgroup created for each container.
pub const DEFAULT_SCOPE_PREFIX: &str = "crio";

const SLICE_SUFFIX: &str = ".slice";

/// How container cgroups are laid out below their sandbox's cgroup parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupManager {
    /// Parents are systemd slices and containers live in `<prefix>-<id>.scope` units.
    Systemd,
    /// Parents are plain paths and containers live in `<prefix>-<id>` directories.
    Cgroupfs,
}

/// A [`Runtime`] operating directly on a cgroup v2 hierarchy.
pub struct CgroupRuntime {
    cgroup_root: PathBuf,
    manager: CgroupManager,
    scope_prefix: String,
    store: Arc<dyn ContainerStore>,
}

impl std::fmt::Debug for CgroupRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CgroupRuntime")
            .field("cgroup_root", &self.cgroup_root)
            .field("manager", &self.manager)
            .field("scope_prefix", &self.scope_prefix)
            .finish_non_exhaustive()
    }
}

impl CgroupRuntime {
    /// Creates a runtime rooted at the cgroup2 mount point `cgroup_root`.
    ///
    /// `store` is used to find the cgroup parent of a container when applying updates.
    pub fn new(
        cgroup_root: impl Into<PathBuf>,
        manager: CgroupManager,
        store: Arc<dyn ContainerStore>,
    ) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            manager,
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_owned(),
            store,
        }
    }

    pub fn with_scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scope_prefix = prefix.into();
        self
    }

    /// Returns the absolute cgroup directory of a container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCgroupParent`] if a systemd parent is not a valid slice name.
    pub fn cgroup_path(&self, container_id: &ContainerID, cgroup_parent: &str) -> Result<PathBuf> {
        let path = match self.manager {
            CgroupManager::Systemd => {
                let parent = if cgroup_parent.is_empty() {
                    PathBuf::new()
                } else {
                    expand_slice(cgroup_parent)?
                };
                parent.join(format!("{}-{}.scope", self.scope_prefix, container_id))
            }
            CgroupManager::Cgroupfs => {
                let parent = cgroup_parent.trim_start_matches('/');
                if parent.split('/').any(|component| component == "..") {
                    return Err(Error::InvalidCgroupParent(cgroup_parent.to_owned()));
                }
                Path::new(parent).join(format!("{}-{}", self.scope_prefix, container_id))
            }
        };
        Ok(self.cgroup_root.join(path))
    }

    fn existing_cgroup_path(&self, container: &Container, cgroup_parent: &str) -> Result<PathBuf> {
        let path = self.cgroup_path(container.id(), cgroup_parent)?;
        if !path.is_dir() {
            return Err(Error::CgroupNotFound {
                container_id: container.id().clone(),
                path,
            });
        }
        log::trace!("cgroup of container `{}`: {}", container.id(), path.display());
        Ok(path)
    }
}

impl Runtime for CgroupRuntime {
    fn container_stats(&self, container: &Container, cgroup_parent: &str) -> Result<RawStats> {
        let path = self.existing_cgroup_path(container, cgroup_parent)?;

        let cpu = read_stat(&path.join("cpu.stat"), CpuStat::from_reader)?;
        let current = read_stat(&path.join("memory.current"), MemoryCurrent::from_reader)?;
        let memory = read_stat(&path.join("memory.stat"), MemoryStat::from_reader)?;

        Ok(RawStats {
            cpu_nano: cpu.usage_usec.saturating_mul(1_000),
            working_set_bytes: current.usage_bytes.saturating_sub(memory.inactive_file),
            system_nano: now_nanos(),
        })
    }

    fn update_container(&self, container: &Container, resources: &LinuxResources) -> Result<()> {
        let sandbox = self.store.get_sandbox(container.sandbox_id()).ok_or_else(|| {
            Error::SandboxNotFound {
                container_id: container.id().clone(),
                sandbox_id: container.sandbox_id().clone(),
            }
        })?;
        let path = self.existing_cgroup_path(container, sandbox.cgroup_parent())?;

        // Everything is validated before the first write.
        let writes = cgroup_writes(container.id(), &path, resources)?;
        let mut applied = Vec::with_capacity(writes.len());
        for (file, value) in writes {
            let file_path = path.join(file);
            log::trace!("writing `{}` to {}", value, file_path.display());
            if let Err(err) = fsutil::write_file(&file_path, &value) {
                if !applied.is_empty() {
                    log::warn!(
                        "partial cgroup update of `{}`: applied {:?} before `{}` failed",
                        container.id(),
                        applied,
                        file
                    );
                }
                return Err(Error::Write {
                    path: err.path,
                    value,
                    source: err.source,
                });
            }
            applied.push(file);
        }

        log::debug!("Updated cgroup resources of container `{}`", container.id());
        Ok(())
    }
}

/// Expands a systemd slice name into its path in the cgroup hierarchy.
///
/// `kubepods-burstable-pod1.slice` becomes
/// `kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod1.slice`,
/// and the root slice `-.slice` becomes an empty path.
///
/// # Errors
///
/// Returns [`Error::InvalidCgroupParent`] if the name does not end in `.slice`,
/// contains a `/`, or has an empty dash-separated component.
pub fn expand_slice(slice: &str) -> Result<PathBuf> {
    let invalid = || Error::InvalidCgroupParent(slice.to_owned());
    let name = slice
        .strip_suffix(SLICE_SUFFIX)
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .ok_or_else(invalid)?;
    if name == "-" {
        return Ok(PathBuf::new());
    }

    let mut path = PathBuf::new();
    let mut prefix = String::new();
    for component in name.split('-') {
        if component.is_empty() {
            return Err(invalid());
        }
        path.push(format!("{prefix}{component}{SLICE_SUFFIX}"));
        prefix.push_str(component);
        prefix.push('-');
    }

    Ok(path)
}

fn read_stat<T>(
    path: &Path,
    parse: impl FnOnce(&mut BufReader<File>) -> std::result::Result<T, StatParseError>,
) -> Result<T> {
    let mut reader = fsutil::open_file_reader(path).map_err(|err| Error::Read {
        path: err.path,
        source: err.source,
    })?;
    parse(&mut reader).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Translates the present fields of `resources` into cgroup v2 file writes.
fn cgroup_writes(
    container_id: &ContainerID,
    cgroup: &Path,
    resources: &LinuxResources,
) -> Result<Vec<(&'static str, String)>> {
    let mut writes = Vec::new();
    if let Some(cpu) = resources.cpu() {
        cpu_writes(cpu, cgroup, &mut writes)?;
    }
    if let Some(memory) = resources.memory() {
        memory_writes(container_id, memory, &mut writes)?;
    }

    Ok(writes)
}

fn cpu_writes(
    cpu: &LinuxCpu,
    cgroup: &Path,
    writes: &mut Vec<(&'static str, String)>,
) -> Result<()> {
    if let Some(shares) = cpu.shares() {
        let weight = shares_to_weight(shares);
        if weight != 0 {
            writes.push(("cpu.weight", weight.to_string()));
        }
    }
    // `cpu.max` holds quota and period together; a period-only update keeps the quota.
    let current_quota = match (cpu.quota(), cpu.period()) {
        (None, Some(_)) => Some(read_stat(&cgroup.join("cpu.max"), read_cpu_max_quota)?),
        _ => None,
    };
    if let Some(max) = cpu_max(cpu.quota(), cpu.period(), current_quota.as_deref()) {
        writes.push(("cpu.max", max));
    }
    if let Some(cpus) = cpu.cpus().as_deref().filter(|cpus| !cpus.is_empty()) {
        writes.push(("cpuset.cpus", cpus.to_owned()));
    }
    if let Some(mems) = cpu.mems().as_deref().filter(|mems| !mems.is_empty()) {
        writes.push(("cpuset.mems", mems.to_owned()));
    }

    Ok(())
}

fn memory_writes(
    container_id: &ContainerID,
    memory: &LinuxMemory,
    writes: &mut Vec<(&'static str, String)>,
) -> Result<()> {
    let invalid = |reason: String| Error::InvalidResources {
        container_id: container_id.clone(),
        reason,
    };

    if let Some(limit) = memory.limit() {
        writes.push(("memory.max", limit_value(limit)));
    }
    if let Some(swap) = memory.swap() {
        // OCI swap is memory+swap, cgroup v2 only limits the swap part.
        let value = match memory.limit() {
            _ if swap < 0 => "max".to_owned(),
            None => return Err(invalid("memory swap set without memory limit".to_owned())),
            Some(limit) if limit < 0 => {
                return Err(invalid(format!(
                    "memory+swap limit {swap} set with unlimited memory"
                )));
            }
            Some(limit) if swap < limit => {
                return Err(invalid(format!(
                    "memory+swap limit {swap} is lower than memory limit {limit}"
                )));
            }
            Some(limit) => (swap - limit).to_string(),
        };
        writes.push(("memory.swap.max", value));
    }

    Ok(())
}

/// Converts cgroup v1 CPU shares (2..=262144) to a cgroup v2 weight (1..=10000).
///
/// Zero shares mean "unset" and map to zero.
fn shares_to_weight(shares: u64) -> u64 {
    if shares == 0 {
        return 0;
    }
    let shares = shares.clamp(2, 262_144);
    1 + ((shares - 2) * 9_999) / 262_142
}

/// Reads the quota token (`max` or a number) of a `cpu.max` file.
fn read_cpu_max_quota<R: BufRead>(buf: &mut R) -> std::result::Result<String, StatParseError> {
    let mut line = String::new();
    buf.read_line(&mut line)?;
    line.split_whitespace()
        .next()
        .map(str::to_owned)
        .ok_or(StatParseError::MissingField("quota"))
}

/// Builds the `cpu.max` value; `current_quota` is kept when only the period changes.
fn cpu_max(
    quota: Option<i64>,
    period: Option<u64>,
    current_quota: Option<&str>,
) -> Option<String> {
    match (quota, period) {
        (None, None) => None,
        (Some(quota), None) if quota > 0 => Some(quota.to_string()),
        (Some(_), None) => Some("max".to_owned()),
        (Some(quota), Some(period)) if quota > 0 => Some(format!("{quota} {period}")),
        (Some(_), Some(period)) => Some(format!("max {period}")),
        (None, Some(period)) => Some(format!("{} {period}", current_quota.unwrap_or("max"))),
    }
}

fn limit_value(limit: i64) -> String {
    if limit < 0 {
        "max".to_owned()
    } else {
        limit.to_string()
    }
}
