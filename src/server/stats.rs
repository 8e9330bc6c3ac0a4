use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::container::{Container, ContainerID, ContainerMetadata};
use crate::diskusage::{self, DiskUsage};
use crate::error::{Error, Result};
use crate::runtime::RawStats;

use super::Server;

/// Usage of one container as reported to the kubelet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerStats {
    pub attributes: ContainerAttributes,
    pub cpu: CpuUsage,
    pub memory: MemoryUsage,
    /// Only reported when the storage driver is overlay.
    pub writable_layer: Option<FilesystemUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerAttributes {
    pub id: ContainerID,
    pub metadata: ContainerMetadata,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CpuUsage {
    /// Nanoseconds since the UNIX epoch.
    pub timestamp: u64,
    pub usage_core_nano_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryUsage {
    /// Nanoseconds since the UNIX epoch.
    pub timestamp: u64,
    pub working_set_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FilesystemUsage {
    /// Nanoseconds since the UNIX epoch.
    pub timestamp: u64,
    pub fs_id: FilesystemIdentifier,
    pub used_bytes: u64,
    pub inodes_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FilesystemIdentifier {
    pub mountpoint: PathBuf,
}

impl Server {
    /// Returns the stats of the container identified by `container_id` or a unique prefix of it.
    ///
    /// # Errors
    ///
    /// - [`Error::ContainerNotFound`] / [`Error::AmbiguousContainerID`] if the ID does not
    ///   resolve to exactly one container.
    /// - The first error collected for the container, e.g. [`Error::SandboxNotFound`] or
    ///   [`Error::Runtime`].
    /// - [`Error::UnexpectedStatsCount`] if collection yielded no record and no error.
    pub async fn container_stats(&self, container_id: &str) -> Result<ContainerStats> {
        let container = self.inner.store.get_container_from_short_id(container_id)?;
        let id = container.id().clone();
        log::debug!("Collecting stats of container `{}`", id);

        let server = self.clone();
        let (stats, errs) = tokio::task::spawn_blocking(move || {
            server.stats_for_containers(std::slice::from_ref(&container))
        })
        .await?;

        single_stats(stats, errs, id)
    }

    /// Collects stats for every container in `containers`.
    ///
    /// A failure for one container does not prevent collection for the others.
    /// Successes and errors are returned separately, both in input order; there is
    /// no positional correspondence between them.
    ///
    /// Performs blocking I/O.
    pub fn stats_for_containers(
        &self,
        containers: &[Arc<Container>],
    ) -> (Vec<ContainerStats>, Vec<Error>) {
        containers.iter().fold(
            (Vec::with_capacity(containers.len()), Vec::new()),
            |(mut stats, mut errs), container| {
                match self.collect_container_stats(container) {
                    Ok(entry) => stats.push(entry),
                    Err(err) => errs.push(err),
                }
                (stats, errs)
            },
        )
    }

    fn collect_container_stats(&self, container: &Container) -> Result<ContainerStats> {
        let sandbox = self
            .inner
            .store
            .get_sandbox(container.sandbox_id())
            .ok_or_else(|| Error::SandboxNotFound {
                container_id: container.id().clone(),
                sandbox_id: container.sandbox_id().clone(),
            })?;
        let raw = self
            .inner
            .runtime
            .container_stats(container, sandbox.cgroup_parent())?;

        Ok(self.build_container_stats(&raw, container))
    }

    fn build_container_stats(&self, raw: &RawStats, container: &Container) -> ContainerStats {
        let writable_layer = self
            .inner
            .storage_driver
            .is_overlay()
            .then(|| writable_layer_usage(raw, container));

        ContainerStats {
            attributes: ContainerAttributes {
                id: container.id().clone(),
                metadata: container.metadata().clone(),
                labels: container.labels().clone(),
                annotations: container.annotations().clone(),
            },
            cpu: CpuUsage {
                timestamp: raw.system_nano,
                usage_core_nano_seconds: raw.cpu_nano,
            },
            memory: MemoryUsage {
                timestamp: raw.system_nano,
                working_set_bytes: raw.working_set_bytes,
            },
            writable_layer,
        }
    }
}

/// Reduces the batch result for one container to its record.
///
/// The first error wins and partial successes are discarded. Without errors exactly
/// one record is expected.
fn single_stats(
    mut stats: Vec<ContainerStats>,
    errs: Vec<Error>,
    id: ContainerID,
) -> Result<ContainerStats> {
    if let Some(err) = errs.into_iter().next() {
        return Err(err);
    }
    match (stats.pop(), stats.is_empty()) {
        (Some(stats), true) => Ok(stats),
        _ => Err(Error::UnexpectedStatsCount(id)),
    }
}

/// Returns the overlay writable layer of a container mounted at `mount_point`.
pub(crate) fn writable_layer_dir(mount_point: &Path) -> PathBuf {
    mount_point
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("diff")
}

fn writable_layer_usage(raw: &RawStats, container: &Container) -> FilesystemUsage {
    let diff_dir = writable_layer_dir(container.mount_point());
    let usage = diskusage::disk_usage(&diff_dir).unwrap_or_else(|err| {
        log::warn!(
            "unable to get disk usage for container {}: {}",
            container.id(),
            err
        );
        DiskUsage::default()
    });

    FilesystemUsage {
        timestamp: raw.system_nano,
        fs_id: FilesystemIdentifier {
            mountpoint: container.mount_point().to_path_buf(),
        },
        used_bytes: usage.bytes_used,
        inodes_used: usage.inodes_used,
    }
}
