//! The low-level runtime the adapter delegates to.
//!
//! A [`Runtime`] reads usage counters of a live container and applies new resource
//! limits to it. [`CgroupRuntime`] implements both directly on the cgroup v2
//! filesystem.
//!
//! Both operations may block on I/O for an unbounded amount of time; callers are
//! expected to run them off the async executor.

mod cgroupfs;
mod error;
mod stats;

pub use cgroupfs::{CgroupManager, CgroupRuntime, expand_slice};
pub use error::{Error, Result, StatParseError};
pub use stats::{CpuStat, MemoryCurrent, MemoryStat};

use oci_spec::runtime::LinuxResources;

use crate::container::Container;

/// Point-in-time usage of a container as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawStats {
    /// Cumulative CPU time consumed, in nanoseconds.
    pub cpu_nano: u64,
    /// Memory in use that cannot be reclaimed without pressure, in bytes.
    pub working_set_bytes: u64,
    /// Collection time in nanoseconds since the UNIX epoch.
    pub system_nano: u64,
}

pub trait Runtime: Send + Sync {
    /// Collects usage counters of `container`, whose cgroup lives below `cgroup_parent`.
    fn container_stats(&self, container: &Container, cgroup_parent: &str) -> Result<RawStats>;

    /// Applies `resources` to the running `container`.
    ///
    /// Only fields present in `resources` are changed.
    fn update_container(&self, container: &Container, resources: &LinuxResources) -> Result<()>;
}
