//! Conversion of CRI resource constraints into OCI runtime resources.
//!
//! CRI requests carry flat integers where `0` means "not set". The OCI
//! representation distinguishes an absent limit from an explicit zero, so every
//! zero input maps to `None` rather than to a zero limit.

use oci_spec::runtime::{LinuxCpu, LinuxMemory, LinuxMemoryBuilder, LinuxResources};

/// Linux resource constraints of a CRI `UpdateContainerResources` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LinuxContainerResources {
    /// CPU CFS period in microseconds.
    pub cpu_period: i64,
    /// CPU CFS quota in microseconds.
    pub cpu_quota: i64,
    /// Relative CPU weight.
    pub cpu_shares: i64,
    /// Memory limit in bytes.
    pub memory_limit_in_bytes: i64,
    /// CPUs the container may run on, e.g. `0-3,8`.
    pub cpuset_cpus: String,
    /// Memory nodes the container may allocate from.
    pub cpuset_mems: String,
}

/// A CRI `UpdateContainerResources` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UpdateContainerResourcesRequest {
    pub container_id: String,
    #[serde(default)]
    pub linux: Option<LinuxContainerResources>,
}

/// Converts CRI resource constraints to OCI resources.
///
/// The CPU set strings are always copied. Numeric fields are only set when the
/// source is non-zero; negative shares and periods cannot be represented and are
/// left unset. The memory limit is mirrored into the memory+swap limit when
/// `swap_supported` is true, which disables swap for the container.
pub fn to_oci_resources(req: &LinuxContainerResources, swap_supported: bool) -> LinuxResources {
    let mut cpu = LinuxCpu::default();
    cpu.set_cpus(Some(req.cpuset_cpus.clone()))
        .set_mems(Some(req.cpuset_mems.clone()))
        .set_shares(non_zero_unsigned(req.cpu_shares))
        .set_period(non_zero_unsigned(req.cpu_period))
        .set_quota(non_zero(req.cpu_quota));

    let memory = memory_section(non_zero(req.memory_limit_in_bytes), swap_supported);

    let mut resources = LinuxResources::default();
    resources.set_cpu(Some(cpu)).set_memory(Some(memory));
    log::debug!("Converted CRI resources {:?} to OCI resources", req);

    resources
}

fn memory_section(limit: Option<i64>, swap_supported: bool) -> LinuxMemory {
    let mut builder = LinuxMemoryBuilder::default();
    if let Some(limit) = limit {
        builder = builder.limit(limit);
        if swap_supported {
            builder = builder.swap(limit);
        }
    }
    // Every field has a default, so building cannot fail in practice.
    builder.build().unwrap_or_else(|err| {
        log::warn!("failed to build memory resources, leaving them unset: {}", err);
        LinuxMemory::default()
    })
}

fn non_zero(value: i64) -> Option<i64> {
    (value != 0).then_some(value)
}

fn non_zero_unsigned(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|value| *value != 0)
}
