//! Creo CRI: container stats and live resource updates for a CRI runtime.
//!
//! This library answers the kubelet's `ContainerStats` and `UpdateContainerResources`
//! calls on top of a cgroup v2 hierarchy. Usage counters are read from cgroup files
//! and the writable layer of overlay containers is measured on disk. New limits are
//! written back to the container's cgroup.

use std::path::PathBuf;
use std::sync::Arc;

pub mod config;
pub mod container;
pub mod diskusage;
pub mod error;
pub mod fsutil;
pub mod node;
pub mod registry;
pub mod resources;
pub mod runtime;
pub mod server;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

/// Runs the Creo CRI adapter.
///
/// Loads the configuration, detects the cgroup v2 root and swap accounting of the
/// node, builds a [`server::Server`] over an empty container registry and prints
/// the detected node capabilities as JSON.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid environment variables.
/// - A missing or unreadable `mountinfo` file, or no `cgroup2` mount in it.
/// - Failure to serialize the capabilities report.
pub async fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Final rootfs: {}", config.rootfs.display());

    let cgroup_root = match &config.cgroup_root {
        Some(cgroup_root) => cgroup_root.clone(),
        None => {
            let mount_point =
                node::detect_cgroup2_mount_point(config.rootfs.join("proc/self/mountinfo"))?;
            let relative = mount_point
                .strip_prefix("/")
                .map(PathBuf::from)
                .unwrap_or(mount_point);
            config.rootfs.join(relative)
        }
    };
    log::debug!("Final Cgroup Root: {}", cgroup_root.display());

    let swap_supported = node::memory_swap_supported(&cgroup_root, &config.rootfs);

    let store = Arc::new(registry::MemoryStore::default());
    let runtime = Arc::new(runtime::CgroupRuntime::new(
        cgroup_root.clone(),
        config.cgroup_manager,
        store.clone(),
    ));
    let server = server::Server::new(
        store,
        runtime,
        config.storage_driver.clone(),
        swap_supported,
    );
    log::info!("Initialized {:?}", server);

    let capabilities = node::Capabilities {
        cgroup_root,
        cgroup_manager: config.cgroup_manager,
        storage_driver: server.storage_driver().clone(),
        memory_swap: server.swap_supported(),
    };
    println!("{}", serde_json::to_string_pretty(&capabilities)?);

    Ok(())
}
