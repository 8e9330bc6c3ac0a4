//! CRI entry points for container stats and live resource updates.
//!
//! [`Server`] ties the container registry, the low-level runtime and the node
//! configuration together. The async entry points run the blocking runtime and
//! filesystem work on tokio's blocking pool.

mod stats;
mod update;

pub use stats::{
    ContainerAttributes, ContainerStats, CpuUsage, FilesystemUsage, MemoryUsage,
};

use std::sync::Arc;

use crate::config::StorageDriver;
use crate::registry::ContainerStore;
use crate::runtime::Runtime;

/// Handle to the adapter; cloning is cheap and shares the same state.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ContainerStore>,
    runtime: Arc<dyn Runtime>,
    storage_driver: StorageDriver,
    swap_supported: bool,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("storage_driver", &self.inner.storage_driver)
            .field("swap_supported", &self.inner.swap_supported)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server.
    ///
    /// `swap_supported` decides whether memory limits are mirrored into the
    /// memory+swap limit on updates.
    pub fn new(
        store: Arc<dyn ContainerStore>,
        runtime: Arc<dyn Runtime>,
        storage_driver: StorageDriver,
        swap_supported: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                runtime,
                storage_driver,
                swap_supported,
            }),
        }
    }

    pub fn storage_driver(&self) -> &StorageDriver {
        &self.inner.storage_driver
    }

    pub fn swap_supported(&self) -> bool {
        self.inner.swap_supported
    }
}
