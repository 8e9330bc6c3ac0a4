use crate::error::{Error, Result};
use crate::resources::{self, UpdateContainerResourcesRequest};

use super::Server;

impl Server {
    /// Applies new resource limits to a live container.
    ///
    /// The runtime is updated first; the container's resource snapshot is only
    /// replaced once the runtime accepted the new limits. A request without Linux
    /// resources succeeds without touching the container.
    ///
    /// # Errors
    ///
    /// - [`Error::ContainerNotFound`] / [`Error::AmbiguousContainerID`] if the ID does not
    ///   resolve to exactly one container.
    /// - [`Error::NotAlive`] if the container is neither created nor running.
    /// - [`Error::Runtime`] if the runtime rejected the update.
    pub async fn update_container_resources(
        &self,
        req: UpdateContainerResourcesRequest,
    ) -> Result<()> {
        let container = self
            .inner
            .store
            .get_container_from_short_id(&req.container_id)?;

        let state = container.state();
        if !state.is_alive() {
            return Err(Error::NotAlive {
                container_id: container.id().clone(),
                state,
            });
        }

        let Some(linux) = req.linux else {
            log::debug!(
                "No linux resources in update for container `{}`",
                container.id()
            );
            return Ok(());
        };

        let resources = resources::to_oci_resources(&linux, self.inner.swap_supported);
        let runtime = std::sync::Arc::clone(&self.inner.runtime);
        tokio::task::spawn_blocking(move || -> Result<()> {
            runtime.update_container(&container, &resources)?;
            container.replace_resources(resources);
            log::debug!("Updated resources of container `{}`", container.id());
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::StorageDriver;
    use crate::container::ContainerState;
    use crate::registry::MemoryStore;
    use crate::resources::LinuxContainerResources;
    use crate::runtime;
    use crate::testing::{self, TestRuntime};

    fn server(store: &Arc<MemoryStore>, runtime: &Arc<TestRuntime>, swap: bool) -> Server {
        Server::new(store.clone(), runtime.clone(), StorageDriver::Overlay, swap)
    }

    fn request(
        id: &str,
        linux: Option<LinuxContainerResources>,
    ) -> UpdateContainerResourcesRequest {
        UpdateContainerResourcesRequest {
            container_id: id.to_owned(),
            linux,
        }
    }

    fn memory_limit(limit: i64) -> Option<LinuxContainerResources> {
        Some(LinuxContainerResources {
            memory_limit_in_bytes: limit,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_update_replaces_snapshot() {
        let store = testing::store_with_sandbox("pod", "");
        let container = testing::add_container(&store, "c1", "pod", "/c1/merged");
        container.set_state(ContainerState::Running);
        let runtime = Arc::new(TestRuntime::default());

        server(&store, &runtime, true)
            .update_container_resources(request("c1", memory_limit(1 << 20)))
            .await
            .unwrap();

        assert_eq!(runtime.update_calls(), 1);
        let snapshot = container.resources().unwrap();
        let memory = snapshot.memory().as_ref().unwrap();
        assert_eq!(memory.limit(), Some(1 << 20));
        assert_eq!(memory.swap(), Some(1 << 20));
        assert_eq!(runtime.applied(), vec![snapshot]);
    }

    #[tokio::test]
    async fn test_update_without_swap_support() {
        let store = testing::store_with_sandbox("pod", "");
        let container = testing::add_container(&store, "c1", "pod", "/c1/merged");
        let runtime = Arc::new(TestRuntime::default());

        server(&store, &runtime, false)
            .update_container_resources(request("c1", memory_limit(4096)))
            .await
            .unwrap();

        let snapshot = container.resources().unwrap();
        assert_eq!(snapshot.memory().as_ref().unwrap().swap(), None);
    }

    #[tokio::test]
    async fn test_update_stopped_container_is_rejected() {
        let store = testing::store_with_sandbox("pod", "");
        let container = testing::add_container(&store, "c1", "pod", "/c1/merged");
        container.set_state(ContainerState::Stopped);
        let runtime = Arc::new(TestRuntime::default());

        let err = server(&store, &runtime, false)
            .update_container_resources(request("c1", memory_limit(4096)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::NotAlive {
                state: ContainerState::Stopped,
                ..
            }
        ));
        assert_eq!(runtime.update_calls(), 0);
        assert!(container.resources().is_none());
    }

    #[tokio::test]
    async fn test_update_paused_container_is_rejected() {
        let store = testing::store_with_sandbox("pod", "");
        let container = testing::add_container(&store, "c1", "pod", "/c1/merged");
        container.set_state(ContainerState::Paused);
        let runtime = Arc::new(TestRuntime::default());

        let err = server(&store, &runtime, false)
            .update_container_resources(request("c1", None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotAlive { .. }));
        assert_eq!(runtime.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_without_linux_resources_is_noop() {
        let store = testing::store_with_sandbox("pod", "");
        let container = testing::add_container(&store, "c1", "pod", "/c1/merged");
        let runtime = Arc::new(TestRuntime::default());

        server(&store, &runtime, false)
            .update_container_resources(request("c1", None))
            .await
            .unwrap();

        assert_eq!(runtime.update_calls(), 0);
        assert!(container.resources().is_none());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_snapshot() {
        let store = testing::store_with_sandbox("pod", "");
        let container = testing::add_container_with_resources(
            &store,
            "c1",
            "pod",
            resources::to_oci_resources(
                &LinuxContainerResources {
                    cpu_shares: 1024,
                    memory_limit_in_bytes: 1 << 30,
                    cpuset_cpus: "0-1".to_owned(),
                    ..Default::default()
                },
                false,
            ),
        );
        let before = serde_json::to_vec(&container.resources()).unwrap();
        let runtime = Arc::new(TestRuntime::default().with_update_fail());

        let err = server(&store, &runtime, false)
            .update_container_resources(request("c1", memory_limit(1 << 20)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Runtime(runtime::Error::Other(_))));
        assert_eq!(runtime.update_calls(), 1);
        assert_eq!(serde_json::to_vec(&container.resources()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_unknown_container() {
        let store = testing::store_with_sandbox("pod", "");
        let runtime = Arc::new(TestRuntime::default());

        let err = server(&store, &runtime, false)
            .update_container_resources(request("missing", None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ContainerNotFound(_)));
    }
}
