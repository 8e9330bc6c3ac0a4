//! Lookup of containers and sandboxes owned by the lifecycle manager.
//!
//! The adapter never creates or destroys containers; it resolves them through a
//! [`ContainerStore`]. [`MemoryStore`] is the in-process implementation backed by
//! [`DashMap`]s, which supports the truncated IDs accepted by the CRI.

use std::sync::Arc;

use dashmap::DashMap;

use crate::container::{Container, ContainerID, Sandbox, SandboxID};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container with ID starting with {0} not found")]
    NotFound(String),
    #[error("multiple containers found with ID prefix {0}")]
    Ambiguous(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Resolves containers and sandboxes by ID.
pub trait ContainerStore: Send + Sync {
    /// Resolves a container from its full ID or a unique ID prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no container matches and
    /// [`Error::Ambiguous`] if the prefix matches more than one container.
    fn get_container_from_short_id(&self, short_id: &str) -> Result<Arc<Container>>;

    /// Returns the sandbox with the given ID, if it is known.
    fn get_sandbox(&self, id: &SandboxID) -> Option<Arc<Sandbox>>;
}

/// Registry of all containers and sandboxes known to this process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: DashMap<ContainerID, Arc<Container>>,
    sandboxes: DashMap<SandboxID, Arc<Sandbox>>,
}

impl MemoryStore {
    pub fn add_container(&self, container: Arc<Container>) {
        self.containers.insert(container.id().clone(), container);
    }

    pub fn remove_container(&self, id: &ContainerID) -> Option<Arc<Container>> {
        self.containers.remove(id).map(|(_, container)| container)
    }

    pub fn add_sandbox(&self, sandbox: Arc<Sandbox>) {
        self.sandboxes.insert(sandbox.id().clone(), sandbox);
    }

    pub fn remove_sandbox(&self, id: &SandboxID) -> Option<Arc<Sandbox>> {
        self.sandboxes.remove(id).map(|(_, sandbox)| sandbox)
    }

    /// Number of registered containers.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

impl ContainerStore for MemoryStore {
    fn get_container_from_short_id(&self, short_id: &str) -> Result<Arc<Container>> {
        if short_id.is_empty() {
            return Err(Error::NotFound(short_id.to_owned()));
        }

        if let Some(container) = self.containers.get(short_id) {
            return Ok(Arc::clone(container.value()));
        }

        let mut found: Option<Arc<Container>> = None;
        for entry in self.containers.iter() {
            if !entry.key().as_str().starts_with(short_id) {
                continue;
            }
            if found.is_some() {
                return Err(Error::Ambiguous(short_id.to_owned()));
            }
            found = Some(Arc::clone(entry.value()));
        }

        let container = found.ok_or_else(|| Error::NotFound(short_id.to_owned()))?;
        log::debug!(
            "Resolved short id `{}` to container `{}`",
            short_id,
            container.id()
        );
        Ok(container)
    }

    fn get_sandbox(&self, id: &SandboxID) -> Option<Arc<Sandbox>> {
        self.sandboxes
            .get(id)
            .map(|sandbox| Arc::clone(sandbox.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerBuilder;

    fn container(id: &str) -> Arc<Container> {
        Arc::new(
            ContainerBuilder::new(
                ContainerID::new(id).unwrap(),
                SandboxID::new("pod").unwrap(),
            )
            .build(),
        )
    }

    #[test]
    fn test_resolve_full_id() {
        let store = MemoryStore::default();
        store.add_container(container("abcdef"));
        store.add_container(container("abcdef01"));

        let found = store.get_container_from_short_id("abcdef").unwrap();
        assert_eq!(found.id().as_str(), "abcdef");
    }

    #[test]
    fn test_resolve_unique_prefix() {
        let store = MemoryStore::default();
        store.add_container(container("abcdef"));
        store.add_container(container("123456"));

        let found = store.get_container_from_short_id("abc").unwrap();
        assert_eq!(found.id().as_str(), "abcdef");
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let store = MemoryStore::default();
        store.add_container(container("abc111"));
        store.add_container(container("abc222"));

        let err = store.get_container_from_short_id("abc").unwrap_err();
        assert!(matches!(err, Error::Ambiguous(prefix) if prefix == "abc"));
    }

    #[test]
    fn test_resolve_missing_and_empty() {
        let store = MemoryStore::default();
        store.add_container(container("abc111"));

        assert!(matches!(
            store.get_container_from_short_id("zzz"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.get_container_from_short_id(""),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_sandbox_lookup_and_removal() {
        let store = MemoryStore::default();
        let id = SandboxID::new("pod").unwrap();
        store.add_sandbox(Arc::new(Sandbox::new(id.clone(), "kubepods.slice")));

        assert_eq!(
            store.get_sandbox(&id).unwrap().cgroup_parent(),
            "kubepods.slice"
        );
        assert!(store.remove_sandbox(&id).is_some());
        assert!(store.get_sandbox(&id).is_none());
    }

    #[test]
    fn test_remove_container() {
        let store = MemoryStore::default();
        store.add_container(container("abc111"));
        assert_eq!(store.len(), 1);

        let id = ContainerID::new("abc111").unwrap();
        assert!(store.remove_container(&id).is_some());
        assert!(store.is_empty());
    }
}
