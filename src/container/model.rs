use std::collections::HashMap;
use std::path::{Path, PathBuf};

use oci_spec::runtime::LinuxResources;
use parking_lot::RwLock;

use super::{ContainerID, ContainerState, SandboxID};

/// Name and attempt counter the kubelet assigned to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContainerMetadata {
    pub name: String,
    pub attempt: u32,
}

/// In-memory view of a container owned by the lifecycle manager.
///
/// The adapter only reads a container, except for the resource snapshot which is
/// replaced as a whole after the runtime accepted new limits.
#[derive(Debug)]
pub struct Container {
    id: ContainerID,
    sandbox_id: SandboxID,
    metadata: ContainerMetadata,
    labels: HashMap<String, String>,
    annotations: HashMap<String, String>,
    mount_point: PathBuf,
    state: RwLock<ContainerState>,
    resources: RwLock<Option<LinuxResources>>,
}

impl Container {
    pub fn id(&self) -> &ContainerID {
        &self.id
    }

    /// Returns the ID of the sandbox this container belongs to.
    pub fn sandbox_id(&self) -> &SandboxID {
        &self.sandbox_id
    }

    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    pub fn annotations(&self) -> &HashMap<String, String> {
        &self.annotations
    }

    /// Returns the mount point of the container's root filesystem.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn state(&self) -> ContainerState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ContainerState) {
        *self.state.write() = state;
    }

    /// Returns a copy of the resource limits last accepted by the runtime.
    pub fn resources(&self) -> Option<LinuxResources> {
        self.resources.read().clone()
    }

    /// Replaces the resource snapshot in a single write.
    pub(crate) fn replace_resources(&self, resources: LinuxResources) {
        *self.resources.write() = Some(resources);
    }
}

/// Builder for [`Container`].
#[derive(Debug)]
pub struct ContainerBuilder {
    id: ContainerID,
    sandbox_id: SandboxID,
    metadata: ContainerMetadata,
    labels: HashMap<String, String>,
    annotations: HashMap<String, String>,
    mount_point: PathBuf,
    state: ContainerState,
    resources: Option<LinuxResources>,
}

impl ContainerBuilder {
    /// Starts a container in the [`ContainerState::Created`] state with no metadata,
    /// labels or resources.
    pub fn new(id: ContainerID, sandbox_id: SandboxID) -> Self {
        Self {
            id,
            sandbox_id,
            metadata: ContainerMetadata::default(),
            labels: HashMap::default(),
            annotations: HashMap::default(),
            mount_point: PathBuf::new(),
            state: ContainerState::Created,
            resources: None,
        }
    }

    pub fn set_metadata(&mut self, name: impl Into<String>, attempt: u32) -> &mut Self {
        self.metadata = ContainerMetadata {
            name: name.into(),
            attempt,
        };
        self
    }

    pub fn set_labels(&mut self, labels: HashMap<String, String>) -> &mut Self {
        self.labels = labels;
        self
    }

    pub fn set_annotations(&mut self, annotations: HashMap<String, String>) -> &mut Self {
        self.annotations = annotations;
        self
    }

    /// Sets the mount point of the root filesystem.
    ///
    /// With the overlay driver this is `<layer>/merged`; the writable layer is the
    /// sibling `diff` directory.
    pub fn set_mount_point(&mut self, mount_point: impl Into<PathBuf>) -> &mut Self {
        self.mount_point = mount_point.into();
        self
    }

    pub fn set_state(&mut self, state: ContainerState) -> &mut Self {
        self.state = state;
        self
    }

    /// Sets the resource limits the container was created with.
    pub fn set_resources(&mut self, resources: LinuxResources) -> &mut Self {
        self.resources = Some(resources);
        self
    }

    pub fn build(self) -> Container {
        Container {
            id: self.id,
            sandbox_id: self.sandbox_id,
            metadata: self.metadata,
            labels: self.labels,
            annotations: self.annotations,
            mount_point: self.mount_point,
            state: RwLock::new(self.state),
            resources: RwLock::new(self.resources),
        }
    }
}

/// A pod sandbox, looked up by the adapter to scope cgroup queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    id: SandboxID,
    cgroup_parent: String,
}

impl Sandbox {
    pub fn new(id: SandboxID, cgroup_parent: impl Into<String>) -> Self {
        Self {
            id,
            cgroup_parent: cgroup_parent.into(),
        }
    }

    pub fn id(&self) -> &SandboxID {
        &self.id
    }

    /// Returns the cgroup parent all containers of this sandbox are placed under.
    pub fn cgroup_parent(&self) -> &str {
        &self.cgroup_parent
    }
}
