//! Test doubles and fixtures shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Once};

use oci_spec::runtime::LinuxResources;
use parking_lot::Mutex;

use crate::container::{Container, ContainerBuilder, ContainerID, Sandbox, SandboxID};
use crate::registry::MemoryStore;
use crate::runtime::{self, RawStats, Runtime};

/// In-memory [`Runtime`] that records every call.
///
/// Stats default to zero for containers without configured values. Configurable via
/// builder methods for failure injection.
#[derive(Default)]
pub struct TestRuntime {
    state: Mutex<TestState>,
}

#[derive(Default)]
struct TestState {
    /// Stats returned by `container_stats()` keyed by container ID.
    stats: HashMap<String, RawStats>,
    /// Containers where `container_stats()` returns `Err`.
    stats_fail: HashSet<String>,
    /// Whether `update_container()` returns `Err`.
    update_fail: bool,
    stats_calls: usize,
    update_calls: usize,
    /// Resources passed to successful `update_container()` calls.
    applied: Vec<LinuxResources>,
}

impl TestRuntime {
    /// Set the stats returned for a container.
    pub fn with_stats(self, id: &str, stats: RawStats) -> Self {
        self.state.lock().stats.insert(id.to_owned(), stats);
        self
    }

    /// Make `container_stats()` fail for the given container.
    pub fn with_stats_fail(self, id: &str) -> Self {
        self.state.lock().stats_fail.insert(id.to_owned());
        self
    }

    /// Make every `update_container()` call fail.
    pub fn with_update_fail(self) -> Self {
        self.state.lock().update_fail = true;
        self
    }

    pub fn stats_calls(&self) -> usize {
        self.state.lock().stats_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().update_calls
    }

    /// Resources that were applied.
    pub fn applied(&self) -> Vec<LinuxResources> {
        self.state.lock().applied.clone()
    }
}

impl Runtime for TestRuntime {
    fn container_stats(
        &self,
        container: &Container,
        _cgroup_parent: &str,
    ) -> runtime::Result<RawStats> {
        let mut state = self.state.lock();
        state.stats_calls += 1;
        let id = container.id().as_str();
        if state.stats_fail.contains(id) {
            return Err(runtime::Error::Other(format!("test stats failure for {id}")));
        }
        Ok(state.stats.get(id).copied().unwrap_or_default())
    }

    fn update_container(
        &self,
        container: &Container,
        resources: &LinuxResources,
    ) -> runtime::Result<()> {
        let mut state = self.state.lock();
        state.update_calls += 1;
        if state.update_fail {
            return Err(runtime::Error::Other(format!(
                "test update failure for {}",
                container.id()
            )));
        }
        state.applied.push(resources.clone());
        Ok(())
    }
}

/// Build a store holding a single sandbox.
pub fn store_with_sandbox(sandbox_id: &str, cgroup_parent: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    store.add_sandbox(Arc::new(Sandbox::new(
        SandboxID::new(sandbox_id).unwrap(),
        cgroup_parent,
    )));
    store
}

/// Register a created container with test metadata.
pub fn add_container(
    store: &MemoryStore,
    id: &str,
    sandbox_id: &str,
    mount_point: impl AsRef<Path>,
) -> Arc<Container> {
    let mut builder = builder(id, sandbox_id);
    builder.set_mount_point(mount_point.as_ref());
    register(store, builder)
}

/// Register a created container that already has resource limits.
pub fn add_container_with_resources(
    store: &MemoryStore,
    id: &str,
    sandbox_id: &str,
    resources: LinuxResources,
) -> Arc<Container> {
    let mut builder = builder(id, sandbox_id);
    builder.set_resources(resources);
    register(store, builder)
}

fn builder(id: &str, sandbox_id: &str) -> ContainerBuilder {
    let mut builder = ContainerBuilder::new(
        ContainerID::new(id).unwrap(),
        SandboxID::new(sandbox_id).unwrap(),
    );
    builder
        .set_metadata(format!("{id}-name"), 1)
        .set_labels(HashMap::from([("app".to_owned(), "test".to_owned())]));
    builder
}

fn register(store: &MemoryStore, builder: ContainerBuilder) -> Arc<Container> {
    let container = Arc::new(builder.build());
    store.add_container(Arc::clone(&container));
    container
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(log::Level, String)>>> = const { RefCell::new(None) };
}

/// Logger recording the messages of threads inside [`capture_logs`].
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        CAPTURED.with(|captured| {
            if let Some(records) = captured.borrow_mut().as_mut() {
                records.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT_LOGGER: Once = Once::new();

/// Runs `f` and returns the log records it emitted on the current thread.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<(log::Level, String)>) {
    INIT_LOGGER.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    let out = f();
    let records = CAPTURED.with(|captured| captured.borrow_mut().take().unwrap_or_default());
    (out, records)
}
