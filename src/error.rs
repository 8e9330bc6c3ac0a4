use crate::container::{ContainerID, ContainerState, SandboxID};
use crate::{registry, runtime};

/// Errors returned by the [`Server`](crate::server::Server) entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container with ID starting with {0} not found")]
    ContainerNotFound(String),
    #[error("multiple containers found with ID prefix {0}")]
    AmbiguousContainerID(String),
    #[error("unable to get stats for container {container_id}: sandbox {sandbox_id} not found")]
    SandboxNotFound {
        container_id: ContainerID,
        sandbox_id: SandboxID,
    },
    #[error("container is not created or running: {container_id} is {state}")]
    NotAlive {
        container_id: ContainerID,
        state: ContainerState,
    },
    #[error(transparent)]
    Runtime(#[from] runtime::Error),
    #[error("Unknown error happened finding container stats for {0}")]
    UnexpectedStatsCount(ContainerID),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<registry::Error> for Error {
    fn from(err: registry::Error) -> Self {
        match err {
            registry::Error::NotFound(id) => Error::ContainerNotFound(id),
            registry::Error::Ambiguous(id) => Error::AmbiguousContainerID(id),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("blocking task failed: {err}"))
    }
}

impl Error {
    /// Returns the ID of the container the error is about, if it names one.
    pub fn container_id(&self) -> Option<&str> {
        match self {
            Error::SandboxNotFound { container_id, .. }
            | Error::NotAlive { container_id, .. }
            | Error::UnexpectedStatsCount(container_id) => Some(container_id.as_str()),
            Error::ContainerNotFound(id) | Error::AmbiguousContainerID(id) => Some(id.as_str()),
            Error::Runtime(err) => err.container_id().map(ContainerID::as_str),
            Error::Internal(_) => None,
        }
    }
}
