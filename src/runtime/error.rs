use std::num::ParseIntError;
use std::path::PathBuf;

use crate::container::{ContainerID, SandboxID};

/// Errors reported by a [`super::Runtime`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cgroup `{path}` of container {container_id} does not exist")]
    CgroupNotFound {
        container_id: ContainerID,
        path: PathBuf,
    },
    #[error("invalid cgroup parent `{0}`")]
    InvalidCgroupParent(String),
    #[error("sandbox {sandbox_id} of container {container_id} not found")]
    SandboxNotFound {
        container_id: ContainerID,
        sandbox_id: SandboxID,
    },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: StatParseError,
    },
    #[error("failed to write `{value}` to `{path}`: {source}")]
    Write {
        path: PathBuf,
        value: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid resources for container {container_id}: {reason}")]
    InvalidResources {
        container_id: ContainerID,
        reason: String,
    },
    /// Failure reported by a [`Runtime`](super::Runtime) implemented outside this crate.
    #[error("runtime failure: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the container the error is about, if it names one.
    pub fn container_id(&self) -> Option<&ContainerID> {
        match self {
            Error::CgroupNotFound { container_id, .. }
            | Error::SandboxNotFound { container_id, .. }
            | Error::InvalidResources { container_id, .. } => Some(container_id),
            _ => None,
        }
    }
}

/// Parse failures of cgroup stat files.
#[derive(Debug, thiserror::Error)]
pub enum StatParseError {
    #[error("duplicate field '{field}' at line {line}")]
    DuplicateField { field: String, line: usize },

    #[error("invalid value for '{key}' at line {line}: '{value}': {source}")]
    InvalidKeyValue {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid value at line {line}: '{value}': {source}")]
    InvalidValue {
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}
