use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;
mod model;
mod state;

pub use error::{Error, Result};
pub use model::{Container, ContainerBuilder, ContainerMetadata, Sandbox};
pub use state::ContainerState;

/// The maximum allowed length for a [`ContainerID`] or [`SandboxID`].
const ID_MAX_LEN: usize = 255;

fn validate_id(src: &str) -> bool {
    !src.is_empty() && src.len() <= ID_MAX_LEN && !src.contains('/')
}

/// A validated container identifier.
///
/// # Examples
///
/// ```
/// # use creo_cri::container::ContainerID;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), raw_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty, contains a `/`,
    /// or is longer than 255 bytes.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if !validate_id(src) {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ContainerID {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A validated pod sandbox identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxID(Arc<str>);

impl SandboxID {
    /// Creates a new `SandboxID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSandboxID`] under the same rules as [`ContainerID::new`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if !validate_id(src) {
            return Err(Error::InvalidSandboxID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SandboxID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SandboxID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_valid() {
        let id = ContainerID::new("0123abcd").unwrap();
        assert_eq!(id.as_str(), "0123abcd");
        assert_eq!(id.to_string(), "0123abcd");
    }

    #[test]
    fn test_container_id_rejects_empty_and_long() {
        assert!(matches!(
            ContainerID::new(""),
            Err(Error::InvalidContainerID(_))
        ));
        let long = "a".repeat(ID_MAX_LEN + 1);
        assert!(matches!(
            ContainerID::new(&long),
            Err(Error::InvalidContainerID(_))
        ));
        assert!(ContainerID::new("a".repeat(ID_MAX_LEN)).is_ok());
    }

    #[test]
    fn test_ids_reject_path_separators() {
        assert!(ContainerID::new("../etc").is_err());
        assert!(matches!(
            SandboxID::new("pod/1"),
            Err(Error::InvalidSandboxID(_))
        ));
    }
}
