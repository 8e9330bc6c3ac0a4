//! Environment-driven configuration.
//!
//! | Variable              | Default                                   |
//! |-----------------------|-------------------------------------------|
//! | `ROOTFS_MOUNT_PATH`   | `/`                                       |
//! | `CREO_STORAGE_DRIVER` | `overlay`                                 |
//! | `CREO_CGROUP_MANAGER` | `systemd`                                 |
//! | `CREO_CGROUP_ROOT`    | detected from `<rootfs>/proc/self/mountinfo` |

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::runtime::CgroupManager;

const ROOTFS_VAR: &str = "ROOTFS_MOUNT_PATH";
const STORAGE_DRIVER_VAR: &str = "CREO_STORAGE_DRIVER";
const CGROUP_MANAGER_VAR: &str = "CREO_CGROUP_MANAGER";
const CGROUP_ROOT_VAR: &str = "CREO_CGROUP_ROOT";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `{var}` is not valid unicode: {value:?}")]
    NotUnicode { var: &'static str, value: OsString },
    #[error("invalid value `{value}` for environment variable `{var}`: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// The storage driver managing container root filesystems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageDriver {
    /// Writable layers are `diff` directories next to the `merged` mount point.
    Overlay,
    /// Any other driver; its writable layer is not measured.
    Other(String),
}

impl StorageDriver {
    pub fn is_overlay(&self) -> bool {
        matches!(self, StorageDriver::Overlay)
    }
}

impl FromStr for StorageDriver {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "overlay" => StorageDriver::Overlay,
            other => StorageDriver::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageDriver::Overlay => f.write_str("overlay"),
            StorageDriver::Other(name) => f.write_str(name),
        }
    }
}

impl serde::Serialize for StorageDriver {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Config {
    /// Root of the host filesystem as seen by this process.
    pub rootfs: PathBuf,
    pub storage_driver: StorageDriver,
    pub cgroup_manager: CgroupManager,
    /// Explicit cgroup2 mount point; detected from mountinfo when `None`.
    pub cgroup_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rootfs: PathBuf::from("/"),
            storage_driver: StorageDriver::Overlay,
            cgroup_manager: CgroupManager::Systemd,
            cgroup_root: None,
        }
    }
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a non-unicode or unknown value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var_os(var))
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(rootfs) = lookup(ROOTFS_VAR) {
            config.rootfs = PathBuf::from(rootfs);
        }
        if let Some(driver) = string_var(&lookup, STORAGE_DRIVER_VAR)? {
            config.storage_driver = match driver.parse() {
                Ok(driver) => driver,
                Err(never) => match never {},
            };
        }
        if let Some(manager) = string_var(&lookup, CGROUP_MANAGER_VAR)? {
            config.cgroup_manager = match manager.as_str() {
                "systemd" => CgroupManager::Systemd,
                "cgroupfs" => CgroupManager::Cgroupfs,
                _ => {
                    return Err(Error::InvalidValue {
                        var: CGROUP_MANAGER_VAR,
                        value: manager,
                        reason: "expected `systemd` or `cgroupfs`",
                    });
                }
            };
        }
        config.cgroup_root = lookup(CGROUP_ROOT_VAR).map(PathBuf::from);

        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

fn string_var(
    lookup: &impl Fn(&str) -> Option<OsString>,
    var: &'static str,
) -> Result<Option<String>> {
    lookup(var)
        .map(|value| {
            value
                .into_string()
                .map_err(|value| Error::NotUnicode { var, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.storage_driver.is_overlay());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ROOTFS_MOUNT_PATH", "/rootfs"),
            ("CREO_STORAGE_DRIVER", "vfs"),
            ("CREO_CGROUP_MANAGER", "cgroupfs"),
            ("CREO_CGROUP_ROOT", "/sys/fs/cgroup"),
        ]))
        .unwrap();

        assert_eq!(config.rootfs, PathBuf::from("/rootfs"));
        assert_eq!(config.storage_driver, StorageDriver::Other("vfs".to_owned()));
        assert_eq!(config.cgroup_manager, CgroupManager::Cgroupfs);
        assert_eq!(config.cgroup_root, Some(PathBuf::from("/sys/fs/cgroup")));
    }

    #[test]
    fn test_invalid_cgroup_manager() {
        let err = Config::from_lookup(lookup(&[("CREO_CGROUP_MANAGER", "cgmanager")])).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidValue { var: "CREO_CGROUP_MANAGER", .. }
        ));
    }

    #[test]
    fn test_storage_driver_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&StorageDriver::Overlay).unwrap(),
            "\"overlay\""
        );
        assert_eq!(
            serde_json::to_string(&StorageDriver::Other("btrfs".to_owned())).unwrap(),
            "\"btrfs\""
        );
    }
}
