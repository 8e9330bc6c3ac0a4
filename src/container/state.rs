use std::fmt;

/// Lifecycle state of a container as tracked by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Stopped,
}

impl ContainerState {
    /// Returns `true` if the container accepts live resource updates.
    pub fn is_alive(self) -> bool {
        matches!(self, ContainerState::Created | ContainerState::Running)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_alive() {
        assert!(ContainerState::Created.is_alive());
        assert!(ContainerState::Running.is_alive());
        assert!(!ContainerState::Paused.is_alive());
        assert!(!ContainerState::Stopped.is_alive());
    }
}
