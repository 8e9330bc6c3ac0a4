#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id: {0:?}")]
    InvalidContainerID(String),
    #[error("invalid sandbox id: {0:?}")]
    InvalidSandboxID(String),
}
pub type Result<T> = std::result::Result<T, Error>;
