use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoRunError {
    #[error("autorun already running")]
    AlreadyRunning,
    #[error("autorun not ready: {0}")]
    NotReady(String),
    #[error("aborted: {0}")]
    Aborted(String),
}
