use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaiterError {
    #[error("a waiter is already registered for msg_id {0}")]
    DuplicateWaiter(u16),
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("no active flow to inject on")]
    NoActiveFlow,
    #[error("failed to build injected frame: {0}")]
    BuildFrameFailed(#[from] liqi_wire::CodecError),
    #[error("host refused injection: {0}")]
    InjectFailed(String),
    #[error("no event loop registered to schedule the injection on")]
    NoMasterLoop,
}

impl InjectError {
    /// Renders as the short `reason` string the C6/C8 layers classify by
    /// substring — mirrors the original's plain-string failure reasons.
    pub fn as_reason(&self) -> String {
        match self {
            InjectError::NoActiveFlow => "no-preferred-flow".to_owned(),
            InjectError::BuildFrameFailed(e) => format!("build-frame-failed:{e}"),
            InjectError::InjectFailed(detail) => format!("inject-failed:{detail}"),
            InjectError::NoMasterLoop => "no-master-loop".to_owned(),
        }
    }
}
