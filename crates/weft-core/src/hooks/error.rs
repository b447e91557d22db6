use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookSystemError {
    #[error("No hook handler registered with id {id}")]
    HandlerNotFound { id: u64 },
}
