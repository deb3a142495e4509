use crate::permissions::Action;
use crate::types::enums::{SessionOperation, SessionStatus, UserRole};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("operation {operation:?} not permitted while session is {from:?}")]
    InvalidTransition {
        from: SessionStatus,
        operation: SessionOperation,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("role {role:?} lacks permission {action:?}")]
    Denied { role: UserRole, action: Action },
    #[error("actor is not assigned to this session")]
    NotAssigned,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    UserNotFound,
    #[error("machine not found")]
    MachineNotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum TestboxError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("internal error: {message}")]
    Internal { message: String },
}
