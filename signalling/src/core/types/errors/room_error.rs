use salvo::http::StatusCode;
use salvo::oapi::{self, EndpointOutRegister};
use salvo::prelude::*;
use thiserror::Error;
use tracing::error;

use super::{
    ErrorKind, auth_error::AuthError, general::GeneralError, register_error_responses,
    render_error,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoomError {
    #[error("Room with ID {0} not found")]
    RoomNotFound(i32),

    /// Shared by "no such room" and "wrong password" on join.
    #[error("Room not found or password is incorrect")]
    AccessDenied,

    #[error("Room is full: at most {0} participants are allowed")]
    RoomFull(i32),

    #[error("You already own {0} active rooms, which is the maximum allowed")]
    QuotaExceeded(i64),

    #[error("Only the room creator or an administrator has permission")]
    NotOwner,

    #[error("You are not a participant of this room")]
    NotParticipant,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("An unexpected error occurred")]
    UnexpectedError(String),

    #[error("General error: {0}")]
    General(#[from] GeneralError),
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::RoomNotFound(_) => ErrorKind::NotFound,
            RoomError::AccessDenied | RoomError::NotOwner | RoomError::NotParticipant => {
                ErrorKind::Authorization
            }
            RoomError::RoomFull(_) | RoomError::QuotaExceeded(_) => ErrorKind::Capacity,
            RoomError::Validation(_) => ErrorKind::Validation,
            RoomError::Auth(err) => err.kind(),
            RoomError::UnexpectedError(_) | RoomError::General(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RoomError::AccessDenied => StatusCode::UNAUTHORIZED,
            _ => self.kind().status_code(),
        }
    }
}

#[async_trait]
impl Writer for RoomError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        if let RoomError::UnexpectedError(detail) = &self {
            error!("room request failed: {}", detail);
        }

        render_error(res, self.status_code(), self.to_string());
    }
}

impl EndpointOutRegister for RoomError {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        register_error_responses(
            components,
            operation,
            &[
                (StatusCode::BAD_REQUEST, "Room is full, quota exceeded or invalid input"),
                (StatusCode::UNAUTHORIZED, "Room not found or password is incorrect"),
                (StatusCode::FORBIDDEN, "Only the host has permission"),
                (StatusCode::NOT_FOUND, "Room not found"),
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected or general error"),
            ],
        );
    }
}
