use salvo::http::StatusCode;
use salvo::oapi::{self, EndpointOutRegister};
use salvo::prelude::*;
use thiserror::Error;
use tracing::error;

use super::{
    ErrorKind, auth_error::AuthError, general::GeneralError, register_error_responses,
    render_error, room_error::RoomError,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChatError {
    #[error("Message with ID {0} not found")]
    MessageNotFound(i32),

    #[error("Room with ID {0} not found")]
    RoomNotFound(i32),

    #[error("You are not a participant of this room")]
    NotParticipant,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(
        "Too many messages: at most {max_messages} per {window_seconds}s, retry in {retry_after_seconds}s"
    )]
    RateLimited {
        max_messages: usize,
        window_seconds: u64,
        retry_after_seconds: u64,
    },

    #[error("Invalid message: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("An unexpected error occurred")]
    UnexpectedError(String),

    #[error("General error: {0}")]
    General(#[from] GeneralError),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::MessageNotFound(_) | ChatError::RoomNotFound(_) => ErrorKind::NotFound,
            ChatError::NotParticipant | ChatError::Forbidden(_) => ErrorKind::Authorization,
            ChatError::RateLimited { .. } => ErrorKind::RateLimit,
            ChatError::Validation(_) => ErrorKind::Validation,
            ChatError::Auth(err) => err.kind(),
            ChatError::UnexpectedError(_) | ChatError::General(_) => ErrorKind::Internal,
        }
    }
}

impl From<RoomError> for ChatError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::RoomNotFound(room_id) => ChatError::RoomNotFound(room_id),
            RoomError::NotParticipant => ChatError::NotParticipant,
            RoomError::Validation(detail) => ChatError::Validation(detail),
            RoomError::Auth(err) => ChatError::Auth(err),
            RoomError::General(err) => ChatError::General(err),
            RoomError::UnexpectedError(detail) => ChatError::UnexpectedError(detail),
            other => ChatError::Forbidden(other.to_string()),
        }
    }
}

#[async_trait]
impl Writer for ChatError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        if let ChatError::UnexpectedError(detail) = &self {
            error!("chat request failed: {}", detail);
        }

        render_error(res, self.kind().status_code(), self.to_string());
    }
}

impl EndpointOutRegister for ChatError {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        register_error_responses(
            components,
            operation,
            &[
                (StatusCode::BAD_REQUEST, "Invalid message"),
                (StatusCode::FORBIDDEN, "Forbidden"),
                (StatusCode::NOT_FOUND, "Room or message not found"),
                (StatusCode::TOO_MANY_REQUESTS, "Flood limit exceeded"),
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected or general error"),
            ],
        );
    }
}
