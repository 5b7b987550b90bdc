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
pub enum RecordingError {
    #[error("Room with ID {0} not found")]
    RoomNotFound(i32),

    #[error("Recording is not allowed in this room")]
    RecordingNotAllowed,

    #[error("Only a moderator of this room has permission")]
    NotModerator,

    #[error("You are not a participant of this room")]
    NotParticipant,

    #[error("Only the user who started the recording or a moderator can stop it")]
    NotStarter,

    #[error("A recording is already active in this room")]
    AlreadyRecording,

    #[error("No active recording with ID {0}")]
    SessionNotFound(i32),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("An unexpected error occurred")]
    UnexpectedError(String),

    #[error("General error: {0}")]
    General(#[from] GeneralError),
}

impl RecordingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordingError::RoomNotFound(_) | RecordingError::SessionNotFound(_) => {
                ErrorKind::NotFound
            }
            RecordingError::RecordingNotAllowed => ErrorKind::Validation,
            RecordingError::NotModerator
            | RecordingError::NotParticipant
            | RecordingError::NotStarter => ErrorKind::Authorization,
            RecordingError::AlreadyRecording => ErrorKind::Conflict,
            RecordingError::Auth(err) => err.kind(),
            RecordingError::UnexpectedError(_) | RecordingError::General(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<RoomError> for RecordingError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::RoomNotFound(room_id) => RecordingError::RoomNotFound(room_id),
            RoomError::NotParticipant => RecordingError::NotParticipant,
            RoomError::Auth(err) => RecordingError::Auth(err),
            RoomError::General(err) => RecordingError::General(err),
            RoomError::UnexpectedError(detail) => RecordingError::UnexpectedError(detail),
            other => RecordingError::UnexpectedError(other.to_string()),
        }
    }
}

#[async_trait]
impl Writer for RecordingError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        if let RecordingError::UnexpectedError(detail) = &self {
            error!("recording request failed: {}", detail);
        }

        render_error(res, self.kind().status_code(), self.to_string());
    }
}

impl EndpointOutRegister for RecordingError {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        register_error_responses(
            components,
            operation,
            &[
                (StatusCode::BAD_REQUEST, "Recording is not allowed in this room"),
                (StatusCode::UNAUTHORIZED, "Missing, invalid or expired capability token"),
                (StatusCode::FORBIDDEN, "Insufficient role or token for another room"),
                (StatusCode::NOT_FOUND, "Room or recording not found"),
                (StatusCode::CONFLICT, "A recording is already active"),
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected or general error"),
            ],
        );
    }
}
