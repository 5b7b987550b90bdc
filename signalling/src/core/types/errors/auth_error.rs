use salvo::http::StatusCode;
use salvo::oapi::{self, EndpointOutRegister};
use salvo::prelude::*;
use thiserror::Error;

use super::{ErrorKind, register_error_responses, render_error};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Failed to decode token")]
    InvalidToken,

    #[error("Capability token has expired, join the room again")]
    TokenExpired,

    #[error("Capability token was issued for room {token_room}, not room {requested_room}")]
    RoomMismatch { token_room: i32, requested_room: i32 },

    #[error("This connection holds no capability token for room {0}")]
    NoGrant(i32),

    #[error("Capability token does not belong to the authenticated user")]
    PrincipalMismatch,

    #[error("Failed to issue token")]
    TokenIssueFailed,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::TokenExpired => {
                ErrorKind::Authentication
            }
            AuthError::RoomMismatch { .. } | AuthError::NoGrant(_) | AuthError::PrincipalMismatch => {
                ErrorKind::Integrity
            }
            AuthError::TokenIssueFailed => ErrorKind::Internal,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

#[async_trait]
impl Writer for AuthError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        render_error(res, self.kind().status_code(), self.to_string());
    }
}

impl EndpointOutRegister for AuthError {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        register_error_responses(
            components,
            operation,
            &[
                (StatusCode::UNAUTHORIZED, "Missing, invalid or expired token"),
                (StatusCode::FORBIDDEN, "Capability token does not match the request"),
            ],
        );
    }
}
