use salvo::http::StatusCode;
use salvo::oapi::{self, ToSchema};
use salvo::prelude::*;
use serde::Serialize;

pub mod auth_error;
pub mod chat_error;
pub mod general;
pub mod recording_error;
pub mod room_error;

/// Taxonomy shared by every feature error, used for HTTP status codes and
/// for the `code` field of real-time error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    Capacity,
    Validation,
    RateLimit,
    Conflict,
    Integrity,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization | ErrorKind::Integrity => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Capacity | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "AUTHENTICATION",
            ErrorKind::Authorization => "AUTHORIZATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Capacity => "CAPACITY",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Integrity => "INTEGRITY",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

pub(crate) fn render_error(res: &mut Response, status: StatusCode, message: String) {
    res.status_code(status);
    res.render(Json(serde_json::json!({ "message": message })));
}

pub(crate) fn register_error_responses(
    components: &mut oapi::Components,
    operation: &mut oapi::Operation,
    statuses: &[(StatusCode, &str)],
) {
    for (status, description) in statuses {
        let schema = if *status == StatusCode::NOT_FOUND {
            NotFoundError::to_schema(components)
        } else if *status == StatusCode::INTERNAL_SERVER_ERROR {
            InternalError::to_schema(components)
        } else {
            BadRequestError::to_schema(components)
        };
        operation.responses.insert(
            status.as_str(),
            oapi::Response::new(*description).add_content("application/json", schema),
        );
    }
}

#[derive(Debug, ToSchema, Serialize)]
#[salvo(schema(example = json!({"message": ""})))]
struct NotFoundError {
    message: String,
}

#[derive(Debug, ToSchema, Serialize)]
#[salvo(schema(example = json!({"message": ""})))]
struct BadRequestError {
    message: String,
}

#[derive(Debug, ToSchema, Serialize)]
#[salvo(schema(example = json!({"message": ""})))]
struct InternalError {
    message: String,
}
