use chrono::NaiveDateTime;
use salvo::http::{Method, StatusCode};
use salvo::oapi::{self, EndpointOutRegister, ToSchema};
use salvo::prelude::*;
use serde::Serialize;

/// A chat message in plaintext form, only ever built for delivery.
#[derive(Debug, Serialize, Clone, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i32,
    pub room_id: i32,
    pub sender_id: i32,
    pub sender_name: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_edited: bool,
}

#[async_trait]
impl Writer for MessageResponse {
    async fn write(self, req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        if req.method() == Method::POST {
            res.status_code(StatusCode::CREATED);
            res.render(Json(self));
        } else {
            res.status_code(StatusCode::OK);
            res.render(Json(self));
        }
    }
}

impl EndpointOutRegister for MessageResponse {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::OK.as_str(),
            oapi::Response::new("OK")
                .add_content("application/json", MessageResponse::to_schema(components)),
        );
        operation.responses.insert(
            StatusCode::CREATED.as_str(),
            oapi::Response::new("Created")
                .add_content("application/json", MessageResponse::to_schema(components)),
        );
    }
}
