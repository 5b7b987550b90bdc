use chrono::NaiveDateTime;
use salvo::http::StatusCode;
use salvo::oapi::{self, EndpointOutRegister, ToSchema};
use salvo::prelude::*;
use serde::Serialize;

use crate::core::entities::models::{Recording, RecordingStatus};

#[derive(Debug, Serialize, Clone, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResponse {
    pub recording_id: i32,
    pub room_id: i32,
    pub started_by: i32,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub status: RecordingStatus,
}

impl From<Recording> for RecordingResponse {
    fn from(recording: Recording) -> Self {
        Self {
            status: recording.status(),
            recording_id: recording.id,
            room_id: recording.room_id,
            started_by: recording.started_by,
            started_at: recording.started_at,
            ended_at: recording.ended_at,
        }
    }
}

#[async_trait]
impl Writer for RecordingResponse {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(StatusCode::OK);
        res.render(Json(self));
    }
}

impl EndpointOutRegister for RecordingResponse {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::OK.as_str(),
            oapi::Response::new("OK")
                .add_content("application/json", RecordingResponse::to_schema(components)),
        );
    }
}

#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordingResponse {
    pub recordings: Vec<RecordingResponse>,
}

#[async_trait]
impl Writer for ListRecordingResponse {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(StatusCode::OK);
        res.render(Json(self));
    }
}

impl EndpointOutRegister for ListRecordingResponse {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::OK.as_str(),
            oapi::Response::new("OK").add_content(
                "application/json",
                ListRecordingResponse::to_schema(components),
            ),
        );
    }
}
