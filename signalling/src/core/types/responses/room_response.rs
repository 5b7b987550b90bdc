use chrono::NaiveDateTime;
use salvo::http::StatusCode;
use salvo::oapi::{self, EndpointOutRegister, ToSchema};
use salvo::prelude::*;
use serde::Serialize;

use crate::core::entities::models::{ParticipantRole, PrivacyLevel, Room};

/// Public view of a room; never carries password material.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
    pub last_activity_at: NaiveDateTime,
    pub privacy_level: PrivacyLevel,
    pub max_participants: i32,
    pub allow_recording: bool,
    pub is_encrypted: bool,
    pub online_count: usize,
}

impl RoomSummary {
    pub fn new(room: &Room, online_count: usize) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
            creator_id: room.creator_id,
            created_at: room.created_at,
            last_activity_at: room.last_activity_at,
            privacy_level: room.privacy(),
            max_participants: room.max_participants,
            allow_recording: room.allow_recording,
            is_encrypted: room.is_encrypted,
            online_count,
        }
    }
}

#[async_trait]
impl Writer for RoomSummary {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(StatusCode::OK);
        res.render(Json(self));
    }
}

impl EndpointOutRegister for RoomSummary {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::OK.as_str(),
            oapi::Response::new("OK")
                .add_content("application/json", RoomSummary::to_schema(components)),
        );
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailsResponse {
    #[serde(flatten)]
    pub room: RoomSummary,
    pub online_usernames: Vec<String>,
    pub is_recording: bool,
}

#[async_trait]
impl Writer for RoomDetailsResponse {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(StatusCode::OK);
        res.render(Json(self));
    }
}

impl EndpointOutRegister for RoomDetailsResponse {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::OK.as_str(),
            oapi::Response::new("OK").add_content(
                "application/json",
                RoomDetailsResponse::to_schema(components),
            ),
        );
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub capability_token: String,
    /// Unix timestamp after which the token is rejected.
    pub expires_at: i64,
    pub role: ParticipantRole,
    pub room: RoomSummary,
}

#[async_trait]
impl Writer for JoinRoomResponse {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(StatusCode::OK);
        res.render(Json(self));
    }
}

impl EndpointOutRegister for JoinRoomResponse {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::OK.as_str(),
            oapi::Response::new("OK")
                .add_content("application/json", JoinRoomResponse::to_schema(components)),
        );
    }
}
