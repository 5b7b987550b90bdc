use serde::Serialize;

use crate::core::entities::models::ParticipantRole;

use super::message_response::MessageResponse;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPresenceResponse {
    pub room_id: i32,
    pub user_id: i32,
    pub username: String,
    pub role: ParticipantRole,
}

/// Reply to the joining connection itself.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedResponse {
    pub room_id: i32,
    pub role: ParticipantRole,
    pub online_usernames: Vec<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedResponse {
    pub room_id: i32,
    pub message_id: i32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLoadedResponse {
    pub room_id: i32,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeletedResponse {
    pub room_id: i32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocketErrorResponse {
    /// Inbound event that failed.
    pub event: String,
    pub code: String,
    pub message: String,
}
