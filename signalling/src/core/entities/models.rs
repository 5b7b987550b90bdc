use chrono::NaiveDateTime;
use diesel::prelude::*;
use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};

use crate::core::database::schema::{messages, participants, recordings, rooms};
use crate::impl_from_i16_with_default;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[repr(i16)]
pub enum PrivacyLevel {
    Public = 0,
    Private = 1,
    InviteOnly = 2,
}

impl_from_i16_with_default!(PrivacyLevel {
    InviteOnly = 2,
    Private = 1,
    Public = 0,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum ParticipantRole {
    Participant = 0,
    Moderator = 1,
}

impl_from_i16_with_default!(ParticipantRole {
    Participant = 0,
    Moderator = 1,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum RecordingStatus {
    Recording = 0,
    Stopped = 1,
}

impl_from_i16_with_default!(RecordingStatus {
    Stopped = 1,
    Recording = 0,
});

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Room {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub password_hash: String,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
    pub last_activity_at: NaiveDateTime,
    pub privacy_level: i16,
    pub max_participants: i32,
    pub allow_recording: bool,
    pub is_encrypted: bool,
    pub is_active: bool,
}

impl Room {
    pub fn privacy(&self) -> PrivacyLevel {
        PrivacyLevel::from(self.privacy_level)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub password_hash: &'a str,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
    pub last_activity_at: NaiveDateTime,
    pub privacy_level: i16,
    pub max_participants: i32,
    pub allow_recording: bool,
    pub is_encrypted: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Room))]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Participant {
    pub id: i32,
    pub room_id: i32,
    pub user_id: i32,
    pub username: String,
    pub role: i16,
    pub joined_at: NaiveDateTime,
    pub left_at: Option<NaiveDateTime>,
}

impl Participant {
    pub fn role(&self) -> ParticipantRole {
        ParticipantRole::from(self.role)
    }

    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Upsert payload; re-joining clears `left_at`.
#[derive(Debug, Insertable)]
#[diesel(table_name = participants)]
pub struct NewParticipant<'a> {
    pub room_id: i32,
    pub user_id: i32,
    pub username: &'a str,
    pub role: i16,
    pub joined_at: NaiveDateTime,
    pub left_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Room))]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    pub id: i32,
    pub room_id: i32,
    pub sender_id: i32,
    pub sender_name: String,
    pub ciphertext: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_deleted: bool,
    pub is_edited: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub room_id: i32,
    pub sender_id: i32,
    pub sender_name: &'a str,
    pub ciphertext: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_deleted: bool,
    pub is_edited: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Room))]
#[diesel(table_name = recordings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Recording {
    pub id: i32,
    pub room_id: i32,
    pub started_by: i32,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub status: i16,
}

impl Recording {
    pub fn status(&self) -> RecordingStatus {
        RecordingStatus::from(self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recordings)]
pub struct NewRecording {
    pub room_id: i32,
    pub started_by: i32,
    pub started_at: NaiveDateTime,
    pub status: i16,
}
