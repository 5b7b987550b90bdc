use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use validator_derive::Validate;

use crate::core::entities::models::PrivacyLevel;

fn default_privacy_level() -> PrivacyLevel {
    PrivacyLevel::Public
}

fn default_is_encrypted() -> bool {
    true
}

/// `maxParticipants` is checked against the configured bounds by the room service.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate, Clone)]
#[serde(rename_all = "camelCase")]
#[salvo(schema(example = json!(
    {
        "name": "Math101",
        "description": "Algebra, second term",
        "password": "123123",
        "privacyLevel": "public",
        "maxParticipants": 30,
        "allowRecording": true
    }
)))]
pub struct CreateRoomDto {
    #[validate(length(min = 3, max = 100))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    #[serde(default = "default_privacy_level")]
    pub privacy_level: PrivacyLevel,

    pub max_participants: i32,

    #[serde(default)]
    pub allow_recording: bool,

    #[serde(default = "default_is_encrypted")]
    pub is_encrypted: bool,
}
