use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use validator_derive::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StopRecordingDto {
    pub recording_id: i32,

    /// Capability token of the room the recording belongs to. Without it the
    /// caller's identity alone must entitle them to stop the session.
    #[validate(length(min = 1))]
    #[serde(default)]
    pub capability_token: Option<String>,
}
