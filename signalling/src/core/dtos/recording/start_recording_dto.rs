use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use validator_derive::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingDto {
    pub room_id: i32,

    #[validate(length(min = 1))]
    pub capability_token: String,
}
