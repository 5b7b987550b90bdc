use salvo::oapi::ToSchema;
use serde::{Deserialize, Serialize};
use validator_derive::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[salvo(schema(example = json!({"roomId": 1, "password": "123123"})))]
pub struct JoinRoomDto {
    pub room_id: i32,

    #[validate(length(max = 128))]
    pub password: String,
}
