use async_channel::Sender;
use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use validator::Validate;

use crate::core::{
    dtos::{chat::edit_message_dto::EditMessageDto, common::pagination_dto::PaginationDto},
    types::{
        app_channel::{AppEvent, publish},
        errors::chat_error::ChatError,
        responses::{
            list_message_response::ListMessageResponse, message_response::MessageResponse,
            no_content_response::NoContentResponse,
        },
    },
    utils::jwt_utils::{JwtUtils, current_principal},
};

use super::service::{ChatService, ChatServiceImpl};

pub fn get_chat_router(jwt_utils: JwtUtils) -> Router {
    Router::with_hoop(jwt_utils.auth_middleware())
        .push(Router::with_path("rooms/{room_id}/messages").get(get_messages_by_room))
        .push(
            Router::with_path("chats/{message_id}")
                .put(update_message)
                .delete(delete_message),
        )
}

fn chat_service(depot: &Depot) -> Result<&ChatServiceImpl, ChatError> {
    depot
        .obtain::<ChatServiceImpl>()
        .map_err(|_| ChatError::UnexpectedError("chat service is not configured".into()))
}

fn event_sender(depot: &Depot) -> Result<&Sender<AppEvent>, ChatError> {
    depot
        .obtain::<Sender<AppEvent>>()
        .map_err(|_| ChatError::UnexpectedError("event channel is not configured".into()))
}

/// Latest page of a room's history, oldest first. Participants only.
#[endpoint(tags("chats"), status_codes(200, 400, 401, 403, 404, 500))]
async fn get_messages_by_room(
    _res: &mut Response,
    room_id: PathParam<i32>,
    pagination_dto: PaginationDto,
    depot: &mut Depot,
) -> Result<ListMessageResponse, ChatError> {
    pagination_dto
        .validate()
        .map_err(|err| ChatError::Validation(err.to_string()))?;

    let principal = current_principal(depot)?;
    let chat_service = chat_service(depot)?;
    let room_id = room_id.into_inner();

    let messages = chat_service
        .history(room_id, principal.user_id, pagination_dto)
        .await?;

    Ok(ListMessageResponse { room_id, messages })
}

/// Edit message
#[endpoint(tags("chats"), status_codes(200, 400, 401, 403, 404, 500))]
async fn update_message(
    _res: &mut Response,
    message_id: PathParam<i32>,
    data: JsonBody<EditMessageDto>,
    depot: &mut Depot,
) -> Result<MessageResponse, ChatError> {
    let data = data.into_inner();
    data.validate()
        .map_err(|err| ChatError::Validation(err.to_string()))?;

    let principal = current_principal(depot)?;
    let chat_service = chat_service(depot)?;

    let message = chat_service
        .edit_message(message_id.into_inner(), &principal, &data.content)
        .await?;

    publish(event_sender(depot)?, AppEvent::MessageUpdated(message.clone()));

    Ok(message)
}

/// Delete message
#[endpoint(tags("chats"), status_codes(204, 401, 403, 404, 500))]
async fn delete_message(
    _res: &mut Response,
    message_id: PathParam<i32>,
    depot: &mut Depot,
) -> Result<NoContentResponse, ChatError> {
    let principal = current_principal(depot)?;
    let chat_service = chat_service(depot)?;

    let deleted = chat_service
        .delete_message(message_id.into_inner(), &principal)
        .await?;

    publish(event_sender(depot)?, AppEvent::MessageDeleted(deleted));

    Ok(NoContentResponse)
}
