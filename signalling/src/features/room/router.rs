use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use socketioxide::SocketIo;
use validator::Validate;

use crate::{
    core::{
        dtos::{
            common::pagination_dto::PaginationDto,
            room::{create_room_dto::CreateRoomDto, join_room_dto::JoinRoomDto},
        },
        socket::{detach_sockets, gateway::RoomGateway},
        types::{
            errors::room_error::RoomError,
            responses::{
                list_room_response::ListRoomResponse,
                no_content_response::NoContentResponse,
                room_response::{JoinRoomResponse, RoomDetailsResponse, RoomSummary},
            },
        },
        utils::jwt_utils::{JwtUtils, current_principal},
    },
};

use super::service::{RoomService, RoomServiceImpl};

pub fn get_room_router(jwt_utils: JwtUtils) -> Router {
    // `join` must be matched before the `{room_id}` routes.
    Router::with_hoop(jwt_utils.auth_middleware())
        .path("rooms")
        .post(create_room)
        .get(get_rooms)
        .push(Router::with_path("join").post(join_room))
        .push(
            Router::with_path("{room_id}")
                .get(get_room)
                .delete(delete_room),
        )
        .push(Router::with_path("{room_id}/leave").post(leave_room))
}

fn room_service(depot: &Depot) -> Result<&RoomServiceImpl, RoomError> {
    depot
        .obtain::<RoomServiceImpl>()
        .map_err(|_| RoomError::UnexpectedError("room service is not configured".into()))
}

fn room_gateway(depot: &Depot) -> Result<&RoomGateway, RoomError> {
    depot
        .obtain::<RoomGateway>()
        .map_err(|_| RoomError::UnexpectedError("room gateway is not configured".into()))
}

/// Stops real-time delivery to connections whose grant was revoked.
fn detach(depot: &Depot, sids: &[String], room_id: i32) {
    if let Ok(io) = depot.obtain::<SocketIo>() {
        detach_sockets(io, sids, room_id);
    }
}

/// Creates a password-protected room owned by the caller.
#[endpoint(tags("room"), status_codes(200, 400, 401, 500))]
async fn create_room(
    _res: &mut Response,
    data: JsonBody<CreateRoomDto>,
    depot: &mut Depot,
) -> Result<RoomSummary, RoomError> {
    let data = data.into_inner();
    data.validate()
        .map_err(|err| RoomError::Validation(err.to_string()))?;

    let principal = current_principal(depot)?;

    let room = room_service(depot)?.create_room(data, &principal).await?;

    Ok(room)
}

/// Lists active rooms visible to the caller. Never includes password material.
#[endpoint(tags("room"), status_codes(200, 400, 401, 500))]
async fn get_rooms(
    _res: &mut Response,
    pagination_dto: PaginationDto,
    depot: &mut Depot,
) -> Result<ListRoomResponse, RoomError> {
    pagination_dto
        .validate()
        .map_err(|err| RoomError::Validation(err.to_string()))?;

    let principal = current_principal(depot)?;

    let rooms = room_service(depot)?
        .list_rooms(&principal, pagination_dto)
        .await?;

    Ok(ListRoomResponse { rooms })
}

/// Checks the room password and capacity, then issues a capability token.
/// The seat is freed if no connection claims it before the token expires.
#[endpoint(tags("room"), status_codes(200, 400, 401, 500))]
async fn join_room(
    _res: &mut Response,
    data: JsonBody<JoinRoomDto>,
    depot: &mut Depot,
) -> Result<JoinRoomResponse, RoomError> {
    let data = data.into_inner();
    data.validate()
        .map_err(|err| RoomError::Validation(err.to_string()))?;

    let principal = current_principal(depot)?;

    let joined = room_gateway(depot)?
        .join_over_http(data.room_id, &data.password, &principal)
        .await?;

    Ok(joined)
}

#[endpoint(tags("room"), status_codes(200, 401, 404, 500))]
async fn get_room(
    _res: &mut Response,
    room_id: PathParam<i32>,
    depot: &mut Depot,
) -> Result<RoomDetailsResponse, RoomError> {
    let principal = current_principal(depot)?;
    let room_id = room_id.into_inner();

    let details = room_gateway(depot)?
        .room_details(room_id, &principal)
        .await?;

    Ok(details)
}

/// Leaves the room, freeing the caller's seat on every connection.
#[endpoint(tags("room"), status_codes(204, 401, 403, 404, 500))]
async fn leave_room(
    _res: &mut Response,
    room_id: PathParam<i32>,
    depot: &mut Depot,
) -> Result<NoContentResponse, RoomError> {
    let principal = current_principal(depot)?;
    let room_id = room_id.into_inner();

    let revoked = room_gateway(depot)?
        .leave_user(room_id, principal.user_id)
        .await?;
    detach(depot, &revoked, room_id);

    Ok(NoContentResponse)
}

/// Deletes the room with its participants, messages and recordings.
/// Creator or administrator only.
#[endpoint(tags("room"), status_codes(204, 401, 403, 404, 500))]
async fn delete_room(
    _res: &mut Response,
    room_id: PathParam<i32>,
    depot: &mut Depot,
) -> Result<NoContentResponse, RoomError> {
    let principal = current_principal(depot)?;
    let room_id = room_id.into_inner();

    let revoked = room_gateway(depot)?.delete_room(room_id, &principal).await?;
    detach(depot, &revoked, room_id);

    Ok(NoContentResponse)
}
