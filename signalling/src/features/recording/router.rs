use async_channel::Sender;
use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use validator::Validate;

use crate::core::{
    dtos::recording::{
        start_recording_dto::StartRecordingDto, stop_recording_dto::StopRecordingDto,
    },
    entities::principal::Principal,
    types::{
        app_channel::{AppEvent, publish},
        errors::{auth_error::AuthError, recording_error::RecordingError},
        responses::recording_response::{ListRecordingResponse, RecordingResponse},
    },
    utils::jwt_utils::{JwtUtils, RoomTokenClaims, current_principal},
};

use super::service::{RecordingService, RecordingServiceImpl};

pub fn get_recording_router(jwt_utils: JwtUtils) -> Router {
    Router::with_hoop(jwt_utils.auth_middleware())
        .path("rooms")
        .push(Router::with_path("recording/start").post(start_recording))
        .push(Router::with_path("recording/stop").post(stop_recording))
        .push(Router::with_path("{room_id}/recordings").get(get_recordings_by_room))
}

fn recording_service(depot: &Depot) -> Result<&RecordingServiceImpl, RecordingError> {
    depot
        .obtain::<RecordingServiceImpl>()
        .map_err(|_| RecordingError::UnexpectedError("recording service is not configured".into()))
}

fn event_sender(depot: &Depot) -> Result<&Sender<AppEvent>, RecordingError> {
    depot
        .obtain::<Sender<AppEvent>>()
        .map_err(|_| RecordingError::UnexpectedError("event channel is not configured".into()))
}

/// Decodes a capability token and binds it to the caller's identity.
fn room_claims(
    depot: &Depot,
    principal: &Principal,
    token: &str,
) -> Result<RoomTokenClaims, RecordingError> {
    let jwt_utils = depot
        .obtain::<JwtUtils>()
        .map_err(|_| RecordingError::UnexpectedError("jwt utils are not configured".into()))?;

    let claims = jwt_utils.decode_room_token(token)?;
    if claims.user_id != principal.user_id {
        return Err(AuthError::PrincipalMismatch.into());
    }

    Ok(claims)
}

/// Starts the room's recording session. Requires a moderator capability token.
#[endpoint(tags("recording"), status_codes(200, 400, 401, 403, 404, 409, 500))]
async fn start_recording(
    _res: &mut Response,
    data: JsonBody<StartRecordingDto>,
    depot: &mut Depot,
) -> Result<RecordingResponse, RecordingError> {
    let data = data.into_inner();
    data.validate()
        .map_err(|_| RecordingError::Auth(AuthError::MissingToken))?;

    let principal = current_principal(depot)?;
    let claims = room_claims(depot, &principal, &data.capability_token)?;

    let recording = recording_service(depot)?
        .start_recording(data.room_id, &claims)
        .await?;

    publish(
        event_sender(depot)?,
        AppEvent::RecordingStarted(recording.clone()),
    );

    Ok(recording)
}

/// Stops a recording session. Only its starter or a moderator may stop it.
/// A capability token, when given, must belong to the session's room.
#[endpoint(tags("recording"), status_codes(200, 401, 403, 404, 500))]
async fn stop_recording(
    _res: &mut Response,
    data: JsonBody<StopRecordingDto>,
    depot: &mut Depot,
) -> Result<RecordingResponse, RecordingError> {
    let data = data.into_inner();
    data.validate()
        .map_err(|_| RecordingError::Auth(AuthError::MissingToken))?;

    let principal = current_principal(depot)?;
    let service = recording_service(depot)?;

    let recording = match data.capability_token.as_deref() {
        Some(token) => {
            let claims = room_claims(depot, &principal, token)?;
            service.stop_recording(data.recording_id, &claims).await?
        }
        None => {
            service
                .stop_recording_as(data.recording_id, &principal)
                .await?
        }
    };

    publish(
        event_sender(depot)?,
        AppEvent::RecordingStopped(recording.clone()),
    );

    Ok(recording)
}

#[endpoint(tags("recording"), status_codes(200, 401, 403, 404, 500))]
async fn get_recordings_by_room(
    _res: &mut Response,
    room_id: PathParam<i32>,
    depot: &mut Depot,
) -> Result<ListRecordingResponse, RecordingError> {
    let principal = current_principal(depot)?;

    let recordings = recording_service(depot)?
        .get_recordings_by_room(room_id.into_inner(), principal.user_id)
        .await?;

    Ok(ListRecordingResponse { recordings })
}
