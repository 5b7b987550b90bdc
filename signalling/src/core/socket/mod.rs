pub mod gateway;

use std::str::FromStr;

use anyhow::anyhow;
use async_channel::Receiver;
use salvo::prelude::*;
use socketioxide::{
    SocketIo,
    adapter::Adapter,
    extract::{Data, Extension, SocketRef, State},
    handler::ConnectHandler,
    socket::Sid,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::core::{
    dtos::socket::socket_dto::{
        JoinRoomDto, LoadHistoryDto, RoomDto, SendMessageDto, StopRecordingDto,
    },
    types::{
        app_channel::AppEvent, enums::ws_event::WsEvent, errors::ErrorKind,
        responses::socket_response::RoomJoinedResponse,
    },
};

use self::gateway::{ConnectedUser, GatewayError, RoomGateway, room_channel};

#[handler]
async fn version() -> &'static str {
    "[v1] Classroom signalling service"
}

/// Mounts the real-time transport at `/socket.io` and starts the fan-out
/// worker for `events`.
pub fn get_socket_router(gateway: RoomGateway, events: Receiver<AppEvent>) -> (Router, SocketIo) {
    let (layer, io) = SocketIo::builder().with_state(gateway).build_layer();

    let layer = ServiceBuilder::new()
        .layer(CorsLayer::permissive())
        .layer(layer);

    io.ns("/", on_connect.with(authenticate_middleware));

    let layer = layer.compat();
    let router = Router::new().hoop(layer).path("/socket.io").goal(version);

    tokio::spawn(handle_app_events(io.clone(), events));

    (router, io)
}

/// Single consumer: events reach each room in the order they were published.
pub async fn handle_app_events(io: SocketIo, receiver: Receiver<AppEvent>) {
    while let Ok(event) = receiver.recv().await {
        let room = room_channel(event.room_id());
        let name = event.ws_event().to_str();
        let operators = io.to(room);

        let delivered = match &event {
            AppEvent::MessageReceived(message) | AppEvent::MessageUpdated(message) => {
                operators.emit(name, message).await
            }
            AppEvent::MessageDeleted(deleted) => operators.emit(name, deleted).await,
            AppEvent::UserJoined(user) | AppEvent::UserLeft(user) => {
                operators.emit(name, user).await
            }
            AppEvent::RecordingStarted(recording) | AppEvent::RecordingStopped(recording) => {
                operators.emit(name, recording).await
            }
            AppEvent::RoomDeleted(deleted) => operators.emit(name, deleted).await,
        };

        if let Err(err) = delivered {
            warn!("failed to deliver {} to room {}: {:?}", name, event.room_id(), err);
        }
    }
}

/// Makes the given connections stop receiving a room's broadcasts.
pub fn detach_sockets(io: &SocketIo, sids: &[String], room_id: i32) {
    for sid in sids {
        let Ok(sid) = Sid::from_str(sid) else {
            continue;
        };

        if let Some(socket) = io.get_socket(sid) {
            socket.leave(room_channel(room_id));
        }
    }
}

fn connection_token<A: Adapter>(s: &SocketRef<A>) -> Option<String> {
    let parts = s.req_parts();

    let header = parts
        .headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start_matches("Bearer ").trim().to_string());

    header.filter(|token| !token.is_empty()).or_else(|| {
        parts.uri.query().and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "token")
                .map(|(_, value)| value.to_string())
        })
    })
}

async fn authenticate_middleware<A: Adapter>(
    s: SocketRef<A>,
    State(gateway): State<RoomGateway>,
) -> Result<(), anyhow::Error> {
    let token = connection_token(&s).ok_or(anyhow!("Missing capability token"))?;

    match gateway.connect(&s.id.to_string(), &token).await {
        Ok((user, joined)) => {
            s.extensions.insert(user);
            s.extensions.insert(joined);
            Ok(())
        }
        Err(err) => {
            warn!("connection refused: {:?}", err);
            Err(anyhow!(err.to_string()))
        }
    }
}

async fn on_connect<A: Adapter>(
    socket: SocketRef<A>,
    Extension(user): Extension<ConnectedUser>,
    Extension(joined): Extension<RoomJoinedResponse>,
) {
    info!("user {} connected to room {}", user.user_id, joined.room_id);

    socket.join(room_channel(joined.room_id));
    socket.emit(WsEvent::RoomJoined.to_str(), &joined).ok();

    socket.on(WsEvent::JoinRoom.to_str(), handle_join_room);
    socket.on(WsEvent::LeaveRoom.to_str(), handle_leave_room);
    socket.on(WsEvent::SendMessage.to_str(), handle_send_message);
    socket.on(WsEvent::LoadHistory.to_str(), handle_load_history);
    socket.on(WsEvent::StartRecording.to_str(), handle_start_recording);
    socket.on(WsEvent::StopRecording.to_str(), handle_stop_recording);

    socket.on_disconnect(on_disconnect);
}

fn emit_error<A: Adapter>(socket: &SocketRef<A>, event: WsEvent, err: &GatewayError) {
    if err.kind() == ErrorKind::Internal {
        error!("{} failed on {}: {:?}", event.to_str(), socket.id, err);
    }

    socket
        .emit(WsEvent::RoomError.to_str(), &err.to_response(event))
        .ok();
}

async fn handle_join_room<A: Adapter>(
    socket: SocketRef<A>,
    Data(data): Data<JoinRoomDto>,
    State(gateway): State<RoomGateway>,
    Extension(user): Extension<ConnectedUser>,
) {
    match gateway
        .join_room(&socket.id.to_string(), &user, &data.capability_token)
        .await
    {
        Ok(joined) => {
            socket.join(room_channel(joined.room_id));
            socket.emit(WsEvent::RoomJoined.to_str(), &joined).ok();
        }
        Err(err) => emit_error(&socket, WsEvent::JoinRoom, &err),
    }
}

async fn handle_leave_room<A: Adapter>(
    socket: SocketRef<A>,
    Data(data): Data<RoomDto>,
    State(gateway): State<RoomGateway>,
) {
    match gateway.leave_room(&socket.id.to_string(), data.room_id).await {
        Ok(()) => {
            socket.leave(room_channel(data.room_id));
        }
        Err(err) => emit_error(&socket, WsEvent::LeaveRoom, &err),
    }
}

async fn handle_send_message<A: Adapter>(
    socket: SocketRef<A>,
    Data(data): Data<SendMessageDto>,
    State(gateway): State<RoomGateway>,
) {
    // Delivery to the sender happens through the room broadcast.
    if let Err(err) = gateway.send_message(&socket.id.to_string(), data).await {
        emit_error(&socket, WsEvent::SendMessage, &err);
    }
}

async fn handle_load_history<A: Adapter>(
    socket: SocketRef<A>,
    Data(data): Data<LoadHistoryDto>,
    State(gateway): State<RoomGateway>,
) {
    match gateway.load_history(&socket.id.to_string(), data).await {
        Ok(history) => {
            socket.emit(WsEvent::HistoryLoaded.to_str(), &history).ok();
        }
        Err(err) => emit_error(&socket, WsEvent::LoadHistory, &err),
    }
}

async fn handle_start_recording<A: Adapter>(
    socket: SocketRef<A>,
    Data(data): Data<RoomDto>,
    State(gateway): State<RoomGateway>,
) {
    if let Err(err) = gateway
        .start_recording(&socket.id.to_string(), data.room_id)
        .await
    {
        emit_error(&socket, WsEvent::StartRecording, &err);
    }
}

async fn handle_stop_recording<A: Adapter>(
    socket: SocketRef<A>,
    Data(data): Data<StopRecordingDto>,
    State(gateway): State<RoomGateway>,
) {
    if let Err(err) = gateway.stop_recording(&socket.id.to_string(), data).await {
        emit_error(&socket, WsEvent::StopRecording, &err);
    }
}

async fn on_disconnect<A: Adapter>(socket: SocketRef<A>, State(gateway): State<RoomGateway>) {
    info!("connection {} closed", socket.id);
    gateway.disconnect(&socket.id.to_string()).await;
}
