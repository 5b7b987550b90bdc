use async_channel::Sender;
use tracing::warn;

use super::{
    enums::ws_event::WsEvent,
    responses::{
        message_response::MessageResponse,
        recording_response::RecordingResponse,
        socket_response::{MessageDeletedResponse, RoomDeletedResponse, UserPresenceResponse},
    },
};

/// Room-scoped events fanned out to every connection registered in the room.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    MessageReceived(MessageResponse),
    MessageUpdated(MessageResponse),
    MessageDeleted(MessageDeletedResponse),
    UserJoined(UserPresenceResponse),
    UserLeft(UserPresenceResponse),
    RecordingStarted(RecordingResponse),
    RecordingStopped(RecordingResponse),
    RoomDeleted(RoomDeletedResponse),
}

impl AppEvent {
    pub fn room_id(&self) -> i32 {
        match self {
            AppEvent::MessageReceived(msg) | AppEvent::MessageUpdated(msg) => msg.room_id,
            AppEvent::MessageDeleted(deleted) => deleted.room_id,
            AppEvent::UserJoined(user) | AppEvent::UserLeft(user) => user.room_id,
            AppEvent::RecordingStarted(recording) | AppEvent::RecordingStopped(recording) => {
                recording.room_id
            }
            AppEvent::RoomDeleted(room) => room.room_id,
        }
    }

    pub fn ws_event(&self) -> WsEvent {
        match self {
            AppEvent::MessageReceived(_) => WsEvent::MessageReceived,
            AppEvent::MessageUpdated(_) => WsEvent::MessageUpdated,
            AppEvent::MessageDeleted(_) => WsEvent::MessageDeleted,
            AppEvent::UserJoined(_) => WsEvent::UserJoined,
            AppEvent::UserLeft(_) => WsEvent::UserLeft,
            AppEvent::RecordingStarted(_) => WsEvent::RecordingStarted,
            AppEvent::RecordingStopped(_) => WsEvent::RecordingStopped,
            AppEvent::RoomDeleted(_) => WsEvent::RoomDeleted,
        }
    }
}

/// Hands the event to the fan-out worker. Events published after the worker
/// has stopped are dropped.
pub fn publish(sender: &Sender<AppEvent>, event: AppEvent) {
    if let Err(err) = sender.try_send(event) {
        let event = err.into_inner();
        warn!(
            "dropping {} for room {}: fan-out worker is gone",
            event.ws_event().to_str(),
            event.room_id()
        );
    }
}
