#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsEvent {
    JoinRoom,
    LeaveRoom,
    SendMessage,
    LoadHistory,
    StartRecording,
    StopRecording,

    RoomJoined,
    UserJoined,
    UserLeft,
    MessageReceived,
    MessageUpdated,
    MessageDeleted,
    HistoryLoaded,
    RecordingStarted,
    RecordingStopped,
    RoomDeleted,
    RoomError,
}

impl WsEvent {
    pub fn to_str(&self) -> &'static str {
        match self {
            WsEvent::JoinRoom => "joinRoom",
            WsEvent::LeaveRoom => "leaveRoom",
            WsEvent::SendMessage => "sendMessage",
            WsEvent::LoadHistory => "loadHistory",
            WsEvent::StartRecording => "startRecording",
            WsEvent::StopRecording => "stopRecording",

            WsEvent::RoomJoined => "roomJoined",
            WsEvent::UserJoined => "userJoined",
            WsEvent::UserLeft => "userLeft",
            WsEvent::MessageReceived => "messageReceived",
            WsEvent::MessageUpdated => "messageUpdated",
            WsEvent::MessageDeleted => "messageDeleted",
            WsEvent::HistoryLoaded => "historyLoaded",
            WsEvent::RecordingStarted => "recordingStarted",
            WsEvent::RecordingStopped => "recordingStopped",
            WsEvent::RoomDeleted => "roomDeleted",
            WsEvent::RoomError => "roomError",
        }
    }
}
