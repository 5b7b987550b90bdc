use async_channel::{Receiver, Sender};
use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    RoomCreated,
    RoomJoined,
    RoomLeft,
    RoomDeleted,
    RecordingStarted,
    RecordingStopped,
    MessageDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RoomCreated => "room.created",
            AuditAction::RoomJoined => "room.joined",
            AuditAction::RoomLeft => "room.left",
            AuditAction::RoomDeleted => "room.deleted",
            AuditAction::RecordingStarted => "recording.started",
            AuditAction::RecordingStopped => "recording.stopped",
            AuditAction::MessageDeleted => "message.deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub room_id: i32,
    pub actor_id: i32,
    pub at: NaiveDateTime,
    pub detail: Option<String>,
}

/// Best-effort audit trail. Recording never blocks or fails the caller: when
/// the queue is full the oldest pending entry is dropped.
#[derive(Debug, Clone)]
pub struct AuditSink {
    sender: Sender<AuditEvent>,
}

impl AuditSink {
    pub fn new(capacity: usize) -> (Self, Receiver<AuditEvent>) {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn record(&self, action: AuditAction, room_id: i32, actor_id: i32, detail: Option<String>) {
        let event = AuditEvent {
            action,
            room_id,
            actor_id,
            at: Utc::now().naive_utc(),
            detail,
        };

        match self.sender.force_send(event) {
            Ok(None) => {}
            Ok(Some(dropped)) => {
                warn!(
                    "audit queue full, dropped {} for room {}",
                    dropped.action.as_str(),
                    dropped.room_id
                );
            }
            Err(_) => {
                warn!("audit worker is gone, entry discarded");
            }
        }
    }
}

pub async fn run_audit_worker(receiver: Receiver<AuditEvent>) {
    while let Ok(event) = receiver.recv().await {
        info!(
            target: "audit",
            action = event.action.as_str(),
            room_id = event.room_id,
            actor_id = event.actor_id,
            at = %event.at,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit event"
        );
    }
}
