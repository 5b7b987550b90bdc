//! In-process stand-in for Postgres used by service and gateway tests.
//!
//! Every trait method takes the single table lock once, so each call is as
//! atomic as the transaction or constraint backing the diesel implementation.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{NaiveDateTime, Utc};
use parking_lot::Mutex;
use salvo::async_trait;

use crate::{
    core::{
        entities::models::{
            Message, NewMessage, NewParticipant, NewRecording, NewRoom, Participant,
            ParticipantRole, PrivacyLevel, Recording, RecordingStatus, Room,
        },
        types::errors::{
            chat_error::ChatError, recording_error::RecordingError, room_error::RoomError,
        },
    },
    features::{
        chat::repository::ChatRepository, recording::repository::RecordingRepository,
        room::repository::RoomRepository,
    },
};

#[derive(Debug, Default)]
struct Tables {
    next_id: i32,
    rooms: BTreeMap<i32, Room>,
    participants: Vec<Participant>,
    messages: BTreeMap<i32, Message>,
    recordings: BTreeMap<i32, Recording>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// One-shot latencies injected before the table lock is taken.
#[derive(Debug, Default)]
struct Delays {
    touch_room: Option<Duration>,
    mark_participant_left: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    delays: Arc<Mutex<Delays>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `touch_room` call sleeps for `delay` first.
    pub fn delay_next_touch(&self, delay: Duration) {
        self.delays.lock().touch_room = Some(delay);
    }

    /// The next `mark_participant_left` call sleeps for `delay` first.
    pub fn delay_next_leave(&self, delay: Duration) {
        self.delays.lock().mark_participant_left = Some(delay);
    }

    pub fn seed_room(&self, creator_id: i32, allow_recording: bool, max_participants: i32) -> Room {
        let mut tables = self.tables.lock();
        let now = Utc::now().naive_utc();
        let id = tables.next_id();

        let room = Room {
            id,
            name: format!("room-{id}"),
            description: None,
            password_hash: "unused".to_string(),
            creator_id,
            created_at: now,
            last_activity_at: now,
            privacy_level: PrivacyLevel::Public.into(),
            max_participants,
            allow_recording,
            is_encrypted: true,
            is_active: true,
        };
        tables.rooms.insert(id, room.clone());
        room
    }

    pub fn seed_participant(
        &self,
        room_id: i32,
        user_id: i32,
        username: &str,
        role: ParticipantRole,
    ) -> Participant {
        let mut tables = self.tables.lock();
        let id = tables.next_id();

        let participant = Participant {
            id,
            room_id,
            user_id,
            username: username.to_string(),
            role: role.into(),
            joined_at: Utc::now().naive_utc(),
            left_at: None,
        };
        tables.participants.push(participant.clone());
        participant
    }

    pub fn seed_message(&self, room_id: i32, sender_id: i32, sender_name: &str) -> Message {
        let mut tables = self.tables.lock();
        let now = Utc::now().naive_utc();
        let id = tables.next_id();

        let message = Message {
            id,
            room_id,
            sender_id,
            sender_name: sender_name.to_string(),
            ciphertext: "seeded".to_string(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            is_edited: false,
        };
        tables.messages.insert(id, message.clone());
        message
    }

    pub fn seed_recording(&self, room_id: i32, started_by: i32) -> Recording {
        let mut tables = self.tables.lock();
        let id = tables.next_id();

        let recording = Recording {
            id,
            room_id,
            started_by,
            started_at: Utc::now().naive_utc(),
            ended_at: None,
            status: RecordingStatus::Recording.into(),
        };
        tables.recordings.insert(id, recording.clone());
        recording
    }

    pub fn mark_left(&self, room_id: i32, user_id: i32) {
        let mut tables = self.tables.lock();
        let now = Utc::now().naive_utc();

        tables
            .participants
            .iter_mut()
            .filter(|p| p.room_id == room_id && p.user_id == user_id)
            .for_each(|p| p.left_at = Some(now));
    }

    pub fn room(&self, room_id: i32) -> Option<Room> {
        self.tables.lock().rooms.get(&room_id).cloned()
    }

    pub fn participant(&self, room_id: i32, user_id: i32) -> Option<Participant> {
        self.tables
            .lock()
            .participants
            .iter()
            .find(|p| p.room_id == room_id && p.user_id == user_id)
            .cloned()
    }

    pub fn active_participant_count(&self, room_id: i32) -> usize {
        self.tables
            .lock()
            .participants
            .iter()
            .filter(|p| p.room_id == room_id && p.is_active())
            .count()
    }

    pub fn message(&self, message_id: i32) -> Option<Message> {
        self.tables.lock().messages.get(&message_id).cloned()
    }

    /// Messages not soft-deleted.
    pub fn message_count(&self, room_id: i32) -> usize {
        self.tables
            .lock()
            .messages
            .values()
            .filter(|m| m.room_id == room_id && !m.is_deleted)
            .count()
    }

    pub fn active_recording_count(&self, room_id: i32) -> usize {
        self.tables
            .lock()
            .recordings
            .values()
            .filter(|r| r.room_id == room_id && r.status() == RecordingStatus::Recording)
            .count()
    }

    /// Participants, messages and recordings still pointing at the room.
    pub fn rows_referencing_room(&self, room_id: i32) -> usize {
        let tables = self.tables.lock();

        tables
            .participants
            .iter()
            .filter(|p| p.room_id == room_id)
            .count()
            + tables
                .messages
                .values()
                .filter(|m| m.room_id == room_id)
                .count()
            + tables
                .recordings
                .values()
                .filter(|r| r.room_id == room_id)
                .count()
    }
}

#[async_trait]
impl RoomRepository for MemoryStore {
    async fn create_room_within_quota(
        &self,
        room: NewRoom<'_>,
        max_active_rooms: i64,
    ) -> Result<Option<Room>, RoomError> {
        let mut tables = self.tables.lock();

        let active_rooms = tables
            .rooms
            .values()
            .filter(|r| r.creator_id == room.creator_id && r.is_active)
            .count();

        if i64::try_from(active_rooms).unwrap_or(i64::MAX) >= max_active_rooms {
            return Ok(None);
        }

        let id = tables.next_id();
        let created = Room {
            id,
            name: room.name.to_string(),
            description: room.description.map(str::to_string),
            password_hash: room.password_hash.to_string(),
            creator_id: room.creator_id,
            created_at: room.created_at,
            last_activity_at: room.last_activity_at,
            privacy_level: room.privacy_level,
            max_participants: room.max_participants,
            allow_recording: room.allow_recording,
            is_encrypted: room.is_encrypted,
            is_active: room.is_active,
        };
        tables.rooms.insert(id, created.clone());

        Ok(Some(created))
    }

    async fn get_room_by_id(&self, room_id: i32) -> Result<Room, RoomError> {
        self.room(room_id).ok_or(RoomError::RoomNotFound(room_id))
    }

    async fn find_active_rooms(
        &self,
        user_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Room>, RoomError> {
        let tables = self.tables.lock();

        let mut rooms = tables
            .rooms
            .values()
            .filter(|room| room.is_active)
            .filter(|room| {
                room.privacy() != PrivacyLevel::InviteOnly
                    || room.creator_id == user_id
                    || tables
                        .participants
                        .iter()
                        .any(|p| p.room_id == room.id && p.user_id == user_id && p.is_active())
            })
            .cloned()
            .collect::<Vec<_>>();

        rooms.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));

        Ok(rooms
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn touch_room(&self, room_id: i32, at: NaiveDateTime) -> Result<(), RoomError> {
        let delay = self.delays.lock().touch_room.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(room) = self.tables.lock().rooms.get_mut(&room_id) {
            room.last_activity_at = at;
        }
        Ok(())
    }

    async fn delete_room_cascade(&self, room_id: i32) -> Result<(), RoomError> {
        let mut tables = self.tables.lock();

        if tables.rooms.remove(&room_id).is_none() {
            return Err(RoomError::RoomNotFound(room_id));
        }

        tables.participants.retain(|p| p.room_id != room_id);
        tables.messages.retain(|_, m| m.room_id != room_id);
        tables.recordings.retain(|_, r| r.room_id != room_id);

        Ok(())
    }

    async fn get_active_participants(&self, room_id: i32) -> Result<Vec<Participant>, RoomError> {
        Ok(self
            .tables
            .lock()
            .participants
            .iter()
            .filter(|p| p.room_id == room_id && p.is_active())
            .cloned()
            .collect())
    }

    async fn get_participant(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Option<Participant>, RoomError> {
        Ok(self.participant(room_id, user_id))
    }

    async fn upsert_participant(
        &self,
        participant: NewParticipant<'_>,
    ) -> Result<Participant, RoomError> {
        let mut tables = self.tables.lock();

        if !tables.rooms.contains_key(&participant.room_id) {
            return Err(RoomError::RoomNotFound(participant.room_id));
        }

        if let Some(existing) = tables
            .participants
            .iter_mut()
            .find(|p| p.room_id == participant.room_id && p.user_id == participant.user_id)
        {
            existing.username = participant.username.to_string();
            existing.role = participant.role;
            existing.joined_at = participant.joined_at;
            existing.left_at = None;
            return Ok(existing.clone());
        }

        let id = tables.next_id();
        let created = Participant {
            id,
            room_id: participant.room_id,
            user_id: participant.user_id,
            username: participant.username.to_string(),
            role: participant.role,
            joined_at: participant.joined_at,
            left_at: participant.left_at,
        };
        tables.participants.push(created.clone());

        Ok(created)
    }

    async fn mark_participant_left(
        &self,
        room_id: i32,
        user_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, RoomError> {
        let delay = self.delays.lock().mark_participant_left.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut tables = self.tables.lock();

        Ok(tables
            .participants
            .iter_mut()
            .find(|p| p.room_id == room_id && p.user_id == user_id && p.is_active())
            .map(|p| p.left_at = Some(at))
            .is_some())
    }

    async fn mark_all_participants_left(&self, at: NaiveDateTime) -> Result<usize, RoomError> {
        let mut tables = self.tables.lock();
        let mut closed = 0;

        for participant in tables.participants.iter_mut().filter(|p| p.is_active()) {
            participant.left_at = Some(at);
            closed += 1;
        }

        Ok(closed)
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn get_messages_by_room(
        &self,
        room_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError> {
        Ok(self
            .tables
            .lock()
            .messages
            .values()
            .rev()
            .filter(|m| m.room_id == room_id && !m.is_deleted)
            .skip(usize::try_from(skip).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn get_message_by_id(&self, message_id: i32) -> Result<Message, ChatError> {
        self.message(message_id)
            .ok_or(ChatError::MessageNotFound(message_id))
    }

    async fn create_message(&self, message: NewMessage<'_>) -> Result<Message, ChatError> {
        let mut tables = self.tables.lock();

        if !tables.rooms.contains_key(&message.room_id) {
            return Err(ChatError::RoomNotFound(message.room_id));
        }

        let id = tables.next_id();
        let created = Message {
            id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.to_string(),
            ciphertext: message.ciphertext.to_string(),
            created_at: message.created_at,
            updated_at: message.updated_at,
            is_deleted: message.is_deleted,
            is_edited: message.is_edited,
        };
        tables.messages.insert(id, created.clone());

        Ok(created)
    }

    async fn update_message(&self, message: Message) -> Result<Message, ChatError> {
        let mut tables = self.tables.lock();

        let stored = tables
            .messages
            .get_mut(&message.id)
            .ok_or(ChatError::MessageNotFound(message.id))?;

        stored.ciphertext = message.ciphertext;
        stored.updated_at = message.updated_at;
        stored.is_deleted = message.is_deleted;
        stored.is_edited = message.is_edited;

        Ok(stored.clone())
    }
}

#[async_trait]
impl RecordingRepository for MemoryStore {
    async fn create_recording(&self, recording: NewRecording) -> Result<Recording, RecordingError> {
        let mut tables = self.tables.lock();

        if !tables.rooms.contains_key(&recording.room_id) {
            return Err(RecordingError::RoomNotFound(recording.room_id));
        }

        let already_recording = tables.recordings.values().any(|r| {
            r.room_id == recording.room_id && r.status() == RecordingStatus::Recording
        });
        if already_recording {
            return Err(RecordingError::AlreadyRecording);
        }

        let id = tables.next_id();
        let created = Recording {
            id,
            room_id: recording.room_id,
            started_by: recording.started_by,
            started_at: recording.started_at,
            ended_at: None,
            status: recording.status,
        };
        tables.recordings.insert(id, created.clone());

        Ok(created)
    }

    async fn get_recording_by_id(
        &self,
        recording_id: i32,
    ) -> Result<Option<Recording>, RecordingError> {
        Ok(self.tables.lock().recordings.get(&recording_id).cloned())
    }

    async fn find_active_recording(
        &self,
        room_id: i32,
    ) -> Result<Option<Recording>, RecordingError> {
        Ok(self
            .tables
            .lock()
            .recordings
            .values()
            .find(|r| r.room_id == room_id && r.status() == RecordingStatus::Recording)
            .cloned())
    }

    async fn stop_recording(
        &self,
        recording_id: i32,
        ended_at: NaiveDateTime,
    ) -> Result<Option<Recording>, RecordingError> {
        let mut tables = self.tables.lock();

        Ok(tables
            .recordings
            .get_mut(&recording_id)
            .filter(|r| r.status() == RecordingStatus::Recording)
            .map(|r| {
                r.status = RecordingStatus::Stopped.into();
                r.ended_at = Some(ended_at);
                r.clone()
            }))
    }

    async fn get_recordings_by_room(&self, room_id: i32) -> Result<Vec<Recording>, RecordingError> {
        Ok(self
            .tables
            .lock()
            .recordings
            .values()
            .rev()
            .filter(|r| r.room_id == room_id)
            .cloned()
            .collect())
    }
}
