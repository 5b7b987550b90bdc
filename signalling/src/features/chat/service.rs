use chrono::Utc;
use salvo::async_trait;
use tracing::warn;

use crate::{
    core::{
        audit::{AuditAction, AuditSink},
        dtos::common::pagination_dto::PaginationDto,
        entities::{
            models::{Message, NewMessage, Participant, ParticipantRole, Room},
            principal::{Capability, Principal},
        },
        types::{
            errors::chat_error::ChatError,
            responses::{
                message_response::MessageResponse, socket_response::MessageDeletedResponse,
            },
        },
        utils::{crypto_utils::MessageCipher, sanitize_utils::sanitize_message},
    },
    features::room::repository::{RoomRepository, RoomRepositoryImpl},
};

use super::{
    flood_guard::FloodGuard,
    repository::{ChatRepository, ChatRepositoryImpl},
};

/// Upper bound on sanitized message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Flood check, sanitize, encrypt, persist. The returned plaintext is
    /// meant for immediate fan-out only.
    async fn send_message(
        &self,
        room_id: i32,
        sender_id: i32,
        raw_content: &str,
    ) -> Result<MessageResponse, ChatError>;

    /// Oldest first within the requested page of the most recent messages.
    async fn history(
        &self,
        room_id: i32,
        requester_id: i32,
        pagination_dto: PaginationDto,
    ) -> Result<Vec<MessageResponse>, ChatError>;

    async fn edit_message(
        &self,
        message_id: i32,
        principal: &Principal,
        raw_content: &str,
    ) -> Result<MessageResponse, ChatError>;

    async fn delete_message(
        &self,
        message_id: i32,
        principal: &Principal,
    ) -> Result<MessageDeletedResponse, ChatError>;

    fn forget_room(&self, room_id: i32);
}

#[derive(Debug, Clone)]
pub struct ChatServiceImpl<C: ChatRepository = ChatRepositoryImpl, R: RoomRepository = RoomRepositoryImpl>
{
    chat_repository: C,
    room_repository: R,
    cipher: MessageCipher,
    flood_guard: FloodGuard,
    audit: AuditSink,
}

impl<C: ChatRepository, R: RoomRepository> ChatServiceImpl<C, R> {
    pub fn new(
        chat_repository: C,
        room_repository: R,
        cipher: MessageCipher,
        flood_guard: FloodGuard,
        audit: AuditSink,
    ) -> Self {
        Self {
            chat_repository,
            room_repository,
            cipher,
            flood_guard,
            audit,
        }
    }

    async fn get_active_room(&self, room_id: i32) -> Result<Room, ChatError> {
        let room = self.room_repository.get_room_by_id(room_id).await?;

        if !room.is_active {
            return Err(ChatError::RoomNotFound(room_id));
        }

        Ok(room)
    }

    async fn get_active_participant(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Participant, ChatError> {
        self.room_repository
            .get_participant(room_id, user_id)
            .await?
            .filter(Participant::is_active)
            .ok_or(ChatError::NotParticipant)
    }

    fn prepare_content(&self, raw_content: &str) -> Result<String, ChatError> {
        let content = sanitize_message(raw_content);

        if content.is_empty() {
            return Err(ChatError::Validation("message is empty".to_string()));
        }

        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::Validation(format!(
                "message exceeds {MAX_MESSAGE_CHARS} characters"
            )));
        }

        Ok(content)
    }

    fn encrypt(&self, content: &str) -> Result<String, ChatError> {
        self.cipher
            .encrypt(content)
            .map_err(|err| ChatError::UnexpectedError(format!("Failed to encrypt message: {err}")))
    }

    fn decrypt(&self, message: Message) -> Result<MessageResponse, ChatError> {
        let content = self.cipher.decrypt(&message.ciphertext).map_err(|err| {
            ChatError::UnexpectedError(format!("Failed to decrypt message {}: {err}", message.id))
        })?;

        Ok(MessageResponse {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            content,
            created_at: message.created_at,
            updated_at: message.updated_at,
            is_edited: message.is_edited,
        })
    }

    async fn is_moderator(&self, room: &Room, principal: &Principal) -> Result<bool, ChatError> {
        if room.creator_id == principal.user_id || principal.has(Capability::ModerateRooms) {
            return Ok(true);
        }

        let participant = self
            .room_repository
            .get_participant(room.id, principal.user_id)
            .await?;

        Ok(participant.is_some_and(|p| p.is_active() && p.role() == ParticipantRole::Moderator))
    }
}

#[async_trait]
impl<C: ChatRepository + Send + Sync, R: RoomRepository + Send + Sync> ChatService
    for ChatServiceImpl<C, R>
{
    async fn send_message(
        &self,
        room_id: i32,
        sender_id: i32,
        raw_content: &str,
    ) -> Result<MessageResponse, ChatError> {
        self.get_active_room(room_id).await?;
        let sender = self.get_active_participant(room_id, sender_id).await?;

        self.flood_guard.check_and_record(room_id, sender_id)?;

        let content = self.prepare_content(raw_content)?;
        let ciphertext = self.encrypt(&content)?;
        let now = Utc::now().naive_utc();

        let message = self
            .chat_repository
            .create_message(NewMessage {
                room_id,
                sender_id,
                sender_name: &sender.username,
                ciphertext: &ciphertext,
                created_at: now,
                updated_at: now,
                is_deleted: false,
                is_edited: false,
            })
            .await?;

        if let Err(err) = self.room_repository.touch_room(room_id, now).await {
            warn!("Failed to update activity of room {}: {:?}", room_id, err);
        }

        Ok(MessageResponse {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            content,
            created_at: message.created_at,
            updated_at: message.updated_at,
            is_edited: message.is_edited,
        })
    }

    async fn history(
        &self,
        room_id: i32,
        requester_id: i32,
        pagination_dto: PaginationDto,
    ) -> Result<Vec<MessageResponse>, ChatError> {
        self.get_active_room(room_id).await?;

        // Former participants keep read access.
        self.room_repository
            .get_participant(room_id, requester_id)
            .await?
            .ok_or(ChatError::NotParticipant)?;

        let mut messages = self
            .chat_repository
            .get_messages_by_room(room_id, pagination_dto.skip, pagination_dto.limit)
            .await?;
        messages.reverse();

        Ok(messages
            .into_iter()
            .filter_map(|message| match self.decrypt(message) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!("Skipping unreadable message in room {}: {}", room_id, err);
                    None
                }
            })
            .collect())
    }

    async fn edit_message(
        &self,
        message_id: i32,
        principal: &Principal,
        raw_content: &str,
    ) -> Result<MessageResponse, ChatError> {
        let mut message = self.chat_repository.get_message_by_id(message_id).await?;

        if message.is_deleted {
            return Err(ChatError::MessageNotFound(message_id));
        }

        if message.sender_id != principal.user_id {
            return Err(ChatError::Forbidden(
                "Only the sender can edit a message".to_string(),
            ));
        }

        self.get_active_room(message.room_id).await?;

        let content = self.prepare_content(raw_content)?;
        message.ciphertext = self.encrypt(&content)?;
        message.updated_at = Utc::now().naive_utc();
        message.is_edited = true;

        let message = self.chat_repository.update_message(message).await?;

        Ok(MessageResponse {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            content,
            created_at: message.created_at,
            updated_at: message.updated_at,
            is_edited: message.is_edited,
        })
    }

    async fn delete_message(
        &self,
        message_id: i32,
        principal: &Principal,
    ) -> Result<MessageDeletedResponse, ChatError> {
        let mut message = self.chat_repository.get_message_by_id(message_id).await?;

        if message.is_deleted {
            return Err(ChatError::MessageNotFound(message_id));
        }

        let room = self.get_active_room(message.room_id).await?;

        if message.sender_id != principal.user_id && !self.is_moderator(&room, principal).await? {
            return Err(ChatError::Forbidden(
                "Only the sender or a moderator can delete a message".to_string(),
            ));
        }

        message.is_deleted = true;
        message.updated_at = Utc::now().naive_utc();
        let message = self.chat_repository.update_message(message).await?;

        self.audit.record(
            AuditAction::MessageDeleted,
            room.id,
            principal.user_id,
            Some(format!("message {}", message.id)),
        );

        Ok(MessageDeletedResponse {
            room_id: message.room_id,
            message_id: message.id,
        })
    }

    fn forget_room(&self, room_id: i32) {
        self.flood_guard.forget_room(room_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::database::memory::MemoryStore;
    use crate::test_utils::{chat_service, principal};

    fn page(limit: i64) -> PaginationDto {
        PaginationDto { skip: 0, limit }
    }

    #[tokio::test(start_paused = true)]
    async fn flood_limited_message_is_never_stored() {
        let store = MemoryStore::new();
        let room = store.seed_room(1, false, 10);
        store.seed_participant(room.id, 7, "kai", ParticipantRole::Participant);
        let service = chat_service(store.clone(), 30, 60);

        for i in 1..=30 {
            service
                .send_message(room.id, 7, &format!("message {i}"))
                .await
                .unwrap();
            tokio::time::advance(Duration::from_millis(300)).await;
        }

        let rejected = service.send_message(room.id, 7, "message 31").await;
        assert!(matches!(rejected, Err(ChatError::RateLimited { .. })));

        let history = service.history(room.id, 7, page(100)).await.unwrap();
        assert_eq!(history.len(), 30);
        assert_eq!(history.first().unwrap().content, "message 1");
        assert_eq!(history.last().unwrap().content, "message 30");
        assert_eq!(store.message_count(room.id), 30);
    }

    #[tokio::test]
    async fn content_round_trips_but_is_stored_encrypted() {
        let store = MemoryStore::new();
        let room = store.seed_room(1, false, 10);
        store.seed_participant(room.id, 7, "kai", ParticipantRole::Participant);
        let service = chat_service(store.clone(), 30, 60);

        let sent = service.send_message(room.id, 7, "hello").await.unwrap();
        let history = service.history(room.id, 7, page(10)).await.unwrap();

        assert_eq!(history, vec![sent.clone()]);
        assert_eq!(sent.content, "hello");
        assert_eq!(sent.sender_name, "kai");

        let stored = store.message(sent.id).unwrap();
        assert!(!stored.ciphertext.contains("hello"));
    }

    #[tokio::test]
    async fn markup_is_stripped_before_storage() {
        let store = MemoryStore::new();
        let room = store.seed_room(1, false, 10);
        store.seed_participant(room.id, 7, "kai", ParticipantRole::Participant);
        let service = chat_service(store, 30, 60);

        let sent = service
            .send_message(room.id, 7, "<script>alert(1)</script>hi <b>there</b>")
            .await
            .unwrap();
        assert_eq!(sent.content, "alert(1)hi there");

        let empty = service.send_message(room.id, 7, "<img src=x>").await;
        assert!(matches!(empty, Err(ChatError::Validation(_))));
    }

    #[tokio::test]
    async fn only_participants_send_and_read() {
        let store = MemoryStore::new();
        let room = store.seed_room(1, false, 10);
        store.seed_participant(room.id, 7, "kai", ParticipantRole::Participant);
        let service = chat_service(store.clone(), 30, 60);

        assert_eq!(
            service.send_message(room.id, 8, "hi").await,
            Err(ChatError::NotParticipant)
        );
        assert_eq!(
            service.history(room.id, 8, page(10)).await,
            Err(ChatError::NotParticipant)
        );

        service.send_message(room.id, 7, "before leaving").await.unwrap();
        store.mark_left(room.id, 7);

        assert_eq!(
            service.send_message(room.id, 7, "after leaving").await,
            Err(ChatError::NotParticipant)
        );
        let history = service.history(room.id, 7, page(10)).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn edit_is_sender_only_and_delete_allows_moderators() {
        let store = MemoryStore::new();
        let room = store.seed_room(1, false, 10);
        store.seed_participant(room.id, 7, "kai", ParticipantRole::Participant);
        store.seed_participant(room.id, 8, "mod", ParticipantRole::Moderator);
        store.seed_participant(room.id, 9, "other", ParticipantRole::Participant);
        let service = chat_service(store, 30, 60);

        let sent = service.send_message(room.id, 7, "helo").await.unwrap();

        let by_other = service
            .edit_message(sent.id, &principal(9, "other", &[]), "hijacked")
            .await;
        assert!(matches!(by_other, Err(ChatError::Forbidden(_))));

        let edited = service
            .edit_message(sent.id, &principal(7, "kai", &[]), "hello")
            .await
            .unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.content, "hello");

        let delete_by_other = service
            .delete_message(sent.id, &principal(9, "other", &[]))
            .await;
        assert!(matches!(delete_by_other, Err(ChatError::Forbidden(_))));

        let deleted = service
            .delete_message(sent.id, &principal(8, "mod", &[]))
            .await
            .unwrap();
        assert_eq!(deleted.message_id, sent.id);

        assert!(service.history(room.id, 7, page(10)).await.unwrap().is_empty());
        assert_eq!(
            service
                .delete_message(sent.id, &principal(7, "kai", &[]))
                .await,
            Err(ChatError::MessageNotFound(sent.id))
        );
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let service = chat_service(MemoryStore::new(), 30, 60);

        assert_eq!(
            service.send_message(404, 7, "hi").await,
            Err(ChatError::RoomNotFound(404))
        );
    }
}
