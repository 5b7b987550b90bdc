use chrono::Utc;
use salvo::async_trait;
use tracing::info;

use crate::{
    core::{
        audit::{AuditAction, AuditSink},
        entities::{
            models::{NewRecording, ParticipantRole, RecordingStatus, Room},
            principal::{Capability, Principal},
        },
        types::{
            errors::{
                auth_error::AuthError, recording_error::RecordingError, room_error::RoomError,
            },
            responses::recording_response::RecordingResponse,
        },
        utils::jwt_utils::RoomTokenClaims,
    },
    features::room::repository::{RoomRepository, RoomRepositoryImpl},
};

use super::repository::{RecordingRepository, RecordingRepositoryImpl};

/// Every privileged call is authorized by the capability token minted on
/// join: its room scope, expiry and role.
#[async_trait]
pub trait RecordingService: Send + Sync {
    async fn start_recording(
        &self,
        room_id: i32,
        claims: &RoomTokenClaims,
    ) -> Result<RecordingResponse, RecordingError>;

    async fn stop_recording(
        &self,
        recording_id: i32,
        claims: &RoomTokenClaims,
    ) -> Result<RecordingResponse, RecordingError>;

    /// Stop without a capability token: the caller must have started the
    /// session, created its room, hold room moderation rights or be an active
    /// Moderator of the room.
    async fn stop_recording_as(
        &self,
        recording_id: i32,
        principal: &Principal,
    ) -> Result<RecordingResponse, RecordingError>;

    /// Open to current and former participants.
    async fn get_recordings_by_room(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Vec<RecordingResponse>, RecordingError>;

    /// Stops the room's active recording if `user_id` started it.
    async fn force_stop_for_user(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Option<RecordingResponse>, RecordingError>;

    async fn is_recording(&self, room_id: i32) -> Result<bool, RecordingError>;
}

#[derive(Debug, Clone)]
pub struct RecordingServiceImpl<
    V: RecordingRepository = RecordingRepositoryImpl,
    R: RoomRepository = RoomRepositoryImpl,
> {
    recording_repository: V,
    room_repository: R,
    audit: AuditSink,
}

impl<V: RecordingRepository, R: RoomRepository> RecordingServiceImpl<V, R> {
    pub fn new(recording_repository: V, room_repository: R, audit: AuditSink) -> Self {
        Self {
            recording_repository,
            room_repository,
            audit,
        }
    }

    async fn get_active_room(&self, room_id: i32) -> Result<Room, RecordingError> {
        let room = self.room_repository.get_room_by_id(room_id).await?;

        if !room.is_active {
            return Err(RoomError::RoomNotFound(room_id).into());
        }

        Ok(room)
    }

    fn ensure_fresh(claims: &RoomTokenClaims) -> Result<(), RecordingError> {
        if claims.is_expired() {
            return Err(AuthError::TokenExpired.into());
        }
        Ok(())
    }

    async fn ensure_active_participant(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<(), RecordingError> {
        self.room_repository
            .get_participant(room_id, user_id)
            .await?
            .filter(|participant| participant.is_active())
            .map(|_| ())
            .ok_or(RecordingError::NotParticipant)
    }

    async fn moderates(&self, room_id: i32, principal: &Principal) -> Result<bool, RecordingError> {
        if principal.has(Capability::ModerateRooms) {
            return Ok(true);
        }

        let room = self.room_repository.get_room_by_id(room_id).await?;
        if room.creator_id == principal.user_id {
            return Ok(true);
        }

        Ok(self
            .room_repository
            .get_participant(room_id, principal.user_id)
            .await?
            .is_some_and(|participant| {
                participant.is_active() && participant.role() == ParticipantRole::Moderator
            }))
    }

    async fn finish(&self, recording_id: i32, actor: i32) -> Result<RecordingResponse, RecordingError> {
        let stopped = self
            .recording_repository
            .stop_recording(recording_id, Utc::now().naive_utc())
            .await?
            .ok_or(RecordingError::SessionNotFound(recording_id))?;

        info!(
            "Recording {} stopped in room {} by user {}",
            stopped.id, stopped.room_id, actor
        );
        self.audit.record(
            AuditAction::RecordingStopped,
            stopped.room_id,
            actor,
            Some(format!("recording {}", stopped.id)),
        );

        Ok(stopped.into())
    }
}

#[async_trait]
impl<V: RecordingRepository + Send + Sync, R: RoomRepository + Send + Sync> RecordingService
    for RecordingServiceImpl<V, R>
{
    async fn start_recording(
        &self,
        room_id: i32,
        claims: &RoomTokenClaims,
    ) -> Result<RecordingResponse, RecordingError> {
        Self::ensure_fresh(claims)?;
        claims.ensure_room(room_id)?;

        let room = self.get_active_room(room_id).await?;

        if !room.allow_recording {
            return Err(RecordingError::RecordingNotAllowed);
        }

        if claims.role != ParticipantRole::Moderator {
            return Err(RecordingError::NotModerator);
        }

        self.ensure_active_participant(room_id, claims.user_id)
            .await?;

        let recording = self
            .recording_repository
            .create_recording(NewRecording {
                room_id,
                started_by: claims.user_id,
                started_at: Utc::now().naive_utc(),
                status: RecordingStatus::Recording.into(),
            })
            .await?;

        info!(
            "Recording {} started in room {} by user {}",
            recording.id, room_id, claims.user_id
        );
        self.audit.record(
            AuditAction::RecordingStarted,
            room_id,
            claims.user_id,
            Some(format!("recording {}", recording.id)),
        );

        Ok(recording.into())
    }

    async fn stop_recording(
        &self,
        recording_id: i32,
        claims: &RoomTokenClaims,
    ) -> Result<RecordingResponse, RecordingError> {
        Self::ensure_fresh(claims)?;

        let recording = self
            .recording_repository
            .get_recording_by_id(recording_id)
            .await?
            .ok_or(RecordingError::SessionNotFound(recording_id))?;

        claims.ensure_room(recording.room_id)?;

        if claims.user_id != recording.started_by && claims.role != ParticipantRole::Moderator {
            return Err(RecordingError::NotStarter);
        }

        self.finish(recording_id, claims.user_id).await
    }

    async fn stop_recording_as(
        &self,
        recording_id: i32,
        principal: &Principal,
    ) -> Result<RecordingResponse, RecordingError> {
        let recording = self
            .recording_repository
            .get_recording_by_id(recording_id)
            .await?
            .ok_or(RecordingError::SessionNotFound(recording_id))?;

        if principal.user_id != recording.started_by
            && !self.moderates(recording.room_id, principal).await?
        {
            return Err(RecordingError::NotStarter);
        }

        self.finish(recording_id, principal.user_id).await
    }

    async fn get_recordings_by_room(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Vec<RecordingResponse>, RecordingError> {
        self.get_active_room(room_id).await?;

        self.room_repository
            .get_participant(room_id, user_id)
            .await?
            .ok_or(RecordingError::NotParticipant)?;

        let recordings = self
            .recording_repository
            .get_recordings_by_room(room_id)
            .await?;

        Ok(recordings.into_iter().map(RecordingResponse::from).collect())
    }

    async fn force_stop_for_user(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Option<RecordingResponse>, RecordingError> {
        let Some(active) = self
            .recording_repository
            .find_active_recording(room_id)
            .await?
        else {
            return Ok(None);
        };

        if active.started_by != user_id {
            return Ok(None);
        }

        let stopped = self
            .recording_repository
            .stop_recording(active.id, Utc::now().naive_utc())
            .await?;

        if let Some(stopped) = &stopped {
            info!(
                "Recording {} in room {} force-stopped after user {} left",
                stopped.id, room_id, user_id
            );
            self.audit.record(
                AuditAction::RecordingStopped,
                room_id,
                user_id,
                Some(format!("recording {} force-stopped", stopped.id)),
            );
        }

        Ok(stopped.map(RecordingResponse::from))
    }

    async fn is_recording(&self, room_id: i32) -> Result<bool, RecordingError> {
        Ok(self
            .recording_repository
            .find_active_recording(room_id)
            .await?
            .is_some())
    }
}
