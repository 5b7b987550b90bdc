use chrono::Utc;
use salvo::async_trait;
use tracing::{info, warn};

use crate::core::{
    audit::{AuditAction, AuditSink},
    dtos::{common::pagination_dto::PaginationDto, room::create_room_dto::CreateRoomDto},
    entities::{
        models::{NewParticipant, NewRoom, Participant, ParticipantRole, PrivacyLevel, Room},
        principal::{Capability, Principal},
    },
    env::app_env::RoomPolicy,
    types::{
        errors::room_error::RoomError,
        responses::room_response::{JoinRoomResponse, RoomDetailsResponse, RoomSummary},
    },
    utils::{
        bcrypt_utils::PasswordHasher,
        jwt_utils::{JwtUtils, RoomTokenClaims},
    },
};
use crate::features::presence::tracker::PresenceTracker;

use super::{
    repository::{RoomRepository, RoomRepositoryImpl},
    seats::{Admission, SeatLedger},
};

#[async_trait]
pub trait RoomService: Send + Sync {
    async fn create_room(
        &self,
        data: CreateRoomDto,
        principal: &Principal,
    ) -> Result<RoomSummary, RoomError>;

    async fn list_rooms(
        &self,
        principal: &Principal,
        pagination_dto: PaginationDto,
    ) -> Result<Vec<RoomSummary>, RoomError>;

    /// `is_recording` is left false; `RoomGateway::room_details` fills it in.
    async fn get_room(
        &self,
        room_id: i32,
        principal: &Principal,
    ) -> Result<RoomDetailsResponse, RoomError>;

    async fn join_room(
        &self,
        room_id: i32,
        password: &str,
        principal: &Principal,
    ) -> Result<JoinRoomResponse, RoomError>;

    /// Re-admits the holder of a still-valid capability token, subject to capacity.
    async fn admit_with_token(&self, claims: &RoomTokenClaims) -> Result<Room, RoomError>;

    async fn leave_room(&self, room_id: i32, user_id: i32) -> Result<Participant, RoomError>;

    async fn delete_room(&self, room_id: i32, principal: &Principal) -> Result<(), RoomError>;

    /// Closes the participant rows a previous process left open. Called once
    /// at startup, before any seat is taken.
    async fn release_stale_seats(&self) -> Result<usize, RoomError>;
}

#[derive(Debug, Clone)]
pub struct RoomServiceImpl<R: RoomRepository = RoomRepositoryImpl> {
    room_repository: R,
    jwt_utils: JwtUtils,
    hasher: PasswordHasher,
    policy: RoomPolicy,
    seats: SeatLedger,
    presence: PresenceTracker,
    audit: AuditSink,
}

impl<R: RoomRepository> RoomServiceImpl<R> {
    pub fn new(
        room_repository: R,
        jwt_utils: JwtUtils,
        hasher: PasswordHasher,
        policy: RoomPolicy,
        seats: SeatLedger,
        presence: PresenceTracker,
        audit: AuditSink,
    ) -> Self {
        Self {
            room_repository,
            jwt_utils,
            hasher,
            policy,
            seats,
            presence,
            audit,
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, RoomError> {
        let hasher = self.hasher;

        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|err| RoomError::UnexpectedError(format!("Hashing task failed: {err}")))?
            .map_err(|err| RoomError::UnexpectedError(format!("Failed to hash password: {err}")))
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, RoomError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|err| RoomError::UnexpectedError(format!("Verification task failed: {err}")))
    }

    /// Takes a seat for the user and persists the participant row.
    async fn admit(
        &self,
        room: &Room,
        user_id: i32,
        username: &str,
        role: ParticipantRole,
    ) -> Result<Participant, RoomError> {
        let persisted = self
            .room_repository
            .get_active_participants(room.id)
            .await?
            .into_iter()
            .map(|participant| participant.user_id)
            .collect::<Vec<_>>();

        let admission = self
            .seats
            .try_admit(room.id, user_id, room.max_participants, &persisted)?;

        let now = Utc::now().naive_utc();
        let new_participant = NewParticipant {
            room_id: room.id,
            user_id,
            username,
            role: role.into(),
            joined_at: now,
            left_at: None,
        };

        match self.room_repository.upsert_participant(new_participant).await {
            Ok(participant) => Ok(participant),
            Err(err) => {
                if admission == Admission::Seated {
                    self.seats.release(room.id, user_id);
                }
                Err(err)
            }
        }
    }

    async fn touch(&self, room_id: i32) {
        let now = Utc::now().naive_utc();
        if let Err(err) = self.room_repository.touch_room(room_id, now).await {
            warn!("Failed to update activity of room {}: {:?}", room_id, err);
        }
    }

    fn role_for(room: &Room, principal: &Principal) -> ParticipantRole {
        if room.creator_id == principal.user_id || principal.has(Capability::ModerateRooms) {
            ParticipantRole::Moderator
        } else {
            ParticipantRole::Participant
        }
    }
}

#[async_trait]
impl<R: RoomRepository + Send + Sync> RoomService for RoomServiceImpl<R> {
    async fn create_room(
        &self,
        data: CreateRoomDto,
        principal: &Principal,
    ) -> Result<RoomSummary, RoomError> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(RoomError::Validation("name must not be blank".to_string()));
        }

        if data.max_participants < self.policy.min_participants
            || data.max_participants > self.policy.max_participants
        {
            return Err(RoomError::Validation(format!(
                "maxParticipants must be between {} and {}",
                self.policy.min_participants, self.policy.max_participants
            )));
        }

        let password_hash = self.hash_password(data.password.clone()).await?;
        let now = Utc::now().naive_utc();

        let new_room = NewRoom {
            name,
            description: data.description.as_deref().map(str::trim),
            password_hash: &password_hash,
            creator_id: principal.user_id,
            created_at: now,
            last_activity_at: now,
            privacy_level: data.privacy_level.into(),
            max_participants: data.max_participants,
            allow_recording: data.allow_recording,
            is_encrypted: data.is_encrypted,
            is_active: true,
        };

        let room = self
            .room_repository
            .create_room_within_quota(new_room, self.policy.max_active_rooms_per_user)
            .await?
            .ok_or(RoomError::QuotaExceeded(self.policy.max_active_rooms_per_user))?;

        info!("Room {} created by user {}", room.id, principal.user_id);
        self.audit
            .record(AuditAction::RoomCreated, room.id, principal.user_id, None);

        Ok(RoomSummary::new(&room, 0))
    }

    async fn list_rooms(
        &self,
        principal: &Principal,
        pagination_dto: PaginationDto,
    ) -> Result<Vec<RoomSummary>, RoomError> {
        let rooms = self
            .room_repository
            .find_active_rooms(principal.user_id, pagination_dto.skip, pagination_dto.limit)
            .await?;

        Ok(rooms
            .iter()
            .map(|room| RoomSummary::new(room, self.presence.count(room.id)))
            .collect())
    }

    async fn get_room(
        &self,
        room_id: i32,
        principal: &Principal,
    ) -> Result<RoomDetailsResponse, RoomError> {
        let room = self.room_repository.get_room_by_id(room_id).await?;

        if !room.is_active {
            return Err(RoomError::RoomNotFound(room_id));
        }

        if room.privacy() == PrivacyLevel::InviteOnly && room.creator_id != principal.user_id {
            let participant = self
                .room_repository
                .get_participant(room_id, principal.user_id)
                .await?;

            if participant.is_none() {
                return Err(RoomError::RoomNotFound(room_id));
            }
        }

        Ok(RoomDetailsResponse {
            room: RoomSummary::new(&room, self.presence.count(room_id)),
            online_usernames: self.presence.list_usernames(room_id),
            is_recording: false,
        })
    }

    async fn join_room(
        &self,
        room_id: i32,
        password: &str,
        principal: &Principal,
    ) -> Result<JoinRoomResponse, RoomError> {
        let room = match self.room_repository.get_room_by_id(room_id).await {
            Ok(room) if room.is_active => room,
            Ok(_) | Err(RoomError::RoomNotFound(_)) => return Err(RoomError::AccessDenied),
            Err(err) => return Err(err),
        };

        if !self.verify_password(password, &room.password_hash).await? {
            return Err(RoomError::AccessDenied);
        }

        let role = Self::role_for(&room, principal);
        let participant = self
            .admit(&room, principal.user_id, &principal.username, role)
            .await?;

        let (capability_token, expires_at) = self.jwt_utils.generate_room_token(
            principal.user_id,
            room.id,
            &participant.username,
            role,
        )?;

        self.touch(room.id).await;
        self.audit
            .record(AuditAction::RoomJoined, room.id, principal.user_id, None);

        Ok(JoinRoomResponse {
            capability_token,
            expires_at,
            role,
            room: RoomSummary::new(&room, self.presence.count(room.id)),
        })
    }

    async fn admit_with_token(&self, claims: &RoomTokenClaims) -> Result<Room, RoomError> {
        let room = self.room_repository.get_room_by_id(claims.room_id).await?;

        if !room.is_active {
            return Err(RoomError::RoomNotFound(room.id));
        }

        self.admit(&room, claims.user_id, &claims.username, claims.role)
            .await?;

        Ok(room)
    }

    async fn leave_room(&self, room_id: i32, user_id: i32) -> Result<Participant, RoomError> {
        let participant = self
            .room_repository
            .get_participant(room_id, user_id)
            .await?
            .filter(Participant::is_active)
            .ok_or(RoomError::NotParticipant)?;

        let now = Utc::now().naive_utc();
        self.room_repository
            .mark_participant_left(room_id, user_id, now)
            .await?;

        self.seats.release(room_id, user_id);
        self.presence.remove_user(room_id, user_id);
        self.audit.record(AuditAction::RoomLeft, room_id, user_id, None);

        Ok(participant)
    }

    async fn delete_room(&self, room_id: i32, principal: &Principal) -> Result<(), RoomError> {
        let room = self.room_repository.get_room_by_id(room_id).await?;

        if room.creator_id != principal.user_id && !principal.has(Capability::ManageRooms) {
            return Err(RoomError::NotOwner);
        }

        self.room_repository.delete_room_cascade(room_id).await?;

        self.seats.forget_room(room_id);
        self.presence.clear_room(room_id);

        info!("Room {} deleted by user {}", room_id, principal.user_id);
        self.audit
            .record(AuditAction::RoomDeleted, room_id, principal.user_id, None);

        Ok(())
    }

    async fn release_stale_seats(&self) -> Result<usize, RoomError> {
        let now = Utc::now().naive_utc();
        let released = self.room_repository.mark_all_participants_left(now).await?;

        if released > 0 {
            info!("Released {} seats held before restart", released);
        }

        Ok(released)
    }
}
