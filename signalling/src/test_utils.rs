//! Builders shared by the unit tests of services and the gateway.

use jsonwebtoken::{EncodingKey, Header, encode};
use time::OffsetDateTime;

use crate::{
    core::{
        audit::AuditSink,
        database::memory::MemoryStore,
        dtos::room::create_room_dto::CreateRoomDto,
        entities::{
            models::{ParticipantRole, PrivacyLevel},
            principal::Principal,
        },
        env::app_env::{FloodConfig, JwtConfig, RoomPolicy},
        utils::{
            bcrypt_utils::PasswordHasher,
            crypto_utils::MessageCipher,
            jwt_utils::{JwtClaims, JwtUtils, RoomTokenClaims},
        },
    },
    features::{
        chat::{flood_guard::FloodGuard, service::ChatServiceImpl},
        presence::tracker::PresenceTracker,
        recording::service::RecordingServiceImpl,
        room::{seats::SeatLedger, service::RoomServiceImpl},
    },
};

pub fn principal(user_id: i32, username: &str, roles: &[&str]) -> Principal {
    Principal::new(user_id, username, roles)
}

pub fn jwt_utils() -> JwtUtils {
    jwt_utils_with_ttl(300)
}

pub fn jwt_utils_with_ttl(room_token_ttl: i64) -> JwtUtils {
    JwtUtils::new(&JwtConfig {
        jwt_token: IDENTITY_SECRET.to_string(),
        room_token: "test-room-secret".to_string(),
        room_token_expires_in_seconds: room_token_ttl,
    })
}

const IDENTITY_SECRET: &str = "test-identity-secret";

/// Signs a bearer token the way the identity provider does.
pub fn identity_token(user_id: i32, username: &str, roles: &[&str]) -> String {
    let claims = JwtClaims {
        id: user_id.to_string(),
        username: username.to_string(),
        roles: roles.iter().map(|role| role.to_string()).collect(),
        exp: OffsetDateTime::now_utc().unix_timestamp() + 3600,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(IDENTITY_SECRET.as_bytes()),
    )
    .expect("identity token")
}

pub fn cipher() -> MessageCipher {
    MessageCipher::from_bytes(&[7u8; 32]).expect("32-byte key")
}

pub fn audit() -> AuditSink {
    AuditSink::new(64).0
}

pub fn room_claims(user_id: i32, room_id: i32, role: ParticipantRole) -> RoomTokenClaims {
    RoomTokenClaims {
        user_id,
        room_id,
        username: format!("user-{user_id}"),
        role,
        exp: OffsetDateTime::now_utc().unix_timestamp() + 300,
    }
}

pub fn create_room_dto(name: &str, password: &str, max_participants: i32) -> CreateRoomDto {
    CreateRoomDto {
        name: name.to_string(),
        description: None,
        password: password.to_string(),
        privacy_level: PrivacyLevel::Public,
        max_participants,
        allow_recording: true,
        is_encrypted: true,
    }
}

pub fn room_service_with(
    store: MemoryStore,
    presence: PresenceTracker,
) -> RoomServiceImpl<MemoryStore> {
    room_service_with_jwt(store, presence, jwt_utils())
}

pub fn room_service_with_jwt(
    store: MemoryStore,
    presence: PresenceTracker,
    jwt: JwtUtils,
) -> RoomServiceImpl<MemoryStore> {
    RoomServiceImpl::new(
        store,
        jwt,
        PasswordHasher::new(4),
        RoomPolicy::default(),
        SeatLedger::new(),
        presence,
        audit(),
    )
}

pub fn room_service(store: MemoryStore) -> RoomServiceImpl<MemoryStore> {
    room_service_with(store, PresenceTracker::new())
}

pub fn chat_service(
    store: MemoryStore,
    max_messages: usize,
    window_seconds: u64,
) -> ChatServiceImpl<MemoryStore, MemoryStore> {
    ChatServiceImpl::new(
        store.clone(),
        store,
        cipher(),
        FloodGuard::new(&FloodConfig {
            max_messages,
            window_seconds,
        }),
        audit(),
    )
}

pub fn recording_service(store: MemoryStore) -> RecordingServiceImpl<MemoryStore, MemoryStore> {
    RecordingServiceImpl::new(store.clone(), store, audit())
}
