use std::{collections::HashMap, sync::Arc, time::Duration};

use async_channel::Sender;
use dashmap::DashMap;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    core::{
        dtos::{
            common::pagination_dto::PaginationDto,
            socket::socket_dto::{LoadHistoryDto, SendMessageDto, StopRecordingDto},
        },
        entities::principal::Principal,
        types::{
            app_channel::{AppEvent, publish},
            enums::ws_event::WsEvent,
            errors::{
                ErrorKind, auth_error::AuthError, chat_error::ChatError,
                recording_error::RecordingError, room_error::RoomError,
            },
            responses::{
                message_response::MessageResponse,
                recording_response::RecordingResponse,
                room_response::{JoinRoomResponse, RoomDetailsResponse},
                socket_response::{
                    HistoryLoadedResponse, RoomDeletedResponse, RoomJoinedResponse,
                    SocketErrorResponse, UserPresenceResponse,
                },
            },
        },
        utils::{
            jwt_utils::{JwtUtils, RoomTokenClaims},
            keyed_lock::KeyedLocks,
        },
    },
    features::{
        chat::service::{ChatService, ChatServiceImpl},
        presence::tracker::PresenceTracker,
        recording::service::{RecordingService, RecordingServiceImpl},
        room::service::{RoomService, RoomServiceImpl},
    },
};

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Name of the transport room a connection joins for a chat room.
pub fn room_channel(room_id: i32) -> String {
    format!("room-{room_id}")
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Recording(#[from] RecordingError),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Auth(err) => err.kind(),
            GatewayError::Room(err) => err.kind(),
            GatewayError::Chat(err) => err.kind(),
            GatewayError::Recording(err) => err.kind(),
        }
    }

    pub fn to_response(&self, event: WsEvent) -> SocketErrorResponse {
        SocketErrorResponse {
            event: event.to_str().to_string(),
            code: self.kind().as_str().to_string(),
            message: self.to_string(),
        }
    }
}

/// Identity a connection is bound to by the token it connected with.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedUser {
    pub user_id: i32,
    pub username: String,
}

/// Dispatch boundary between real-time connections and the room, chat and
/// recording services.
///
/// Every connection holds one grant (the decoded capability token) per room
/// it joined. Calls naming a room the connection holds no grant for are
/// integrity errors, and privileged calls re-check the grant's expiry.
///
/// Seat changes of one user in one room (connect, disconnect, leave, join)
/// run one at a time, and so do message sends within one room, so a message
/// reaches the fan-out in the order it was persisted.
#[derive(Clone)]
pub struct RoomGateway<
    R: RoomService = RoomServiceImpl,
    C: ChatService = ChatServiceImpl,
    V: RecordingService = RecordingServiceImpl,
> {
    room_service: R,
    chat_service: C,
    recording_service: V,
    jwt_utils: JwtUtils,
    presence: PresenceTracker,
    grants: Arc<DashMap<String, HashMap<i32, RoomTokenClaims>>>,
    members: KeyedLocks<(i32, i32)>,
    sends: KeyedLocks<i32>,
    /// Seats taken over HTTP and not yet claimed by a connection, with the
    /// expiry of the token that claims them.
    unclaimed: Arc<DashMap<(i32, i32), i64>>,
    events: Sender<AppEvent>,
    stop_recording_on_last_leave: bool,
}

impl<R: RoomService, C: ChatService, V: RecordingService> RoomGateway<R, C, V> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room_service: R,
        chat_service: C,
        recording_service: V,
        jwt_utils: JwtUtils,
        presence: PresenceTracker,
        events: Sender<AppEvent>,
        stop_recording_on_last_leave: bool,
    ) -> Self {
        Self {
            room_service,
            chat_service,
            recording_service,
            jwt_utils,
            presence,
            grants: Arc::new(DashMap::new()),
            members: KeyedLocks::new(),
            sends: KeyedLocks::new(),
            unclaimed: Arc::new(DashMap::new()),
            events,
            stop_recording_on_last_leave,
        }
    }

    /// Admits a new connection into the room its capability token names.
    pub async fn connect(
        &self,
        sid: &str,
        token: &str,
    ) -> Result<(ConnectedUser, RoomJoinedResponse), GatewayError> {
        let claims = self.jwt_utils.decode_room_token(token)?;
        let user = ConnectedUser {
            user_id: claims.user_id,
            username: claims.username.clone(),
        };

        let joined = self.attach(sid, claims).await?;

        Ok((user, joined))
    }

    /// Adds a further room to an open connection of the same user.
    pub async fn join_room(
        &self,
        sid: &str,
        user: &ConnectedUser,
        token: &str,
    ) -> Result<RoomJoinedResponse, GatewayError> {
        let claims = self.jwt_utils.decode_room_token(token)?;

        if claims.user_id != user.user_id {
            return Err(AuthError::PrincipalMismatch.into());
        }

        self.attach(sid, claims).await
    }

    pub(crate) async fn attach(
        &self,
        sid: &str,
        claims: RoomTokenClaims,
    ) -> Result<RoomJoinedResponse, GatewayError> {
        let key = (claims.room_id, claims.user_id);
        let (room, first_connection) = self
            .members
            .run(key, async {
                let room = self.room_service.admit_with_token(&claims).await?;
                self.unclaimed.remove(&key);

                let first_connection = self.presence.register(
                    room.id,
                    claims.user_id,
                    &claims.username,
                    claims.role,
                );

                Ok::<_, RoomError>((room, first_connection))
            })
            .await?;

        let response = RoomJoinedResponse {
            room_id: room.id,
            role: claims.role,
            online_usernames: self.presence.list_usernames(room.id),
        };

        if first_connection {
            publish(
                &self.events,
                AppEvent::UserJoined(UserPresenceResponse {
                    room_id: room.id,
                    user_id: claims.user_id,
                    username: claims.username.clone(),
                    role: claims.role,
                }),
            );
        }

        info!("user {} attached to room {} via {}", claims.user_id, room.id, sid);
        self.grants
            .entry(sid.to_string())
            .or_default()
            .insert(room.id, claims);

        Ok(response)
    }

    fn grant(&self, sid: &str, room_id: i32) -> Result<RoomTokenClaims, GatewayError> {
        self.grants
            .get(sid)
            .and_then(|rooms| rooms.get(&room_id).cloned())
            .ok_or(AuthError::NoGrant(room_id).into())
    }

    fn fresh_grant(&self, sid: &str, room_id: i32) -> Result<RoomTokenClaims, GatewayError> {
        let claims = self.grant(sid, room_id)?;

        if claims.is_expired() {
            return Err(AuthError::TokenExpired.into());
        }

        Ok(claims)
    }

    pub async fn send_message(
        &self,
        sid: &str,
        data: SendMessageDto,
    ) -> Result<MessageResponse, GatewayError> {
        let claims = self.grant(sid, data.room_id)?;

        self.sends
            .run(data.room_id, async {
                let message = self
                    .chat_service
                    .send_message(data.room_id, claims.user_id, &data.content)
                    .await?;

                publish(&self.events, AppEvent::MessageReceived(message.clone()));

                Ok::<_, GatewayError>(message)
            })
            .await
    }

    pub async fn load_history(
        &self,
        sid: &str,
        data: LoadHistoryDto,
    ) -> Result<HistoryLoadedResponse, GatewayError> {
        let claims = self.grant(sid, data.room_id)?;

        let pagination = PaginationDto {
            skip: data.skip.unwrap_or(0).max(0),
            limit: data
                .limit
                .unwrap_or(DEFAULT_HISTORY_LIMIT)
                .clamp(1, MAX_HISTORY_LIMIT),
        };

        let messages = self
            .chat_service
            .history(data.room_id, claims.user_id, pagination)
            .await?;

        Ok(HistoryLoadedResponse {
            room_id: data.room_id,
            messages,
        })
    }

    pub async fn start_recording(
        &self,
        sid: &str,
        room_id: i32,
    ) -> Result<RecordingResponse, GatewayError> {
        let claims = self.fresh_grant(sid, room_id)?;

        let recording = self
            .recording_service
            .start_recording(room_id, &claims)
            .await?;

        publish(&self.events, AppEvent::RecordingStarted(recording.clone()));

        Ok(recording)
    }

    pub async fn stop_recording(
        &self,
        sid: &str,
        data: StopRecordingDto,
    ) -> Result<RecordingResponse, GatewayError> {
        let claims = self.fresh_grant(sid, data.room_id)?;

        let recording = self
            .recording_service
            .stop_recording(data.recording_id, &claims)
            .await?;

        publish(&self.events, AppEvent::RecordingStopped(recording.clone()));

        Ok(recording)
    }

    /// Detaches one connection from one room.
    pub async fn leave_room(&self, sid: &str, room_id: i32) -> Result<(), GatewayError> {
        let claims = self
            .grants
            .get_mut(sid)
            .and_then(|mut rooms| rooms.remove(&room_id))
            .ok_or(AuthError::NoGrant(room_id))?;

        self.grants.remove_if(sid, |_, rooms| rooms.is_empty());
        self.detach(&claims).await;

        Ok(())
    }

    /// Connection loss: detaches the connection from every room it held.
    pub async fn disconnect(&self, sid: &str) {
        let Some((_, rooms)) = self.grants.remove(sid) else {
            return;
        };

        for claims in rooms.values() {
            self.detach(claims).await;
        }
    }

    async fn detach(&self, claims: &RoomTokenClaims) {
        let key = (claims.room_id, claims.user_id);

        self.members
            .run(key, async {
                if !self.presence.unregister(claims.room_id, claims.user_id) {
                    return;
                }

                self.release_seat(claims.room_id, claims.user_id).await;

                self.after_user_left(UserPresenceResponse {
                    room_id: claims.room_id,
                    user_id: claims.user_id,
                    username: claims.username.clone(),
                    role: claims.role,
                })
                .await;
            })
            .await;
    }

    async fn release_seat(&self, room_id: i32, user_id: i32) -> bool {
        match self.room_service.leave_room(room_id, user_id).await {
            Ok(_) => true,
            Err(RoomError::NotParticipant) | Err(RoomError::RoomNotFound(_)) => false,
            Err(err) => {
                warn!(
                    "failed to release user {} from room {}: {:?}",
                    user_id, room_id, err
                );
                false
            }
        }
    }

    async fn after_user_left(&self, user: UserPresenceResponse) {
        if self.stop_recording_on_last_leave && self.presence.count(user.room_id) == 0 {
            match self
                .recording_service
                .force_stop_for_user(user.room_id, user.user_id)
                .await
            {
                Ok(Some(recording)) => {
                    publish(&self.events, AppEvent::RecordingStopped(recording));
                }
                Ok(None) => {}
                Err(err) => warn!(
                    "failed to stop recording of room {}: {:?}",
                    user.room_id, err
                ),
            }
        }

        publish(&self.events, AppEvent::UserLeft(user));
    }

    fn revoke(&self, room_id: i32, user_id: Option<i32>) -> Vec<String> {
        let mut revoked = Vec::new();

        for mut entry in self.grants.iter_mut() {
            let holds = entry
                .value()
                .get(&room_id)
                .is_some_and(|claims| user_id.is_none_or(|user_id| claims.user_id == user_id));

            if holds {
                entry.value_mut().remove(&room_id);
                revoked.push(entry.key().clone());
            }
        }

        self.grants.retain(|_, rooms| !rooms.is_empty());
        revoked
    }

    /// Explicit leave over HTTP. Returns the connections that lost their grant.
    pub async fn leave_user(&self, room_id: i32, user_id: i32) -> Result<Vec<String>, RoomError> {
        self.members
            .run((room_id, user_id), async {
                let participant = self.room_service.leave_room(room_id, user_id).await?;
                self.unclaimed.remove(&(room_id, user_id));
                let revoked = self.revoke(room_id, Some(user_id));

                self.after_user_left(UserPresenceResponse {
                    room_id,
                    user_id,
                    username: participant.username.clone(),
                    role: participant.role(),
                })
                .await;

                Ok::<_, RoomError>(revoked)
            })
            .await
    }

    /// Room details with the live recording state filled in.
    pub async fn room_details(
        &self,
        room_id: i32,
        principal: &Principal,
    ) -> Result<RoomDetailsResponse, RoomError> {
        let mut details = self.room_service.get_room(room_id, principal).await?;

        details.is_recording = self
            .recording_service
            .is_recording(room_id)
            .await
            .map_err(|err| RoomError::UnexpectedError(err.to_string()))?;

        Ok(details)
    }

    /// Deletes the room and drops all its runtime state. Returns the
    /// connections that lost their grant.
    pub async fn delete_room(
        &self,
        room_id: i32,
        principal: &Principal,
    ) -> Result<Vec<String>, RoomError> {
        self.room_service.delete_room(room_id, principal).await?;
        self.chat_service.forget_room(room_id);
        self.unclaimed.retain(|(room, _), _| *room != room_id);

        let revoked = self.revoke(room_id, None);
        publish(
            &self.events,
            AppEvent::RoomDeleted(RoomDeletedResponse { room_id }),
        );

        Ok(revoked)
    }
}

impl<R, C, V> RoomGateway<R, C, V>
where
    R: RoomService + Clone + 'static,
    C: ChatService + Clone + 'static,
    V: RecordingService + Clone + 'static,
{
    /// Password join over HTTP. The seat it takes is released again if no
    /// connection claims it before the capability token expires.
    pub async fn join_over_http(
        &self,
        room_id: i32,
        password: &str,
        principal: &Principal,
    ) -> Result<JoinRoomResponse, RoomError> {
        let key = (room_id, principal.user_id);

        let joined = self
            .members
            .run(key, async {
                let joined = self
                    .room_service
                    .join_room(room_id, password, principal)
                    .await?;
                self.unclaimed.insert(key, joined.expires_at);

                Ok::<_, RoomError>(joined)
            })
            .await?;

        self.expire_unclaimed_seat(key, joined.expires_at);

        Ok(joined)
    }

    fn expire_unclaimed_seat(&self, key: (i32, i32), expires_at: i64) {
        let gateway = self.clone();
        let wait = (expires_at - OffsetDateTime::now_utc().unix_timestamp()).max(0) as u64;

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(wait)).await;
            gateway.release_unclaimed_seat(key, expires_at).await;
        });
    }

    async fn release_unclaimed_seat(&self, key: (i32, i32), expires_at: i64) {
        let (room_id, user_id) = key;

        self.members
            .run(key, async {
                // A later join or a connection has taken over the seat.
                if self
                    .unclaimed
                    .remove_if(&key, |_, issued| *issued == expires_at)
                    .is_none()
                {
                    return;
                }

                if self.presence.is_present(room_id, user_id) {
                    return;
                }

                if self.release_seat(room_id, user_id).await {
                    info!(
                        "released unclaimed seat of user {} in room {}",
                        user_id, room_id
                    );
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use async_channel::Receiver;

    use super::*;
    use crate::core::{
        database::memory::MemoryStore,
        entities::models::{ParticipantRole, RecordingStatus},
    };
    use crate::test_utils::{
        chat_service, create_room_dto, jwt_utils_with_ttl, principal, recording_service,
        room_service_with_jwt,
    };

    type TestGateway = RoomGateway<
        RoomServiceImpl<MemoryStore>,
        ChatServiceImpl<MemoryStore, MemoryStore>,
        RecordingServiceImpl<MemoryStore, MemoryStore>,
    >;

    struct Harness {
        store: MemoryStore,
        gateway: TestGateway,
        events: Receiver<AppEvent>,
        jwt: JwtUtils,
    }

    impl Harness {
        fn new(stop_recording_on_last_leave: bool) -> Self {
            Self::with_token_ttl(stop_recording_on_last_leave, 300)
        }

        fn with_token_ttl(stop_recording_on_last_leave: bool, room_token_ttl: i64) -> Self {
            let store = MemoryStore::new();
            let presence = PresenceTracker::new();
            let (sender, events) = async_channel::unbounded();
            let jwt = jwt_utils_with_ttl(room_token_ttl);

            let gateway = RoomGateway::new(
                room_service_with_jwt(store.clone(), presence.clone(), jwt.clone()),
                chat_service(store.clone(), 30, 60),
                recording_service(store.clone()),
                jwt.clone(),
                presence,
                sender,
                stop_recording_on_last_leave,
            );

            Self {
                store,
                gateway,
                events,
                jwt,
            }
        }

        fn token(&self, user_id: i32, room_id: i32, role: ParticipantRole) -> String {
            self.jwt
                .generate_room_token(user_id, room_id, &format!("user-{user_id}"), role)
                .unwrap()
                .0
        }

        fn drain(&self) -> Vec<AppEvent> {
            std::iter::from_fn(|| self.events.try_recv().ok()).collect()
        }
    }

    fn send(room_id: i32, content: &str) -> SendMessageDto {
        SendMessageDto {
            room_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn connect_registers_presence_and_announces_once() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);

        let token = h.token(2, room.id, ParticipantRole::Participant);
        let (user, joined) = h.gateway.connect("s1", &token).await.unwrap();
        h.gateway.connect("s2", &token).await.unwrap();

        assert_eq!(user.user_id, 2);
        assert_eq!(joined.online_usernames, vec!["user-2"]);
        assert!(h.store.participant(room.id, 2).unwrap().is_active());

        let joins = h
            .drain()
            .into_iter()
            .filter(|event| matches!(event, AppEvent::UserJoined(_)))
            .count();
        assert_eq!(joins, 1);
    }

    #[tokio::test]
    async fn messages_fan_out_in_acceptance_order() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        let token = h.token(2, room.id, ParticipantRole::Participant);
        h.gateway.connect("s1", &token).await.unwrap();
        h.drain();

        for content in ["one", "two", "three"] {
            h.gateway.send_message("s1", send(room.id, content)).await.unwrap();
        }

        let delivered = h
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::MessageReceived(message) => Some(message.content),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(delivered, vec!["one", "two", "three"]);

        let history = h
            .gateway
            .load_history(
                "s1",
                LoadHistoryDto {
                    room_id: room.id,
                    skip: None,
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(history.messages.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_persist_does_not_reorder_the_room_broadcast() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        h.gateway
            .connect("s1", &h.token(2, room.id, ParticipantRole::Participant))
            .await
            .unwrap();
        h.gateway
            .connect("s2", &h.token(3, room.id, ParticipantRole::Participant))
            .await
            .unwrap();
        h.drain();

        h.store.delay_next_touch(Duration::from_millis(200));
        let first = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move { gateway.send_message("s1", send(room.id, "first")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = h
            .gateway
            .send_message("s2", send(room.id, "second"))
            .await
            .unwrap();
        let first = first.await.unwrap().unwrap();
        assert!(first.id < second.id);

        let delivered = h
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::MessageReceived(message) => Some(message.id),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(delivered, vec![first.id, second.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_during_a_slow_disconnect_keeps_the_user_seated() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        let token = h.token(2, room.id, ParticipantRole::Participant);
        h.gateway.connect("old", &token).await.unwrap();

        h.store.delay_next_leave(Duration::from_millis(200));
        let closing = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move { gateway.disconnect("old").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.gateway.connect("new", &token).await.unwrap();
        closing.await.unwrap();

        assert!(h.gateway.presence.is_present(room.id, 2));
        assert!(h.store.participant(room.id, 2).unwrap().is_active());
        assert!(h.gateway.send_message("new", send(room.id, "back")).await.is_ok());

        let presence_events = h
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::UserJoined(_) => Some("joined"),
                AppEvent::UserLeft(_) => Some("left"),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(presence_events, vec!["joined", "left", "joined"]);
    }

    #[tokio::test]
    async fn seat_taken_over_http_is_released_if_never_claimed() {
        let h = Harness::with_token_ttl(true, 1);
        let owner = principal(1, "owner", &[]);
        let room = h
            .gateway
            .room_service
            .create_room(create_room_dto("Pair", "123123", 2), &owner)
            .await
            .unwrap();

        h.gateway
            .join_over_http(room.id, "123123", &principal(2, "idle", &[]))
            .await
            .unwrap();
        let claimed = h
            .gateway
            .join_over_http(room.id, "123123", &principal(3, "online", &[]))
            .await
            .unwrap();
        h.gateway
            .connect("s3", &claimed.capability_token)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(h.store.participant(room.id, 2).unwrap().left_at.is_some());
        assert!(h.store.participant(room.id, 3).unwrap().is_active());
        assert!(h.gateway.unclaimed.is_empty());
        assert!(h
            .gateway
            .join_over_http(room.id, "123123", &principal(4, "late", &[]))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn room_details_report_a_running_recording() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        let owner = principal(1, "owner", &[]);

        let idle = h.gateway.room_details(room.id, &owner).await.unwrap();
        assert!(!idle.is_recording);

        h.store.seed_recording(room.id, 1);
        let busy = h.gateway.room_details(room.id, &owner).await.unwrap();
        assert!(busy.is_recording);
    }

    #[tokio::test]
    async fn token_for_room_x_cannot_stop_recording_in_room_y() {
        let h = Harness::new(true);
        let room_x = h.store.seed_room(1, true, 10);
        let room_y = h.store.seed_room(1, true, 10);
        let recording = h.store.seed_recording(room_y.id, 1);

        let token = h.token(1, room_x.id, ParticipantRole::Moderator);
        h.gateway.connect("s1", &token).await.unwrap();

        let other_room = h
            .gateway
            .stop_recording(
                "s1",
                StopRecordingDto {
                    room_id: room_y.id,
                    recording_id: recording.id,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(other_room, GatewayError::Auth(AuthError::NoGrant(room_y.id)));
        assert_eq!(other_room.kind(), ErrorKind::Integrity);

        let smuggled = h
            .gateway
            .stop_recording(
                "s1",
                StopRecordingDto {
                    room_id: room_x.id,
                    recording_id: recording.id,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(smuggled.kind(), ErrorKind::Integrity);
        assert_eq!(h.store.active_recording_count(room_y.id), 1);

        let reply = smuggled.to_response(WsEvent::StopRecording);
        assert_eq!(reply.event, "stopRecording");
        assert_eq!(reply.code, "INTEGRITY");
    }

    #[tokio::test]
    async fn expired_grant_blocks_recording_but_not_chat() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);

        let claims = RoomTokenClaims {
            user_id: 1,
            room_id: room.id,
            username: "teacher".to_string(),
            role: ParticipantRole::Moderator,
            exp: OffsetDateTime::now_utc().unix_timestamp(),
        };
        h.gateway.attach("s1", claims).await.unwrap();

        assert_eq!(
            h.gateway.start_recording("s1", room.id).await,
            Err(GatewayError::Auth(AuthError::TokenExpired))
        );
        assert!(h.gateway.send_message("s1", send(room.id, "still here")).await.is_ok());
        assert_eq!(h.store.active_recording_count(room.id), 0);
    }

    #[tokio::test]
    async fn last_participant_leaving_stops_their_recording() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        let teacher = h.token(1, room.id, ParticipantRole::Moderator);
        let pupil = h.token(2, room.id, ParticipantRole::Participant);

        h.gateway.connect("t", &teacher).await.unwrap();
        h.gateway.connect("p", &pupil).await.unwrap();
        let recording = h.gateway.start_recording("t", room.id).await.unwrap();

        h.gateway.disconnect("p").await;
        assert_eq!(h.store.active_recording_count(room.id), 1);

        h.drain();
        h.gateway.disconnect("t").await;

        let events = h.drain();
        assert!(events.iter().any(|event| matches!(
            event,
            AppEvent::RecordingStopped(stopped)
                if stopped.recording_id == recording.recording_id
                    && stopped.status == RecordingStatus::Stopped
        )));
        assert!(matches!(events.last(), Some(AppEvent::UserLeft(user)) if user.user_id == 1));
        assert_eq!(h.store.active_recording_count(room.id), 0);
        assert!(h.store.participant(room.id, 1).unwrap().left_at.is_some());
    }

    #[tokio::test]
    async fn recording_survives_when_policy_is_off() {
        let h = Harness::new(false);
        let room = h.store.seed_room(1, true, 10);
        let teacher = h.token(1, room.id, ParticipantRole::Moderator);

        h.gateway.connect("t", &teacher).await.unwrap();
        h.gateway.start_recording("t", room.id).await.unwrap();
        h.gateway.disconnect("t").await;

        assert_eq!(h.store.active_recording_count(room.id), 1);
    }

    #[tokio::test]
    async fn one_connection_may_hold_several_rooms() {
        let h = Harness::new(true);
        let room_a = h.store.seed_room(1, true, 10);
        let room_b = h.store.seed_room(1, true, 10);

        let (user, _) = h
            .gateway
            .connect("s1", &h.token(3, room_a.id, ParticipantRole::Participant))
            .await
            .unwrap();
        h.gateway
            .join_room("s1", &user, &h.token(3, room_b.id, ParticipantRole::Participant))
            .await
            .unwrap();

        let stranger = h.token(4, room_b.id, ParticipantRole::Participant);
        assert_eq!(
            h.gateway.join_room("s1", &user, &stranger).await,
            Err(GatewayError::Auth(AuthError::PrincipalMismatch))
        );

        h.drain();
        h.gateway.disconnect("s1").await;

        let mut left = h
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::UserLeft(user) => Some(user.room_id),
                _ => None,
            })
            .collect::<Vec<_>>();
        left.sort();
        assert_eq!(left, vec![room_a.id, room_b.id]);
    }

    #[tokio::test]
    async fn reconnect_is_subject_to_capacity() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 2);
        let late = h.token(3, room.id, ParticipantRole::Participant);

        h.gateway
            .connect("a", &h.token(1, room.id, ParticipantRole::Moderator))
            .await
            .unwrap();
        h.gateway
            .connect("b", &h.token(2, room.id, ParticipantRole::Participant))
            .await
            .unwrap();

        assert_eq!(
            h.gateway.connect("c", &late).await.unwrap_err(),
            GatewayError::Room(RoomError::RoomFull(2))
        );

        h.gateway.leave_room("b", room.id).await.unwrap();
        assert!(h.gateway.connect("c", &late).await.is_ok());
    }

    #[tokio::test]
    async fn deleting_a_room_revokes_every_grant() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        h.gateway
            .connect("s1", &h.token(1, room.id, ParticipantRole::Moderator))
            .await
            .unwrap();
        h.gateway
            .connect("s2", &h.token(2, room.id, ParticipantRole::Participant))
            .await
            .unwrap();

        let mut revoked = h
            .gateway
            .delete_room(room.id, &crate::test_utils::principal(1, "owner", &[]))
            .await
            .unwrap();
        revoked.sort();

        assert_eq!(revoked, vec!["s1", "s2"]);
        assert!(matches!(h.drain().last(), Some(AppEvent::RoomDeleted(_))));
        assert_eq!(
            h.gateway.send_message("s2", send(room.id, "anyone?")).await,
            Err(GatewayError::Auth(AuthError::NoGrant(room.id)))
        );
    }

    #[tokio::test]
    async fn http_leave_revokes_the_users_connections() {
        let h = Harness::new(true);
        let room = h.store.seed_room(1, true, 10);
        let token = h.token(2, room.id, ParticipantRole::Participant);
        h.gateway.connect("s1", &token).await.unwrap();
        h.gateway.connect("s2", &token).await.unwrap();

        let mut revoked = h.gateway.leave_user(room.id, 2).await.unwrap();
        revoked.sort();

        assert_eq!(revoked, vec!["s1", "s2"]);
        assert_eq!(
            h.gateway.leave_user(room.id, 2).await,
            Err(RoomError::NotParticipant)
        );
    }
}
