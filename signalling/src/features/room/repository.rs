use chrono::NaiveDateTime;
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, PgConnection,
    QueryDsl, RunQueryDsl, SelectableHelper,
    dsl::{delete, insert_into, update},
    r2d2::{ConnectionManager, Pool, PooledConnection},
    sql_types::Integer,
};
use salvo::async_trait;

use crate::core::{
    database::schema::{messages, participants, recordings, rooms},
    entities::models::{NewParticipant, NewRoom, Participant, PrivacyLevel, Room},
    types::errors::{general::GeneralError, room_error::RoomError},
};

/// Namespace of the advisory lock serializing room creation per creator.
const ROOM_QUOTA_LOCK_NAMESPACE: i32 = 0x524f_4f4d;

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Inserts the room unless its creator already owns `max_active_rooms`
    /// active rooms, in which case `None` is returned. Check and insert are
    /// atomic per creator.
    async fn create_room_within_quota(
        &self,
        room: NewRoom<'_>,
        max_active_rooms: i64,
    ) -> Result<Option<Room>, RoomError>;

    async fn get_room_by_id(&self, room_id: i32) -> Result<Room, RoomError>;

    /// Active rooms visible to `user_id`: invite-only rooms are listed only for
    /// their creator and current participants.
    async fn find_active_rooms(
        &self,
        user_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Room>, RoomError>;

    async fn touch_room(&self, room_id: i32, at: NaiveDateTime) -> Result<(), RoomError>;

    /// Removes the room with its recordings, messages and participants in one
    /// transaction.
    async fn delete_room_cascade(&self, room_id: i32) -> Result<(), RoomError>;

    async fn get_active_participants(&self, room_id: i32) -> Result<Vec<Participant>, RoomError>;

    /// Current or former participant row.
    async fn get_participant(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Option<Participant>, RoomError>;

    async fn upsert_participant(
        &self,
        participant: NewParticipant<'_>,
    ) -> Result<Participant, RoomError>;

    /// Returns false when the user had no active participant row.
    async fn mark_participant_left(
        &self,
        room_id: i32,
        user_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, RoomError>;

    /// Closes every open participant row. Returns how many were closed.
    async fn mark_all_participants_left(&self, at: NaiveDateTime) -> Result<usize, RoomError>;
}

#[derive(Debug, Clone)]
pub struct RoomRepositoryImpl {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl RoomRepositoryImpl {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, GeneralError> {
        self.pool.get().map_err(|_| GeneralError::DbConnectionError)
    }
}

#[async_trait]
impl RoomRepository for RoomRepositoryImpl {
    async fn create_room_within_quota(
        &self,
        room: NewRoom<'_>,
        max_active_rooms: i64,
    ) -> Result<Option<Room>, RoomError> {
        let mut conn = self.get_conn()?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::sql_query("SELECT pg_advisory_xact_lock($1, $2)")
                .bind::<Integer, _>(ROOM_QUOTA_LOCK_NAMESPACE)
                .bind::<Integer, _>(room.creator_id)
                .execute(conn)?;

            let active_rooms: i64 = rooms::table
                .filter(rooms::creator_id.eq(room.creator_id))
                .filter(rooms::is_active.eq(true))
                .count()
                .get_result(conn)?;

            if active_rooms >= max_active_rooms {
                return Ok(None);
            }

            insert_into(rooms::table)
                .values(&room)
                .returning(Room::as_select())
                .get_result(conn)
                .map(Some)
        })
        .map_err(|err| RoomError::UnexpectedError(format!("Failed to create room: {err}")))
    }

    async fn get_room_by_id(&self, room_id: i32) -> Result<Room, RoomError> {
        let mut conn = self.get_conn()?;

        rooms::table
            .filter(rooms::id.eq(room_id))
            .select(Room::as_select())
            .first::<Room>(&mut conn)
            .map_err(|err| match err {
                diesel::result::Error::NotFound => RoomError::RoomNotFound(room_id),
                _ => RoomError::UnexpectedError(format!("Failed to get room: {err}")),
            })
    }

    async fn find_active_rooms(
        &self,
        user_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Room>, RoomError> {
        let mut conn = self.get_conn()?;

        let invite_only: i16 = PrivacyLevel::InviteOnly.into();

        let joined_rooms = participants::table
            .filter(participants::user_id.eq(user_id))
            .filter(participants::left_at.is_null())
            .select(participants::room_id);

        rooms::table
            .filter(rooms::is_active.eq(true))
            .filter(
                rooms::privacy_level
                    .ne(invite_only)
                    .or(rooms::creator_id.eq(user_id))
                    .or(rooms::id.eq_any(joined_rooms)),
            )
            .select(Room::as_select())
            .order(rooms::last_activity_at.desc())
            .offset(skip)
            .limit(limit)
            .load::<Room>(&mut conn)
            .map_err(|err| RoomError::UnexpectedError(format!("Failed to find rooms: {err}")))
    }

    async fn touch_room(&self, room_id: i32, at: NaiveDateTime) -> Result<(), RoomError> {
        let mut conn = self.get_conn()?;

        update(rooms::table)
            .filter(rooms::id.eq(room_id))
            .set(rooms::last_activity_at.eq(at))
            .execute(&mut conn)
            .map(|_| ())
            .map_err(|err| RoomError::UnexpectedError(format!("Failed to touch room: {err}")))
    }

    async fn delete_room_cascade(&self, room_id: i32) -> Result<(), RoomError> {
        let mut conn = self.get_conn()?;

        let deleted = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                delete(recordings::table.filter(recordings::room_id.eq(room_id))).execute(conn)?;
                delete(messages::table.filter(messages::room_id.eq(room_id))).execute(conn)?;
                delete(participants::table.filter(participants::room_id.eq(room_id)))
                    .execute(conn)?;
                delete(rooms::table.filter(rooms::id.eq(room_id))).execute(conn)
            })
            .map_err(|err| RoomError::UnexpectedError(format!("Failed to delete room: {err}")))?;

        if deleted == 0 {
            return Err(RoomError::RoomNotFound(room_id));
        }

        Ok(())
    }

    async fn get_active_participants(&self, room_id: i32) -> Result<Vec<Participant>, RoomError> {
        let mut conn = self.get_conn()?;

        participants::table
            .filter(participants::room_id.eq(room_id))
            .filter(participants::left_at.is_null())
            .select(Participant::as_select())
            .order(participants::joined_at.asc())
            .load::<Participant>(&mut conn)
            .map_err(|err| {
                RoomError::UnexpectedError(format!("Failed to get participants: {err}"))
            })
    }

    async fn get_participant(
        &self,
        room_id: i32,
        user_id: i32,
    ) -> Result<Option<Participant>, RoomError> {
        let mut conn = self.get_conn()?;

        participants::table
            .filter(participants::room_id.eq(room_id))
            .filter(participants::user_id.eq(user_id))
            .select(Participant::as_select())
            .first::<Participant>(&mut conn)
            .optional()
            .map_err(|err| RoomError::UnexpectedError(format!("Failed to get participant: {err}")))
    }

    async fn upsert_participant(
        &self,
        participant: NewParticipant<'_>,
    ) -> Result<Participant, RoomError> {
        let mut conn = self.get_conn()?;

        insert_into(participants::table)
            .values(&participant)
            .on_conflict((participants::room_id, participants::user_id))
            .do_update()
            .set((
                participants::username.eq(participant.username),
                participants::role.eq(participant.role),
                participants::joined_at.eq(participant.joined_at),
                participants::left_at.eq(None::<NaiveDateTime>),
            ))
            .returning(Participant::as_select())
            .get_result(&mut conn)
            .map_err(|err| RoomError::UnexpectedError(format!("Failed to save participant: {err}")))
    }

    async fn mark_participant_left(
        &self,
        room_id: i32,
        user_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, RoomError> {
        let mut conn = self.get_conn()?;

        update(participants::table)
            .filter(participants::room_id.eq(room_id))
            .filter(participants::user_id.eq(user_id))
            .filter(participants::left_at.is_null())
            .set(participants::left_at.eq(Some(at)))
            .execute(&mut conn)
            .map(|updated| updated > 0)
            .map_err(|err| {
                RoomError::UnexpectedError(format!("Failed to update participant: {err}"))
            })
    }

    async fn mark_all_participants_left(&self, at: NaiveDateTime) -> Result<usize, RoomError> {
        let mut conn = self.get_conn()?;

        update(participants::table)
            .filter(participants::left_at.is_null())
            .set(participants::left_at.eq(Some(at)))
            .execute(&mut conn)
            .map_err(|err| {
                RoomError::UnexpectedError(format!("Failed to release participants: {err}"))
            })
    }
}
