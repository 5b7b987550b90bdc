use chrono::NaiveDateTime;
use diesel::{
    ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper,
    dsl::{insert_into, update},
    r2d2::{ConnectionManager, Pool, PooledConnection},
    result::{DatabaseErrorKind, Error as DieselError},
};
use salvo::async_trait;

use crate::core::{
    database::schema::recordings,
    entities::models::{NewRecording, Recording, RecordingStatus},
    types::errors::{general::GeneralError, recording_error::RecordingError},
};

#[async_trait]
pub trait RecordingRepository: Send + Sync {
    /// Atomic test-and-set: fails with `AlreadyRecording` when the room already
    /// has a session in status Recording.
    async fn create_recording(&self, recording: NewRecording) -> Result<Recording, RecordingError>;

    async fn get_recording_by_id(
        &self,
        recording_id: i32,
    ) -> Result<Option<Recording>, RecordingError>;

    async fn find_active_recording(
        &self,
        room_id: i32,
    ) -> Result<Option<Recording>, RecordingError>;

    /// Flips Recording to Stopped. Returns `None` when the session was not
    /// active, so a second stop changes nothing.
    async fn stop_recording(
        &self,
        recording_id: i32,
        ended_at: NaiveDateTime,
    ) -> Result<Option<Recording>, RecordingError>;

    /// Newest first.
    async fn get_recordings_by_room(&self, room_id: i32) -> Result<Vec<Recording>, RecordingError>;
}

#[derive(Debug, Clone)]
pub struct RecordingRepositoryImpl {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl RecordingRepositoryImpl {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, GeneralError> {
        self.pool.get().map_err(|_| GeneralError::DbConnectionError)
    }
}

#[async_trait]
impl RecordingRepository for RecordingRepositoryImpl {
    async fn create_recording(&self, recording: NewRecording) -> Result<Recording, RecordingError> {
        let mut conn = self.get_conn()?;

        insert_into(recordings::table)
            .values(&recording)
            .returning(Recording::as_select())
            .get_result(&mut conn)
            .map_err(|err| match err {
                // recordings_one_active_per_room
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    RecordingError::AlreadyRecording
                }
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                    RecordingError::RoomNotFound(recording.room_id)
                }
                _ => RecordingError::UnexpectedError(format!("Failed to create recording: {err}")),
            })
    }

    async fn get_recording_by_id(
        &self,
        recording_id: i32,
    ) -> Result<Option<Recording>, RecordingError> {
        let mut conn = self.get_conn()?;

        recordings::table
            .filter(recordings::id.eq(recording_id))
            .select(Recording::as_select())
            .first::<Recording>(&mut conn)
            .optional()
            .map_err(|err| RecordingError::UnexpectedError(format!("Failed to get recording: {err}")))
    }

    async fn find_active_recording(
        &self,
        room_id: i32,
    ) -> Result<Option<Recording>, RecordingError> {
        let mut conn = self.get_conn()?;
        let active: i16 = RecordingStatus::Recording.into();

        recordings::table
            .filter(recordings::room_id.eq(room_id))
            .filter(recordings::status.eq(active))
            .select(Recording::as_select())
            .first::<Recording>(&mut conn)
            .optional()
            .map_err(|err| RecordingError::UnexpectedError(format!("Failed to get recording: {err}")))
    }

    async fn stop_recording(
        &self,
        recording_id: i32,
        ended_at: NaiveDateTime,
    ) -> Result<Option<Recording>, RecordingError> {
        let mut conn = self.get_conn()?;
        let active: i16 = RecordingStatus::Recording.into();
        let stopped: i16 = RecordingStatus::Stopped.into();

        update(recordings::table)
            .filter(recordings::id.eq(recording_id))
            .filter(recordings::status.eq(active))
            .set((
                recordings::status.eq(stopped),
                recordings::ended_at.eq(Some(ended_at)),
            ))
            .returning(Recording::as_select())
            .get_result(&mut conn)
            .optional()
            .map_err(|err| {
                RecordingError::UnexpectedError(format!("Failed to stop recording: {err}"))
            })
    }

    async fn get_recordings_by_room(&self, room_id: i32) -> Result<Vec<Recording>, RecordingError> {
        let mut conn = self.get_conn()?;

        recordings::table
            .filter(recordings::room_id.eq(room_id))
            .select(Recording::as_select())
            .order(recordings::started_at.desc())
            .load::<Recording>(&mut conn)
            .map_err(|err| {
                RecordingError::UnexpectedError(format!("Failed to get recordings: {err}"))
            })
    }
}
