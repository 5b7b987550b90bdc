use diesel::{
    ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper,
    dsl::{insert_into, update},
    r2d2::{ConnectionManager, Pool, PooledConnection},
};
use salvo::async_trait;

use crate::core::{
    database::schema::messages,
    entities::models::{Message, NewMessage},
    types::errors::{chat_error::ChatError, general::GeneralError},
};

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Newest first, soft-deleted messages excluded.
    async fn get_messages_by_room(
        &self,
        room_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError>;

    async fn get_message_by_id(&self, message_id: i32) -> Result<Message, ChatError>;

    async fn create_message(&self, message: NewMessage<'_>) -> Result<Message, ChatError>;

    /// Persists the ciphertext, timestamps and flags of `message`.
    async fn update_message(&self, message: Message) -> Result<Message, ChatError>;
}

#[derive(Debug, Clone)]
pub struct ChatRepositoryImpl {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl ChatRepositoryImpl {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, GeneralError> {
        self.pool.get().map_err(|_| GeneralError::DbConnectionError)
    }
}

#[async_trait]
impl ChatRepository for ChatRepositoryImpl {
    async fn get_messages_by_room(
        &self,
        room_id: i32,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError> {
        let mut conn = self.get_conn()?;

        messages::table
            .filter(messages::room_id.eq(room_id))
            .filter(messages::is_deleted.eq(false))
            .select(Message::as_select())
            .order(messages::id.desc())
            .offset(skip)
            .limit(limit)
            .load::<Message>(&mut conn)
            .map_err(|err| ChatError::UnexpectedError(format!("Failed to get messages: {err}")))
    }

    async fn get_message_by_id(&self, message_id: i32) -> Result<Message, ChatError> {
        let mut conn = self.get_conn()?;

        messages::table
            .filter(messages::id.eq(message_id))
            .select(Message::as_select())
            .first::<Message>(&mut conn)
            .map_err(|err| match err {
                diesel::result::Error::NotFound => ChatError::MessageNotFound(message_id),
                _ => ChatError::UnexpectedError(format!("Failed to get message: {err}")),
            })
    }

    async fn create_message(&self, message: NewMessage<'_>) -> Result<Message, ChatError> {
        let mut conn = self.get_conn()?;

        insert_into(messages::table)
            .values(&message)
            .returning(Message::as_select())
            .get_result(&mut conn)
            .map_err(|err| match err {
                // The room was deleted between the participant check and the insert.
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                    _,
                ) => ChatError::RoomNotFound(message.room_id),
                _ => ChatError::UnexpectedError(format!("Failed to create message: {err}")),
            })
    }

    async fn update_message(&self, message: Message) -> Result<Message, ChatError> {
        let mut conn = self.get_conn()?;

        update(messages::table)
            .filter(messages::id.eq(message.id))
            .set((
                messages::ciphertext.eq(message.ciphertext),
                messages::updated_at.eq(message.updated_at),
                messages::is_deleted.eq(message.is_deleted),
                messages::is_edited.eq(message.is_edited),
            ))
            .returning(Message::as_select())
            .get_result(&mut conn)
            .map_err(|err| match err {
                diesel::result::Error::NotFound => ChatError::MessageNotFound(message.id),
                _ => ChatError::UnexpectedError(format!("Failed to update message: {err}")),
            })
    }
}
