use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, PooledConnection};
use tracing::{error, info};

use crate::core::{env::app_env::AppEnv, types::errors::general::GeneralError};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn establish_connection(env: &AppEnv) -> Result<DbPool, GeneralError> {
    let manager = ConnectionManager::<PgConnection>::new(env.db_uri.0.as_str());

    let pool = r2d2::Pool::builder().build(manager).map_err(|e| {
        error!("Failed to create pool: {}", e);
        GeneralError::DbConnectionError
    })?;

    info!("Connected to database");

    Ok(pool)
}
