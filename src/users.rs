use crate::db::connection::DbPool;
use crate::schema::users;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    // Stored and compared as entered.
    pub password: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn create_user(conn: &mut SqliteConnection, new_user: &NewUser<'_>) -> Result<User, UserError> {
    diesel::insert_into(users::table)
        .values(new_user)
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                UserError::UsernameTaken(new_user.username.to_string())
            }
            other => other.into(),
        })
}

pub fn find_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>, UserError> {
    let user = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first(conn)
        .optional()?;
    Ok(user)
}

/// Exact match on both username and password.
pub fn find_by_credentials(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
) -> Result<Option<User>, UserError> {
    let user = users::table
        .filter(users::username.eq(username))
        .filter(users::password.eq(password))
        .select(User::as_select())
        .first(conn)
        .optional()?;
    Ok(user)
}

/// Async front for the user table. Diesel calls run on the blocking pool.
#[derive(Clone)]
pub struct UserStore {
    pool: DbPool,
}

impl UserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, username: String, password: String) -> Result<User, UserError> {
        let user = self
            .with_conn(move |conn| {
                create_user(
                    conn,
                    &NewUser {
                        username: &username,
                        password: &password,
                    },
                )
            })
            .await?;
        debug!(user_id = user.id, "Inserted user");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: String, password: String) -> Result<Option<User>, UserError> {
        self.with_conn(move |conn| find_by_credentials(conn, &username, &password))
            .await
    }

    pub async fn find(&self, username: String) -> Result<Option<User>, UserError> {
        self.with_conn(move |conn| find_by_username(conn, &username)).await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, UserError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, UserError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await?
    }
}
