//! SQLite connection helpers.

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::{Connection, SqliteConnection};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const PRAGMAS: &str = "PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;";

#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(PRAGMAS).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Open a single SQLite connection with the connection-wide PRAGMAs applied.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)?;
    conn.batch_execute(PRAGMAS)?;
    Ok(conn)
}

/// Build the connection pool shared by request handlers.
pub fn build_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?;
    tracing::debug!(database_url, max_size = pool.max_size(), "Built SQLite connection pool");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::sql_types::Integer;
    use diesel::{QueryableByName, RunQueryDsl, sql_query};

    #[derive(QueryableByName)]
    struct BusyTimeout {
        #[diesel(sql_type = Integer, column_name = "timeout")]
        busy_timeout: i32,
    }

    #[test]
    fn pooled_connections_get_pragmas() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pool.db");
        let pool = build_pool(path.to_str().unwrap()).unwrap();

        let mut conn = pool.get().unwrap();
        let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(&mut *conn).unwrap();
        assert_eq!(bt.busy_timeout, 5000);
    }
}
