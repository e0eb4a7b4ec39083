use anyhow::anyhow;
use diesel::connection::SimpleConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use super::connection::connect_sqlite;

/// Embedded Diesel migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs pending migrations on the SQLite database at `database_url`,
/// switching it to WAL journaling first.
pub fn run(database_url: &str) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(database_url)?;
    conn.batch_execute("PRAGMA journal_mode=WAL;")?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow!(e))?;
    tracing::info!(database_url, applied = applied.len(), "Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn migrations_apply_on_temp_file_and_are_idempotent() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let path = temp.path().to_string_lossy().to_string();

        run(&path).expect("first migration run");
        run(&path).expect("second migration run");

        let mut conn = connect_sqlite(&path).unwrap();
        conn.batch_execute("INSERT INTO users (username, password) VALUES ('ram', 'pw')")
            .unwrap();
        let dup = conn.batch_execute("INSERT INTO users (username, password) VALUES ('ram', 'other')");
        assert!(dup.is_err(), "username must be unique");
    }
}
