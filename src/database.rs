use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::errors::Result;

const MIGRATION_SQL: &str =
    include_str!("../migrations/2026-07-20-000001_create_scheduler_tables/up.sql");

pub fn establish_connection(database_url: &str) -> SqliteConnection {
    SqliteConnection::establish(database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url))
}

/// Applies the schema. Every statement is idempotent, so this runs on each
/// startup.
pub fn run_migrations(connection: &mut SqliteConnection) -> Result<()> {
    connection.batch_execute(MIGRATION_SQL)?;

    Ok(())
}

#[cfg(test)]
pub fn test_connection() -> SqliteConnection {
    let mut connection =
        SqliteConnection::establish(":memory:").expect("in-memory database should open");
    run_migrations(&mut connection).expect("schema should apply");
    connection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut connection = test_connection();
        run_migrations(&mut connection).expect("second run should be a no-op");
    }
}
