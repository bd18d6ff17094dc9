//! Versioned database migrations.
//!
//! Migrations run sequentially from the current stored version to the latest.
//! Each migration is idempotent so a partially applied run can be repeated.

use rusqlite::Connection;
use tracing::{info, warn};
use br_core::error::{BrError, BrResult};
use br_core::constants::DB_SCHEMA_VERSION;

use crate::models::role::Role;

/// Run all pending migrations on the database.
pub fn run_migrations(conn: &Connection) -> BrResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= DB_SCHEMA_VERSION {
        info!("database schema is up to date (version {current_version})");
        return Ok(());
    }

    info!("running migrations from version {current_version} to {DB_SCHEMA_VERSION}");

    for version in (current_version + 1)..=DB_SCHEMA_VERSION {
        run_migration(conn, version)?;
    }

    set_schema_version(conn, DB_SCHEMA_VERSION)?;
    info!("migrations complete, schema at version {DB_SCHEMA_VERSION}");
    Ok(())
}

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> BrResult<i32> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| BrError::Migration(e.to_string()))?;

    if count == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])
            .map_err(|e| BrError::Migration(e.to_string()))?;
        return Ok(0);
    }

    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .map_err(|e| BrError::Migration(e.to_string()))
}

fn set_schema_version(conn: &Connection, version: i32) -> BrResult<()> {
    conn.execute("UPDATE schema_version SET version = ?1", [version])
        .map_err(|e| BrError::Migration(e.to_string()))?;
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> BrResult<()> {
    info!("applying migration version {version}");

    match version {
        1 => migration_v1(conn),
        _ => {
            warn!("unknown migration version {version}, skipping");
            Ok(())
        }
    }
}

/// Migration v1: seed the static roles.
fn migration_v1(conn: &Connection) -> BrResult<()> {
    for role in Role::seed() {
        role.upsert(conn)?;
    }
    info!("seeded {} roles", Role::seed().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_on_fresh_db() {
        let conn = fresh();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), DB_SCHEMA_VERSION);
    }

    #[test]
    fn test_role_seed_is_idempotent() {
        let conn = fresh();
        run_migrations(&conn).unwrap();
        migration_v1(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
