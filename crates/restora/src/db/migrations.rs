//! Schema versioning.
//!
//! Applied versions are recorded in `_migrations`. Each pending step runs in
//! its own transaction together with its bookkeeping row, so a failed step
//! leaves no partial schema behind.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_kv_store",
        sql: include_str!("sql/001_create_kv_store.sql"),
    },
    Migration {
        version: 2,
        name: "create_cached_images",
        sql: include_str!("sql/002_create_cached_images.sql"),
    },
];

/// Highest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Highest version recorded in `conn`, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    ensure_table(conn)?;
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

/// Brings `conn` up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let from = current_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
        log::info!("Applied migration v{} ({})", migration.version, migration.name);
    }

    Ok(())
}

fn ensure_table(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(conn: &Connection) -> Vec<u32> {
        let mut stmt = conn
            .prepare("SELECT version FROM _migrations ORDER BY version")
            .unwrap();
        stmt.query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_reaches_latest() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);

        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(recorded(&conn), vec![1, 2]);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(recorded(&conn), vec![1, 2]);
    }

    #[test]
    fn test_cached_images_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info('cached_images')")
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for expected in ["job_id", "group_id", "data", "width", "height", "mime_type"] {
            assert!(columns.iter().any(|c| c == expected), "missing column {expected}");
        }
    }

    #[test]
    fn test_partial_history_resumes() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_table(&conn).unwrap();
        conn.execute_batch(include_str!("sql/001_create_kv_store.sql"))
            .unwrap();
        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (1, 'create_kv_store')",
            [],
        )
        .unwrap();

        run_all(&conn).unwrap();
        assert_eq!(recorded(&conn), vec![1, 2]);
    }
}
