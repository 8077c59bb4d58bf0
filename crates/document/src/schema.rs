use rusqlite::Connection;

use crate::error::DocumentError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), DocumentError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;

    let stored: i32 = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
    })?;
    if stored > SCHEMA_VERSION {
        return Err(DocumentError::InvalidOperation(format!(
            "document schema v{stored} is newer than supported v{SCHEMA_VERSION}"
        )));
    }
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS nodes (
    node_id BLOB PRIMARY KEY CHECK (length(node_id) = 16),
    parent_id BLOB CHECK (parent_id IS NULL OR length(parent_id) = 16),
    child_index INTEGER NOT NULL,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    visible INTEGER NOT NULL DEFAULT 1,
    x REAL NOT NULL DEFAULT 0,
    y REAL NOT NULL DEFAULT 0,
    width REAL NOT NULL DEFAULT 0,
    height REAL NOT NULL DEFAULT 0,
    text TEXT,
    list_style TEXT NOT NULL DEFAULT 'none',
    fonts BLOB,
    main_component BLOB CHECK (main_component IS NULL OR length(main_component) = 16),
    image_fill BLOB CHECK (image_fill IS NULL OR length(image_fill) = 32)
);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes (parent_id, child_index);

CREATE TABLE IF NOT EXISTS tags (
    node_id BLOB NOT NULL CHECK (length(node_id) = 16),
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (node_id, key)
);

CREATE TABLE IF NOT EXISTS images (
    hash BLOB PRIMARY KEY CHECK (length(hash) = 32),
    bytes BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS fonts (
    family TEXT NOT NULL,
    style TEXT NOT NULL,
    PRIMARY KEY (family, style)
);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_repeatable_and_records_version() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let versions: Vec<i32> = conn
            .prepare("SELECT version FROM schema_version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(versions, vec![SCHEMA_VERSION]);
    }

    #[test]
    fn newer_documents_are_refused() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, 0)",
            [SCHEMA_VERSION + 1],
        )
        .unwrap();
        assert!(matches!(
            init_schema(&conn),
            Err(DocumentError::InvalidOperation(_))
        ));
    }
}
