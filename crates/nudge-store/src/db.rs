use rusqlite::Connection;

use crate::error::Result;

/// Initialise the key-value schema in `conn`.
///
/// Creates the `kv_slots` table (idempotent). Each row holds one JSON blob.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_slots (
            key         TEXT    NOT NULL PRIMARY KEY,
            value       TEXT    NOT NULL,   -- JSON document
            updated_at  TEXT    NOT NULL    -- ISO-8601
        ) STRICT;
        ",
    )?;
    Ok(())
}
