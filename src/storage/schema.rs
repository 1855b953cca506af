use duckdb::Connection;

/// Base name of the tracker table; the configured prefix is prepended.
pub const TRACKER_TABLE: &str = "top_pages_tracker";

/// Build the full table name from a prefix.
pub fn table_name(prefix: &str) -> String {
    format!("{prefix}{TRACKER_TABLE}")
}

/// Check that a table prefix is safe to splice into DDL and queries.
///
/// Only ASCII alphanumerics and `_` are accepted, at most 32 characters.
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix.len() <= 32 && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn sequence_name(table: &str) -> String {
    format!("{table}_id_seq")
}

/// Create the tracker table and its id sequence. Safe to call repeatedly.
///
/// `page_id` carries a UNIQUE constraint so the recorder can upsert in a
/// single statement. The upsert draws from the id sequence even when it
/// ends up updating, so ids grow monotonically in insertion order but are
/// not dense.
pub fn create_tracker_table(conn: &Connection, table: &str) -> Result<(), duckdb::Error> {
    let seq = sequence_name(table);
    conn.execute_batch(&format!(
        "CREATE SEQUENCE IF NOT EXISTS {seq} START 1;
         CREATE TABLE IF NOT EXISTS {table} (
             id           BIGINT PRIMARY KEY DEFAULT nextval('{seq}'),
             page_id      UBIGINT NOT NULL UNIQUE,
             page_url     VARCHAR NOT NULL,
             visit_count  UBIGINT NOT NULL DEFAULT 1,
             last_visited TIMESTAMP NOT NULL
         );"
    ))?;
    Ok(())
}

/// Drop the tracker table and its sequence, discarding all recorded views.
pub fn drop_tracker_table(conn: &Connection, table: &str) -> Result<(), duckdb::Error> {
    let seq = sequence_name(table);
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};
         DROP SEQUENCE IF EXISTS {seq};"
    ))?;
    Ok(())
}

/// Returns `true` if the tracker table exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, duckdb::Error> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?")?;
    let count: i64 = stmt.query_row([table], |row| row.get(0))?;
    Ok(count > 0)
}
