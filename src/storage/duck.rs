use crate::storage::schema;
use crate::storage::store::{
    parse_timestamp, PageVisitRecord, StoreError, VisitStore, TIMESTAMP_FORMAT,
};
use chrono::NaiveDateTime;
use duckdb::Connection;
use parking_lot::Mutex;
use std::sync::Arc;

const SELECT_COLUMNS: &str =
    "id, page_id, page_url, visit_count, strftime(last_visited, '%Y-%m-%d %H:%M:%S')";

type RawRow = (i64, u64, String, u64, String);

/// [`VisitStore`] backed by a single shared DuckDB connection.
///
/// Each call holds the connection lock for the existence check and one
/// statement, so increments from concurrent requests never interleave.
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl DuckDbStore {
    /// `table` must already be validated (see [`schema::is_valid_prefix`]).
    pub fn new(conn: Arc<Mutex<Connection>>, table: String) -> Self {
        Self { conn, table }
    }

    fn ensure_table(&self, conn: &Connection) -> Result<(), StoreError> {
        if schema::table_exists(conn, &self.table)? {
            Ok(())
        } else {
            Err(StoreError::MissingTable(self.table.clone()))
        }
    }

    fn query_records<P: duckdb::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<PageVisitRecord>, StoreError> {
        let conn = self.conn.lock();
        self.ensure_table(&conn)?;

        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        raw.into_iter().map(into_record).collect()
    }
}

fn raw_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_record(
    (id, page_id, page_url, visit_count, last_visited): RawRow,
) -> Result<PageVisitRecord, StoreError> {
    Ok(PageVisitRecord {
        id,
        page_id,
        page_url,
        visit_count,
        last_visited: parse_timestamp(&last_visited)?,
    })
}

impl VisitStore for DuckDbStore {
    fn table(&self) -> &str {
        &self.table
    }

    fn activate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        schema::create_tracker_table(&conn, &self.table)?;
        Ok(())
    }

    fn deactivate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        schema::drop_tracker_table(&conn, &self.table)?;
        Ok(())
    }

    fn is_active(&self) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        Ok(schema::table_exists(&conn, &self.table)?)
    }

    fn record_visit(
        &self,
        page_id: u64,
        page_url: &str,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let table = &self.table;
        let conn = self.conn.lock();
        self.ensure_table(&conn)?;

        // page_url is kept from the first view; only the counter and timestamp move.
        conn.execute(
            &format!(
                "INSERT INTO {table} (page_id, page_url, visit_count, last_visited)
                 VALUES (?, ?, 1, CAST(? AS TIMESTAMP))
                 ON CONFLICT (page_id) DO UPDATE SET
                     visit_count = visit_count + 1,
                     last_visited = EXCLUDED.last_visited"
            ),
            duckdb::params![page_id, page_url, at.format(TIMESTAMP_FORMAT).to_string()],
        )?;
        Ok(())
    }

    fn find(&self, page_id: u64) -> Result<Option<PageVisitRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {} WHERE page_id = ?", self.table);
        Ok(self.query_records(&sql, [page_id])?.into_iter().next())
    }

    fn top_pages(&self, limit: u64) -> Result<Vec<PageVisitRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {}
             ORDER BY visit_count DESC, page_id ASC
             LIMIT ?",
            self.table
        );
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_records(&sql, [limit_i64])
    }

    fn tracked_pages(&self) -> Result<Vec<PageVisitRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {} ORDER BY id", self.table);
        self.query_records(&sql, [])
    }

    fn visits_between(
        &self,
        page_id: u64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PageVisitRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {}
             WHERE page_id = ?
               AND last_visited BETWEEN CAST(? AS TIMESTAMP) AND CAST(? AS TIMESTAMP)
             ORDER BY last_visited",
            self.table
        );
        self.query_records(
            &sql,
            duckdb::params![
                page_id,
                start.format(TIMESTAMP_FORMAT).to_string(),
                end.format(TIMESTAMP_FORMAT).to_string()
            ],
        )
    }
}
