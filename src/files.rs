use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike, Utc};
use futures::{stream, StreamExt};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Executor, Row};
use tracing::warn;

use crate::db::value::read_string;
use crate::db::{self, introspect, SessionGateway};
use crate::error::{mysql_error_number, WorkbenchError};
use crate::models::{FileEntry, SqlFileRecord};

const STORAGE_TABLE: &str = "sql_files";

/// Provisioned on demand inside each target database; idempotent.
const CREATE_STORAGE: &str = "CREATE TABLE IF NOT EXISTS sql_files (\
     id INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
     sql_text TEXT NOT NULL, \
     file_name VARCHAR(255) NOT NULL, \
     created_at DATETIME(6) NOT NULL, \
     modified_at DATETIME(6) NULL)";

const INSERT_FILE: &str =
    "INSERT INTO sql_files (sql_text, file_name, created_at, modified_at) VALUES (?, ?, ?, NULL)";

const UPDATE_FILE: &str =
    "UPDATE sql_files SET sql_text = ?, file_name = ?, modified_at = ? WHERE id = ?";

const SELECT_FILE: &str =
    "SELECT id, sql_text, file_name, created_at, modified_at FROM sql_files WHERE id = ?";

const LIST_FILES: &str = "SELECT id, file_name FROM sql_files";

const STORAGE_EXISTS: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = ? AND table_name = ?";

/// ER_NO_SUCH_TABLE: the storage table was never provisioned there.
const ER_NO_SUCH_TABLE: u16 = 1146;

/// Databases probed at once during the list-all fan-out.
const PROBE_CONCURRENCY: usize = 4;

/// Saved SQL scripts, stored inside the database they belong to.
#[derive(Clone)]
pub struct FileStore {
    gateway: Arc<dyn SessionGateway>,
}

impl FileStore {
    pub fn new(gateway: Arc<dyn SessionGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(
        &self,
        database: &str,
        file_name: &str,
        sql: &str,
    ) -> Result<SqlFileRecord, WorkbenchError> {
        require_field(sql, "SQL file content cannot be empty.")?;
        require_field(file_name, "File name cannot be empty.")?;

        let mut conn = self.gateway.open_session(database).await?;
        let result = insert_file(&mut conn, database, file_name, sql).await;
        db::release(conn).await;
        result
    }

    /// Rewrites content and name, stamping `modified_at`. Zero matched rows
    /// means the file does not exist.
    pub async fn update(
        &self,
        database: &str,
        id: u64,
        file_name: &str,
        sql: &str,
    ) -> Result<u64, WorkbenchError> {
        require_field(sql, "SQL content cannot be empty.")?;
        require_field(database, "Database name is required.")?;

        let mut conn = self.gateway.open_session(database).await?;
        let result = update_file(&mut conn, database, id, file_name, sql).await;
        db::release(conn).await;
        result
    }

    pub async fn get(&self, database: &str, id: u64) -> Result<SqlFileRecord, WorkbenchError> {
        let mut conn = self.gateway.open_session(database).await?;
        let result = fetch_file(&mut conn, database, id).await;
        db::release(conn).await;
        result
    }

    /// Every saved file across every user database. A database that cannot
    /// be probed is skipped with a warning; the rest still list.
    pub async fn list_all(&self) -> Result<Vec<FileEntry>, WorkbenchError> {
        let databases = self.reachable_databases().await?;
        let per_database: Vec<Vec<FileEntry>> = stream::iter(databases)
            .map(|database| {
                let gateway = Arc::clone(&self.gateway);
                async move {
                    match probe_database(gateway.as_ref(), &database).await {
                        Ok(entries) => entries,
                        Err(err) => {
                            warn!(database = %database, error = %err, "skipping database while listing files");
                            Vec::new()
                        }
                    }
                }
            })
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await;
        Ok(per_database.into_iter().flatten().collect())
    }

    async fn reachable_databases(&self) -> Result<Vec<String>, WorkbenchError> {
        let mut conn = self.gateway.open_server_session().await?;
        let result = introspect::fetch_database_names(&mut conn).await;
        db::release(conn).await;
        result
    }
}

fn require_field(value: &str, message: &str) -> Result<(), WorkbenchError> {
    if value.trim().is_empty() {
        return Err(WorkbenchError::Validation(message.into()));
    }
    Ok(())
}

/// `DATETIME(6)` keeps microseconds, so stamp at that precision; otherwise
/// the record handed back on create never equals what a later read returns.
fn storage_now() -> NaiveDateTime {
    truncate_to_micros(Utc::now().naive_utc())
}

fn truncate_to_micros(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(ts.nanosecond() / 1_000 * 1_000).unwrap_or(ts)
}

async fn ensure_storage(conn: &mut MySqlConnection) -> Result<(), WorkbenchError> {
    conn.execute(CREATE_STORAGE)
        .await
        .map_err(WorkbenchError::statement)?;
    Ok(())
}

async fn insert_file(
    conn: &mut MySqlConnection,
    database: &str,
    file_name: &str,
    sql: &str,
) -> Result<SqlFileRecord, WorkbenchError> {
    ensure_storage(conn).await?;
    let created_at = storage_now();
    let done = sqlx::query(INSERT_FILE)
        .bind(sql)
        .bind(file_name)
        .bind(created_at)
        .execute(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    Ok(SqlFileRecord {
        id: done.last_insert_id(),
        database: database.to_string(),
        file_name: file_name.to_string(),
        sql: sql.to_string(),
        created_at,
        modified_at: None,
    })
}

async fn update_file(
    conn: &mut MySqlConnection,
    database: &str,
    id: u64,
    file_name: &str,
    sql: &str,
) -> Result<u64, WorkbenchError> {
    ensure_storage(conn).await?;
    let modified_at = storage_now();
    let done = sqlx::query(UPDATE_FILE)
        .bind(sql)
        .bind(file_name)
        .bind(modified_at)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    if done.rows_affected() == 0 {
        return Err(WorkbenchError::NotFound {
            database: database.to_string(),
            id,
        });
    }
    Ok(done.rows_affected())
}

async fn fetch_file(
    conn: &mut MySqlConnection,
    database: &str,
    id: u64,
) -> Result<SqlFileRecord, WorkbenchError> {
    let row = sqlx::query(SELECT_FILE)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|err| {
            // No storage table at all reads as "no such file".
            if mysql_error_number(&err) == Some(ER_NO_SUCH_TABLE) {
                WorkbenchError::NotFound {
                    database: database.to_string(),
                    id,
                }
            } else {
                WorkbenchError::statement(err)
            }
        })?;
    match row {
        Some(row) => read_file_record(&row, database),
        None => Err(WorkbenchError::NotFound {
            database: database.to_string(),
            id,
        }),
    }
}

fn read_file_record(row: &MySqlRow, database: &str) -> Result<SqlFileRecord, WorkbenchError> {
    Ok(SqlFileRecord {
        id: row.try_get("id").map_err(WorkbenchError::statement)?,
        database: database.to_string(),
        file_name: row.try_get("file_name").map_err(WorkbenchError::statement)?,
        sql: row.try_get("sql_text").map_err(WorkbenchError::statement)?,
        created_at: row.try_get("created_at").map_err(WorkbenchError::statement)?,
        modified_at: row.try_get("modified_at").map_err(WorkbenchError::statement)?,
    })
}

async fn probe_database(
    gateway: &dyn SessionGateway,
    database: &str,
) -> Result<Vec<FileEntry>, WorkbenchError> {
    let mut conn = gateway.open_session(database).await?;
    let result = list_files(&mut conn, database).await;
    db::release(conn).await;
    result
}

async fn list_files(
    conn: &mut MySqlConnection,
    database: &str,
) -> Result<Vec<FileEntry>, WorkbenchError> {
    let present: i64 = sqlx::query_scalar(STORAGE_EXISTS)
        .bind(database)
        .bind(STORAGE_TABLE)
        .fetch_one(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    if present == 0 {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(LIST_FILES)
        .fetch_all(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    rows.iter()
        .map(|row| {
            Ok(FileEntry {
                database: database.to_string(),
                id: row.try_get("id").map_err(WorkbenchError::statement)?,
                file_name: read_string(row, "file_name").unwrap_or_default(),
            })
        })
        .collect()
}
