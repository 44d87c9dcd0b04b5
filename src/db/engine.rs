use std::sync::Arc;

use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, Either, Executor, Row, Statement};
use tracing::debug;

use crate::db::value::decode_cell;
use crate::db::{self, SessionGateway};
use crate::error::{mysql_error_number, WorkbenchError};
use crate::models::{AffectedSummary, Envelope, QueryData, QueryRequest, RowSet};

const EMPTY_SQL: &str = "SQL query cannot be empty.";
const EXECUTED: &str = "Query executed successfully.";

/// ER_UNSUPPORTED_PS: the statement cannot go through the prepared protocol.
const ER_UNSUPPORTED_PS: u16 = 1295;

/// Runs arbitrary SQL against a caller-chosen database and folds every
/// outcome into the uniform envelope.
#[derive(Clone)]
pub struct QueryEngine {
    gateway: Arc<dyn SessionGateway>,
}

impl QueryEngine {
    pub fn new(gateway: Arc<dyn SessionGateway>) -> Self {
        Self { gateway }
    }

    pub async fn execute(&self, request: &QueryRequest) -> Envelope<QueryData> {
        let sql = request.sql.trim();
        if sql.is_empty() {
            // Rejected before any session is opened.
            return Envelope::failure(EMPTY_SQL, None);
        }
        self.run(sql, &request.database).await.into()
    }

    async fn run(&self, sql: &str, database: &str) -> Result<QueryData, WorkbenchError> {
        let mut conn = self.gateway.open_session(database).await?;
        let outcome = run_statement(&mut conn, sql).await;
        db::release(conn).await;
        outcome
    }
}

/// The server, not the SQL text, decides what a statement is. Prepared
/// metadata with columns settles it outright, so a SELECT that matches
/// nothing still comes back as an empty row set. Metadata without columns
/// settles nothing: CALL reports zero columns at prepare time even when the
/// procedure body selects, so those statements and the unpreparable ones run
/// through the multi-result stream and are classified by what arrives. Each
/// statement executes exactly once; preparing runs nothing.
async fn run_statement(
    conn: &mut MySqlConnection,
    sql: &str,
) -> Result<QueryData, WorkbenchError> {
    match conn.prepare(sql).await {
        Ok(statement) if !statement.columns().is_empty() => {
            let rows = statement
                .query()
                .fetch_all(&mut *conn)
                .await
                .map_err(WorkbenchError::statement)?;
            debug!(rows = rows.len(), "statement produced a result set");
            Ok(QueryData::Rows(shape_rows(&rows)))
        }
        Ok(_) => run_streamed(conn, sql).await,
        Err(err) if mysql_error_number(&err) == Some(ER_UNSUPPORTED_PS) => {
            // USE, CHECK TABLE and friends refuse preparation outright.
            run_streamed(conn, sql).await
        }
        Err(err) => Err(WorkbenchError::statement(err)),
    }
}

/// Text-protocol execution classified by what the server sends back: any
/// row makes the outcome a result set (column metadata rides along at
/// execution time), otherwise the terminal OK packet's affected count
/// stands. One round trip either way.
async fn run_streamed(
    conn: &mut MySqlConnection,
    sql: &str,
) -> Result<QueryData, WorkbenchError> {
    let mut stream = conn.fetch_many(sql);
    let mut rows = RowSet::new();
    let mut rows_affected = 0;
    while let Some(step) = stream
        .try_next()
        .await
        .map_err(WorkbenchError::statement)?
    {
        match step {
            Either::Left(done) => rows_affected = done.rows_affected(),
            Either::Right(row) => rows.push(shape_row(&row)),
        }
    }
    if rows.is_empty() {
        debug!(rows_affected, "statement executed");
        Ok(affected(rows_affected))
    } else {
        debug!(rows = rows.len(), "statement streamed a result set");
        Ok(QueryData::Rows(rows))
    }
}

fn affected(rows_affected: u64) -> QueryData {
    QueryData::Affected(AffectedSummary {
        message: EXECUTED.into(),
        rows_affected,
    })
}

fn shape_rows(rows: &[MySqlRow]) -> RowSet {
    rows.iter().map(shape_row).collect()
}

fn shape_row(row: &MySqlRow) -> serde_json::Map<String, serde_json::Value> {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), decode_cell(row, index));
    }
    object
}
