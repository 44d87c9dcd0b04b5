use std::sync::Arc;

use sqlx::mysql::MySqlConnection;
use tracing::debug;

use crate::db::value::read_string;
use crate::db::{self, SessionGateway};
use crate::error::WorkbenchError;
use crate::models::{ColumnDescriptor, Envelope, StoredProcedure, TableDescriptor};

/// Server-owned schemas, never surfaced to the user.
const SYSTEM_DATABASES: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

const DATABASE_NAMES: &str = "SELECT schema_name AS name FROM information_schema.schemata";

const TABLE_NAMES: &str = "SELECT table_name AS name \
     FROM information_schema.tables WHERE table_schema = ?";

const TABLE_COLUMNS: &str = "SELECT table_name AS table_name, column_name AS name, data_type AS data_type \
     FROM information_schema.columns WHERE table_schema = ? \
     ORDER BY table_name, ordinal_position";

const ALL_PROCEDURES: &str = "SELECT routine_schema AS schema_name, routine_name AS name \
     FROM information_schema.routines WHERE routine_type = 'PROCEDURE'";

const PROCEDURES_IN_SCHEMA: &str = "SELECT routine_schema AS schema_name, routine_name AS name \
     FROM information_schema.routines WHERE routine_type = 'PROCEDURE' AND routine_schema = ?";

/// Read-only view over the server catalog. Results reflect the catalog at
/// call time; nothing is cached.
#[derive(Clone)]
pub struct SchemaIntrospector {
    gateway: Arc<dyn SessionGateway>,
}

impl SchemaIntrospector {
    pub fn new(gateway: Arc<dyn SessionGateway>) -> Self {
        Self { gateway }
    }

    /// Every user database on the server, in catalog order.
    pub async fn list_databases(&self) -> Envelope<Vec<String>> {
        self.fetch_databases().await.into()
    }

    /// Tables of one database with their columns in ordinal order.
    pub async fn get_schema(&self, database: &str) -> Envelope<Vec<TableDescriptor>> {
        self.fetch_schema(database).await.into()
    }

    /// Stored procedures, optionally narrowed to one database.
    pub async fn list_procedures(&self, database: Option<&str>) -> Envelope<Vec<StoredProcedure>> {
        self.fetch_procedures(database).await.into()
    }

    async fn fetch_databases(&self) -> Result<Vec<String>, WorkbenchError> {
        let mut conn = self.gateway.open_server_session().await?;
        let result = fetch_database_names(&mut conn).await;
        db::release(conn).await;
        result
    }

    async fn fetch_schema(&self, database: &str) -> Result<Vec<TableDescriptor>, WorkbenchError> {
        if database.trim().is_empty() {
            return Err(WorkbenchError::Validation(
                "Database name is required.".into(),
            ));
        }
        let mut conn = self.gateway.open_session(database).await?;
        let result = fetch_snapshot(&mut conn, database).await;
        db::release(conn).await;
        result
    }

    async fn fetch_procedures(
        &self,
        database: Option<&str>,
    ) -> Result<Vec<StoredProcedure>, WorkbenchError> {
        let mut conn = self.gateway.open_server_session().await?;
        let result = fetch_procedure_names(&mut conn, database).await;
        db::release(conn).await;
        result
    }
}

/// Shared with the file store, which probes the same database list.
pub(crate) async fn fetch_database_names(
    conn: &mut MySqlConnection,
) -> Result<Vec<String>, WorkbenchError> {
    let rows = sqlx::query(DATABASE_NAMES)
        .fetch_all(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    let names = rows
        .iter()
        .filter_map(|row| read_string(row, "name"))
        .collect();
    Ok(filter_system_databases(names))
}

async fn fetch_snapshot(
    conn: &mut MySqlConnection,
    database: &str,
) -> Result<Vec<TableDescriptor>, WorkbenchError> {
    let table_rows = sqlx::query(TABLE_NAMES)
        .bind(database)
        .fetch_all(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    let tables: Vec<String> = table_rows
        .iter()
        .filter_map(|row| read_string(row, "name"))
        .collect();

    let column_rows = sqlx::query(TABLE_COLUMNS)
        .bind(database)
        .fetch_all(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    let columns: Vec<(String, String, String)> = column_rows
        .iter()
        .filter_map(|row| {
            Some((
                read_string(row, "table_name")?,
                read_string(row, "name")?,
                read_string(row, "data_type")?,
            ))
        })
        .collect();

    debug!(
        database = %database,
        tables = tables.len(),
        columns = columns.len(),
        "loaded schema snapshot"
    );
    Ok(build_snapshot(tables, &columns))
}

async fn fetch_procedure_names(
    conn: &mut MySqlConnection,
    database: Option<&str>,
) -> Result<Vec<StoredProcedure>, WorkbenchError> {
    let query = match database {
        Some(schema) => sqlx::query(PROCEDURES_IN_SCHEMA).bind(schema),
        None => sqlx::query(ALL_PROCEDURES),
    };
    let rows = query
        .fetch_all(&mut *conn)
        .await
        .map_err(WorkbenchError::statement)?;
    let procedures = rows
        .iter()
        .filter_map(|row| {
            Some(StoredProcedure {
                schema: read_string(row, "schema_name")?,
                name: read_string(row, "name")?,
            })
        })
        .filter(|procedure| !is_system_database(&procedure.schema))
        .collect();
    Ok(procedures)
}

pub(crate) fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES
        .iter()
        .any(|sys| name.eq_ignore_ascii_case(sys))
}

fn filter_system_databases(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !is_system_database(name))
        .collect()
}

/// Joins the table list with its columns. Tables keep catalog order, columns
/// keep ordinal order; a table with no readable columns still appears.
fn build_snapshot(
    tables: Vec<String>,
    columns: &[(String, String, String)],
) -> Vec<TableDescriptor> {
    tables
        .into_iter()
        .map(|table| {
            let table_columns = columns
                .iter()
                .filter(|(owner, _, _)| *owner == table)
                .map(|(_, name, data_type)| ColumnDescriptor {
                    column_name: name.clone(),
                    data_type: data_type.clone(),
                })
                .collect();
            TableDescriptor {
                table,
                columns: table_columns,
            }
        })
        .collect()
}
