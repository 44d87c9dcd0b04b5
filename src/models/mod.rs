use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::WorkbenchError;

/// Where and how to reach the MySQL server. Fixed at startup; every call
/// derives its own short-lived connection from this.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub sql: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub database: String,
    pub file_name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub file_name: String,
    pub sql: String,
}

/// Uniform outcome wrapper: success with data, or failure with a message and
/// the server's native error code when one exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error: String,
    pub error_code: Option<u16>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self::Success(data)
    }

    pub fn failure(error: impl Into<String>, error_code: Option<u16>) -> Self {
        Self::Failure(Failure {
            error: error.into(),
            error_code,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<T> From<Result<T, WorkbenchError>> for Envelope<T> {
    fn from(result: Result<T, WorkbenchError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Failure(Failure {
                error_code: err.code(),
                error: err.to_string(),
            }),
        }
    }
}

/// Rows in arrival order, each keyed by column name in select-list order.
pub type RowSet = Vec<serde_json::Map<String, serde_json::Value>>;

/// What a statement produced: a result set, or an affected-count
/// acknowledgement. Serializes as the bare array or the bare summary object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    Rows(RowSet),
    Affected(AffectedSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedSummary {
    pub message: String,
    pub rows_affected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProcedure {
    pub schema: String,
    pub name: String,
}

/// A saved script with full content and both timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlFileRecord {
    pub id: u64,
    pub database: String,
    pub file_name: String,
    pub sql: String,
    pub created_at: NaiveDateTime,
    pub modified_at: Option<NaiveDateTime>,
}

/// Listing entry: enough to locate a file, without its content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub database: String,
    pub id: u64,
    pub file_name: String,
}
