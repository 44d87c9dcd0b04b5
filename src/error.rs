use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;

/// Failure taxonomy shared by every component boundary.
///
/// `Validation` is rejected before any I/O and never carries a driver code.
/// `Connection` vs `Statement` is positional: whatever fails while opening a
/// session is a connection problem, whatever fails while running SQL is a
/// statement problem.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Connection { message: String, code: Option<u16> },

    #[error("{message}")]
    Statement { message: String, code: Option<u16> },

    #[error("no file with id {id} in database '{database}'")]
    NotFound { database: String, id: u64 },
}

impl WorkbenchError {
    pub fn connection(err: sqlx::Error) -> Self {
        Self::Connection {
            code: mysql_error_number(&err),
            message: describe(&err),
        }
    }

    pub fn statement(err: sqlx::Error) -> Self {
        Self::Statement {
            code: mysql_error_number(&err),
            message: describe(&err),
        }
    }

    /// Native MySQL error number, when the server supplied one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Validation(_) | Self::NotFound { .. } => None,
            Self::Connection { code, .. } | Self::Statement { code, .. } => *code,
        }
    }
}

/// Prefer the server's own message over sqlx's "error returned from
/// database: ..." wrapper.
fn describe(err: &sqlx::Error) -> String {
    match err.as_database_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    }
}

pub(crate) fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .map(|db| db.number())
}
