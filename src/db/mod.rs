use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;

use crate::error::WorkbenchError;
use crate::models::ConnectionProfile;

pub mod engine;
pub mod introspect;
pub mod value;

/// Hands out short-lived connections. Nothing is pooled or cached; each call
/// opens against the profile fixed at startup and the caller drops the
/// session when done.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Session with the given database selected as the default schema.
    async fn open_session(&self, database: &str) -> Result<MySqlConnection, WorkbenchError>;

    /// Server-level session with no default schema, for catalog work.
    async fn open_server_session(&self) -> Result<MySqlConnection, WorkbenchError>;
}

pub struct MySqlGateway {
    profile: ConnectionProfile,
}

impl MySqlGateway {
    pub fn new(profile: ConnectionProfile) -> Self {
        Self { profile }
    }

    fn base_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.profile.host)
            .port(self.profile.port)
            .username(&self.profile.user);
        if let Some(password) = &self.profile.password {
            options = options.password(password);
        }
        options
    }
}

#[async_trait]
impl SessionGateway for MySqlGateway {
    async fn open_session(&self, database: &str) -> Result<MySqlConnection, WorkbenchError> {
        let options = self.base_options().database(database);
        MySqlConnection::connect_with(&options)
            .await
            .map_err(WorkbenchError::connection)
    }

    async fn open_server_session(&self) -> Result<MySqlConnection, WorkbenchError> {
        MySqlConnection::connect_with(&self.base_options())
            .await
            .map_err(WorkbenchError::connection)
    }
}

/// Best-effort graceful close; the socket drops either way.
pub(crate) async fn release(conn: MySqlConnection) {
    let _ = conn.close().await;
}
