use std::sync::Arc;

use crate::db::engine::QueryEngine;
use crate::db::introspect::SchemaIntrospector;
use crate::db::{MySqlGateway, SessionGateway};
use crate::files::FileStore;
use crate::models::ConnectionProfile;

/// Shared handles for the HTTP layer. Every component draws short-lived
/// sessions from the same gateway; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    pub introspector: SchemaIntrospector,
    pub files: FileStore,
}

impl AppState {
    pub fn new(profile: ConnectionProfile) -> Self {
        Self::with_gateway(Arc::new(MySqlGateway::new(profile)))
    }

    pub fn with_gateway(gateway: Arc<dyn SessionGateway>) -> Self {
        Self {
            engine: QueryEngine::new(Arc::clone(&gateway)),
            introspector: SchemaIntrospector::new(Arc::clone(&gateway)),
            files: FileStore::new(gateway),
        }
    }
}
