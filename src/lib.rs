pub mod db;
pub mod error;
pub mod files;
pub mod http;
pub mod models;
pub mod state;

pub use error::WorkbenchError;
pub use models::{ConnectionProfile, Envelope, QueryData, QueryRequest};
pub use state::AppState;
