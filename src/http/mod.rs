//! HTTP surface. Handlers stay thin: parse the request, call one component,
//! map the outcome to a status and body.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::WorkbenchError;
use crate::models::{
    CreateFileRequest, Envelope, Failure, QueryRequest, UpdateFileRequest,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/query/execute", post(execute_query))
        .route("/api/query/databases", get(list_databases))
        .route("/api/query/schema", get(get_schema))
        .route("/api/query/procedures", get(list_procedures))
        .route("/api/files", post(create_file).get(list_files))
        .route(
            "/api/files/{database}/{id}",
            get(get_file).patch(update_file),
        )
        .with_state(state)
}

async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    envelope_response(state.engine.execute(&request).await)
}

async fn list_databases(State(state): State<AppState>) -> Response {
    envelope_response(state.introspector.list_databases().await)
}

#[derive(Deserialize)]
struct SchemaParams {
    database: String,
}

async fn get_schema(
    State(state): State<AppState>,
    Query(params): Query<SchemaParams>,
) -> Response {
    envelope_response(state.introspector.get_schema(&params.database).await)
}

#[derive(Deserialize)]
struct ProcedureParams {
    database: Option<String>,
}

async fn list_procedures(
    State(state): State<AppState>,
    Query(params): Query<ProcedureParams>,
) -> Response {
    envelope_response(
        state
            .introspector
            .list_procedures(params.database.as_deref())
            .await,
    )
}

async fn create_file(
    State(state): State<AppState>,
    Json(request): Json<CreateFileRequest>,
) -> Response {
    store_response(
        state
            .files
            .create(&request.database, &request.file_name, &request.sql)
            .await,
    )
}

async fn list_files(State(state): State<AppState>) -> Response {
    store_response(state.files.list_all().await)
}

async fn get_file(
    State(state): State<AppState>,
    Path((database, id)): Path<(String, u64)>,
) -> Response {
    store_response(state.files.get(&database, id).await)
}

async fn update_file(
    State(state): State<AppState>,
    Path((database, id)): Path<(String, u64)>,
    Json(request): Json<UpdateFileRequest>,
) -> Response {
    store_response(
        state
            .files
            .update(&database, id, &request.file_name, &request.sql)
            .await
            .map(|rows_affected| json!({ "rowsAffected": rows_affected })),
    )
}

/// Success is 200 with the bare data; failure is 400 with the failure body.
fn envelope_response<T: serde::Serialize>(envelope: Envelope<T>) -> Response {
    match envelope {
        Envelope::Success(data) => (StatusCode::OK, Json(data)).into_response(),
        Envelope::Failure(failure) => failure_response(StatusCode::BAD_REQUEST, failure),
    }
}

/// Store results keep their error variants, so a missing file can map to 404
/// instead of the generic 400.
fn store_response<T: serde::Serialize>(result: Result<T, WorkbenchError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(err) => {
            let status = match &err {
                WorkbenchError::NotFound { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            failure_response(
                status,
                Failure {
                    error_code: err.code(),
                    error: err.to_string(),
                },
            )
        }
    }
}

fn failure_response(status: StatusCode, failure: Failure) -> Response {
    (status, Json(failure)).into_response()
}
