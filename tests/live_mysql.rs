//! End-to-end tests against a real MySQL server.
//!
//! Ignored by default; run with a disposable server:
//!
//! ```sh
//! SQLDECK_TEST_HOST=127.0.0.1 SQLDECK_TEST_USER=root \
//! SQLDECK_TEST_PASSWORD=secret cargo test -- --ignored
//! ```
//!
//! Each test owns its own scratch database, dropped and recreated on entry,
//! so the suite can run in parallel and leave evidence behind on failure.

use std::env;
use std::sync::Arc;

use sqlx::Executor;

use sqldeck::db::engine::QueryEngine;
use sqldeck::db::introspect::SchemaIntrospector;
use sqldeck::db::{MySqlGateway, SessionGateway};
use sqldeck::files::FileStore;
use sqldeck::models::{
    AffectedSummary, ConnectionProfile, Envelope, Failure, QueryData, QueryRequest, RowSet,
};
use sqldeck::WorkbenchError;

fn profile() -> ConnectionProfile {
    ConnectionProfile {
        host: env::var("SQLDECK_TEST_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
        port: env::var("SQLDECK_TEST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3306),
        user: env::var("SQLDECK_TEST_USER").unwrap_or_else(|_| "root".into()),
        password: env::var("SQLDECK_TEST_PASSWORD").ok(),
    }
}

fn gateway() -> Arc<MySqlGateway> {
    Arc::new(MySqlGateway::new(profile()))
}

async fn reset_database(gateway: &MySqlGateway, name: &str) {
    let mut conn = gateway
        .open_server_session()
        .await
        .expect("server session for setup");
    let drop_sql = format!("DROP DATABASE IF EXISTS {name}");
    conn.execute(drop_sql.as_str()).await.expect("drop database");
    let create_sql = format!("CREATE DATABASE {name}");
    conn.execute(create_sql.as_str()).await.expect("create database");
}

async fn run_in(gateway: &MySqlGateway, database: &str, sql: &str) {
    let mut conn = gateway
        .open_session(database)
        .await
        .expect("session for setup");
    conn.execute(sql).await.expect("setup statement");
}

async fn execute(engine: &QueryEngine, database: &str, sql: &str) -> Envelope<QueryData> {
    engine
        .execute(&QueryRequest {
            sql: sql.into(),
            database: database.into(),
        })
        .await
}

fn expect_rows(outcome: Envelope<QueryData>) -> RowSet {
    match outcome {
        Envelope::Success(QueryData::Rows(rows)) => rows,
        other => panic!("expected rows, got {other:?}"),
    }
}

fn expect_affected(outcome: Envelope<QueryData>) -> AffectedSummary {
    match outcome {
        Envelope::Success(QueryData::Affected(summary)) => summary,
        other => panic!("expected affected summary, got {other:?}"),
    }
}

fn expect_failure(outcome: Envelope<QueryData>) -> Failure {
    match outcome {
        Envelope::Failure(failure) => failure,
        Envelope::Success(data) => panic!("expected failure, got {data:?}"),
    }
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn classification_follows_the_server_not_the_sql_text() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_engine").await;
    let engine = QueryEngine::new(gateway.clone());
    let db = "sqldeck_live_engine";

    let summary = expect_affected(
        execute(&engine, db, "CREATE TABLE items (id INT, name VARCHAR(40))").await,
    );
    assert_eq!(summary.message, "Query executed successfully.");
    assert_eq!(summary.rows_affected, 0);

    let summary = expect_affected(
        execute(
            &engine,
            db,
            "INSERT INTO items VALUES (1, 'ada'), (2, 'brin'), (3, 'cray')",
        )
        .await,
    );
    assert_eq!(summary.rows_affected, 3);

    let rows = expect_rows(execute(&engine, db, "SELECT id, name FROM items WHERE id > 1").await);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], serde_json::json!(2));
    assert_eq!(rows[0]["name"], serde_json::json!("brin"));
    // Column order in each row object follows the select list.
    let keys: Vec<&String> = rows[0].keys().collect();
    assert_eq!(keys, ["id", "name"]);

    // A SELECT matching nothing is still a result set, never a summary.
    let rows = expect_rows(execute(&engine, db, "SELECT id FROM items WHERE id > 100").await);
    assert!(rows.is_empty());

    let summary =
        expect_affected(execute(&engine, db, "UPDATE items SET name = 'x' WHERE id > 0").await);
    assert_eq!(summary.rows_affected, 3);

    // A command touching nothing stays a summary with zero.
    let summary =
        expect_affected(execute(&engine, db, "UPDATE items SET name = 'y' WHERE id > 100").await);
    assert_eq!(summary.rows_affected, 0);
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn failures_carry_the_native_error_code() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_errors").await;
    let engine = QueryEngine::new(gateway.clone());
    let db = "sqldeck_live_errors";

    let failure = expect_failure(execute(&engine, db, "SELEKT 1").await);
    assert_eq!(failure.error_code, Some(1064));
    assert!(!failure.error.is_empty());

    let failure = expect_failure(execute(&engine, db, "SELECT * FROM missing_table").await);
    assert_eq!(failure.error_code, Some(1146));

    // Unknown target database fails while connecting.
    let failure = expect_failure(execute(&engine, "sqldeck_live_absent", "SELECT 1").await);
    assert_eq!(failure.error_code, Some(1049));

    let failure = expect_failure(execute(&engine, db, "   ").await);
    assert_eq!(failure.error, "SQL query cannot be empty.");
    assert_eq!(failure.error_code, None);
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn unpreparable_statements_fall_back_to_the_text_protocol() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_use").await;
    run_in(&gateway, "sqldeck_live_use", "CREATE TABLE notes (id INT)").await;
    let engine = QueryEngine::new(gateway.clone());

    // USE refuses preparation (ER_UNSUPPORTED_PS) and must still succeed.
    let summary =
        expect_affected(execute(&engine, "sqldeck_live_use", "USE sqldeck_live_use").await);
    assert_eq!(summary.message, "Query executed successfully.");

    // CHECK TABLE also refuses preparation, yet answers with a result set.
    let rows = expect_rows(execute(&engine, "sqldeck_live_use", "CHECK TABLE notes").await);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Msg_text"], serde_json::json!("OK"));
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn procedure_calls_return_their_result_sets() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_call").await;
    let db = "sqldeck_live_call";
    run_in(&gateway, db, "CREATE TABLE pets (id INT, name VARCHAR(20))").await;
    run_in(&gateway, db, "INSERT INTO pets VALUES (1, 'rex'), (2, 'milo')").await;
    run_in(
        &gateway,
        db,
        "CREATE PROCEDURE list_pets() SELECT id, name FROM pets ORDER BY id",
    )
    .await;
    run_in(
        &gateway,
        db,
        "CREATE PROCEDURE rename_pets() UPDATE pets SET name = UPPER(name)",
    )
    .await;
    let engine = QueryEngine::new(gateway.clone());

    // CALL reports no columns until it runs; the rows must still come back.
    let rows = expect_rows(execute(&engine, db, "CALL list_pets()").await);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], serde_json::json!(1));
    assert_eq!(rows[0]["name"], serde_json::json!("rex"));

    // A procedure that only writes still reports a summary.
    let summary = expect_affected(execute(&engine, db, "CALL rename_pets()").await);
    assert_eq!(summary.message, "Query executed successfully.");
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn time_and_decimal_cells_survive_shaping() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_values").await;
    let db = "sqldeck_live_values";
    run_in(
        &gateway,
        db,
        "CREATE TABLE spans (label VARCHAR(10), took TIME, cost DECIMAL(8,2))",
    )
    .await;
    run_in(
        &gateway,
        db,
        "INSERT INTO spans VALUES ('back', '-01:30:00', 12.50), ('long', '800:00:00', 0.10)",
    )
    .await;
    let engine = QueryEngine::new(gateway.clone());

    let rows = expect_rows(
        execute(&engine, db, "SELECT label, took, cost FROM spans ORDER BY label").await,
    );
    assert_eq!(rows.len(), 2);
    // TIME is a signed duration; sign and beyond-24h magnitudes survive.
    assert_eq!(rows[0]["took"], serde_json::json!("-01:30:00"));
    assert_eq!(rows[1]["took"], serde_json::json!("800:00:00"));
    assert_eq!(rows[0]["cost"], serde_json::json!("12.50"));
    assert_eq!(rows[1]["cost"], serde_json::json!("0.10"));
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn schema_snapshot_reflects_the_catalog() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_schema").await;
    run_in(
        &gateway,
        "sqldeck_live_schema",
        "CREATE TABLE orders (id INT, placed_at DATETIME, total DECIMAL(10,2))",
    )
    .await;
    run_in(
        &gateway,
        "sqldeck_live_schema",
        "CREATE TABLE customers (id INT, name VARCHAR(50))",
    )
    .await;

    let introspector = SchemaIntrospector::new(gateway.clone());

    let databases = match introspector.list_databases().await {
        Envelope::Success(names) => names,
        Envelope::Failure(failure) => panic!("listing failed: {failure:?}"),
    };
    assert!(databases.iter().any(|name| name == "sqldeck_live_schema"));
    for system in ["information_schema", "mysql", "performance_schema", "sys"] {
        assert!(
            !databases.iter().any(|name| name.eq_ignore_ascii_case(system)),
            "system database {system} leaked into the listing"
        );
    }

    let snapshot = match introspector.get_schema("sqldeck_live_schema").await {
        Envelope::Success(tables) => tables,
        Envelope::Failure(failure) => panic!("snapshot failed: {failure:?}"),
    };
    assert_eq!(snapshot.len(), 2);

    let orders = snapshot
        .iter()
        .find(|table| table.table == "orders")
        .expect("orders table in snapshot");
    let names: Vec<&str> = orders.columns.iter().map(|c| c.column_name.as_str()).collect();
    assert_eq!(names, ["id", "placed_at", "total"]);
    assert_eq!(orders.columns[0].data_type, "int");
    assert_eq!(orders.columns[1].data_type, "datetime");
    assert_eq!(orders.columns[2].data_type, "decimal");
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn procedures_list_by_schema_and_overall() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_procs").await;
    run_in(
        &gateway,
        "sqldeck_live_procs",
        "CREATE PROCEDURE ping_proc() SELECT 1",
    )
    .await;

    let introspector = SchemaIntrospector::new(gateway.clone());

    let narrowed = match introspector.list_procedures(Some("sqldeck_live_procs")).await {
        Envelope::Success(procedures) => procedures,
        Envelope::Failure(failure) => panic!("narrowed listing failed: {failure:?}"),
    };
    assert!(narrowed
        .iter()
        .any(|p| p.schema == "sqldeck_live_procs" && p.name == "ping_proc"));

    let all = match introspector.list_procedures(None).await {
        Envelope::Success(procedures) => procedures,
        Envelope::Failure(failure) => panic!("full listing failed: {failure:?}"),
    };
    assert!(all
        .iter()
        .any(|p| p.schema == "sqldeck_live_procs" && p.name == "ping_proc"));
    // Stock servers ship procedures under `sys`; those stay hidden.
    assert!(!all.iter().any(|p| p.schema.eq_ignore_ascii_case("sys")));
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn file_store_round_trip() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_files").await;
    reset_database(&gateway, "sqldeck_live_files_bare").await;
    let store = FileStore::new(gateway.clone());
    let db = "sqldeck_live_files";

    let record = store
        .create(db, "daily.sql", "SELECT COUNT(*) FROM orders")
        .await
        .expect("create file");
    assert!(record.id > 0);
    assert_eq!(record.database, db);
    assert!(record.modified_at.is_none());

    let fetched = store.get(db, record.id).await.expect("fetch file");
    assert_eq!(fetched.file_name, "daily.sql");
    assert_eq!(fetched.sql, "SELECT COUNT(*) FROM orders");
    assert_eq!(fetched.created_at, record.created_at);
    assert!(fetched.modified_at.is_none());

    let rows_affected = store
        .update(db, record.id, "daily_v2.sql", "SELECT COUNT(*) FROM customers")
        .await
        .expect("update file");
    assert_eq!(rows_affected, 1);

    let edited = store.get(db, record.id).await.expect("fetch after edit");
    assert_eq!(edited.file_name, "daily_v2.sql");
    assert_eq!(edited.sql, "SELECT COUNT(*) FROM customers");
    let modified_at = edited.modified_at.expect("edit stamps modified_at");
    assert!(modified_at > edited.created_at);

    let err = store
        .update(db, record.id + 9999, "ghost.sql", "SELECT 1")
        .await
        .expect_err("unknown id must not update");
    assert!(matches!(err, WorkbenchError::NotFound { .. }));

    let err = store
        .get(db, record.id + 9999)
        .await
        .expect_err("unknown id must not fetch");
    assert!(matches!(err, WorkbenchError::NotFound { .. }));

    // A database that never stored anything has no table; still NotFound.
    let err = store
        .get("sqldeck_live_files_bare", 1)
        .await
        .expect_err("bare database has no files");
    assert!(matches!(err, WorkbenchError::NotFound { .. }));
}

#[tokio::test]
#[ignore = "needs a live MySQL server"]
async fn list_all_aggregates_across_databases() {
    let gateway = gateway();
    reset_database(&gateway, "sqldeck_live_list_a").await;
    reset_database(&gateway, "sqldeck_live_list_b").await;
    reset_database(&gateway, "sqldeck_live_list_bare").await;
    let store = FileStore::new(gateway.clone());

    let first = store
        .create("sqldeck_live_list_a", "alpha.sql", "SELECT 1")
        .await
        .expect("create in a");
    let second = store
        .create("sqldeck_live_list_b", "beta.sql", "SELECT 2")
        .await
        .expect("create in b");

    let entries = store.list_all().await.expect("list all files");
    assert!(entries
        .iter()
        .any(|e| e.database == "sqldeck_live_list_a"
            && e.id == first.id
            && e.file_name == "alpha.sql"));
    assert!(entries
        .iter()
        .any(|e| e.database == "sqldeck_live_list_b"
            && e.id == second.id
            && e.file_name == "beta.sql"));
    // The bare database has no storage table and contributes nothing.
    assert!(!entries.iter().any(|e| e.database == "sqldeck_live_list_bare"));
}
