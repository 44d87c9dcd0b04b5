use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::MySqlRow;
use sqlx::{Row, TypeInfo, ValueRef};

/// Maps one cell to JSON by the server-reported column type. Numbers stay
/// numeric, DECIMAL and temporal values become strings to avoid precision
/// loss, NULL is null regardless of type.
pub(crate) fn decode_cell(row: &MySqlRow, index: usize) -> serde_json::Value {
    let value_ref = match row.try_get_raw(index) {
        Ok(v) => v,
        Err(_) => return serde_json::Value::Null,
    };

    if value_ref.is_null() {
        return serde_json::Value::Null;
    }

    let type_info = value_ref.type_info();
    let type_name = type_info.name();

    match type_name {
        "BOOLEAN" => {
            let v: Option<bool> = row.try_get(index).ok();
            if v.is_some() {
                return serde_json::json!(v);
            }
            let v: Option<i64> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            let v: Option<i64> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" | "BIT" => {
            let v: Option<u64> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "FLOAT" => {
            let v: Option<f32> = row.try_get(index).ok();
            serde_json::json!(v.map(f64::from))
        }
        "DOUBLE" => {
            let v: Option<f64> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "DECIMAL" => {
            let v: Option<BigDecimal> = row.try_get(index).ok();
            serde_json::json!(v.map(|d| d.to_string()))
        }
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            let v: Option<String> = row.try_get(index).ok();
            serde_json::json!(v)
        }
        "DATE" => {
            let v: Option<NaiveDate> = row.try_get(index).ok();
            serde_json::json!(v.map(|d| d.to_string()))
        }
        "TIME" => {
            // A signed duration up to 838 hours either way, not a time of
            // day; MySqlTime is the only decode that keeps sign and overflow.
            let v: Option<MySqlTime> = row.try_get(index).ok();
            serde_json::json!(v.map(|t| t.to_string()))
        }
        "DATETIME" => {
            let v: Option<NaiveDateTime> = row.try_get(index).ok();
            serde_json::json!(v.map(|t| t.to_string()))
        }
        "TIMESTAMP" => {
            let v: Option<DateTime<Utc>> = row.try_get(index).ok();
            if let Some(t) = v {
                return serde_json::json!(t.to_string());
            }
            let v: Option<NaiveDateTime> = row.try_get(index).ok();
            serde_json::json!(v.map(|t| t.to_string()))
        }
        "JSON" => {
            let v: Option<serde_json::Value> = row.try_get(index).ok();
            v.unwrap_or(serde_json::Value::Null)
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
            match row.try_get::<Vec<u8>, _>(index) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(s) => serde_json::Value::String(s),
                    Err(e) => serde_json::Value::String(format!("<{} bytes>", e.as_bytes().len())),
                },
                Err(_) => serde_json::Value::String(format!("<{}>", type_name)),
            }
        }
        _ => {
            let v: Option<String> = row.try_get(index).ok();
            if let Some(s) = v {
                return serde_json::Value::String(s);
            }
            let v: Option<Vec<u8>> = row.try_get(index).ok();
            if let Some(bytes) = v {
                if let Ok(s) = String::from_utf8(bytes) {
                    return serde_json::Value::String(s);
                }
            }
            serde_json::Value::String(format!("<{}>", type_name))
        }
    }
}

/// Catalog columns arrive as VARBINARY on some server charsets; accept either
/// text or raw UTF-8 bytes.
pub(crate) fn read_string(row: &MySqlRow, column: &str) -> Option<String> {
    if let Ok(text) = row.try_get::<String, _>(column) {
        return Some(text);
    }
    row.try_get::<Vec<u8>, _>(column)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
