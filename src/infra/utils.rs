use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{postgres::PgRow, Column, Row, TypeInfo};
use uuid::Uuid;

// 按列顺序把一行转成 JSON 值，类型按数据库原生类型名分派
pub fn pg_row_values(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|col| {
            let idx = col.ordinal();
            match col.type_info().name() {
                "INT2" => json!(row.try_get::<Option<i16>, _>(idx).unwrap_or(None)),
                "INT4" => json!(row.try_get::<Option<i32>, _>(idx).unwrap_or(None)),
                "INT8" => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
                "FLOAT4" => json!(row.try_get::<Option<f32>, _>(idx).unwrap_or(None)),
                "FLOAT8" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
                "NUMERIC" => {
                    // SUM(int) 在 Postgres 中返回 NUMERIC
                    let v: Option<rust_decimal::Decimal> = row.try_get(idx).unwrap_or(None);
                    json!(v.and_then(|d| d.to_f64()))
                }
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
                "BOOL" => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
                "DATE" => json!(row.try_get::<Option<NaiveDate>, _>(idx).unwrap_or(None).map(|d| d.to_string())),
                "TIMESTAMP" => {
                    json!(row.try_get::<Option<NaiveDateTime>, _>(idx).unwrap_or(None).map(|dt| dt.to_string()))
                }
                "TIMESTAMPTZ" => {
                    json!(row.try_get::<Option<DateTime<Utc>>, _>(idx).unwrap_or(None).map(|dt| dt.to_rfc3339()))
                }
                "UUID" => json!(row.try_get::<Option<Uuid>, _>(idx).unwrap_or(None).map(|u| u.to_string())),
                "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx).unwrap_or(None).unwrap_or(Value::Null),
                // 未知类型尝试按字符串读取
                _ => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
            }
        })
        .collect()
}

pub fn mysql_row_values(row: &MySqlRow) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|col| {
            let idx = col.ordinal();
            match col.type_info().name() {
                "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" => {
                    json!(row.try_get::<Option<i32>, _>(idx).unwrap_or(None))
                }
                "BIGINT" => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
                "FLOAT" | "DOUBLE" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
                "DECIMAL" | "NEWDECIMAL" => {
                    let v: Option<rust_decimal::Decimal> = row.try_get(idx).unwrap_or(None);
                    json!(v.and_then(|d| d.to_f64()))
                }
                "CHAR" | "VARCHAR" | "TEXT" | "LONGTEXT" => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
                "DATE" => json!(row.try_get::<Option<NaiveDate>, _>(idx).unwrap_or(None).map(|d| d.to_string())),
                "DATETIME" | "TIMESTAMP" => {
                    json!(row.try_get::<Option<NaiveDateTime>, _>(idx).unwrap_or(None).map(|dt| dt.to_string()))
                }
                "JSON" => row.try_get::<Option<Value>, _>(idx).unwrap_or(None).unwrap_or(Value::Null),
                _ => json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None)),
            }
        })
        .collect()
}
