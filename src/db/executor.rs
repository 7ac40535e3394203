//! Query execution against a pooled session.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

use super::models::{Cell, ColumnInfo, ColumnKind, ResultSet};
use super::session::Session;
use crate::error::Error;

/// Run a statement and decode the full result set.
///
/// The fetch is bounded by `timeout`; the reference design had no deadline
/// on a potentially long-running report query. A query failure logs the
/// offending SQL and surfaces as an error, never as a zero-row table.
pub async fn execute(session: &Session, sql: &str, timeout: Duration) -> Result<ResultSet, Error> {
    let server = session.spec().name.clone();

    let fetched = tokio::time::timeout(timeout, sqlx::query(sql).fetch_all(session.pool()))
        .await
        .map_err(|_| {
            tracing::error!(logical_server = %server, query = %sql, "query deadline exceeded");
            Error::QueryTimeout {
                server: server.clone(),
                timeout_secs: timeout.as_secs(),
            }
        })?;

    let rows = fetched.map_err(|source| {
        tracing::error!(logical_server = %server, query = %sql, error = %source, "query failed");
        Error::Query {
            server: server.clone(),
            source,
        }
    })?;

    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };

    let columns: Vec<ColumnInfo> = first
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            kind: classify(c.type_info().name()),
        })
        .collect();

    let mut data = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(columns.len());
        for (index, column) in row.columns().iter().enumerate() {
            cells.push(decode_cell(row, index, column.type_info().name()).map_err(|source| {
                Error::Query {
                    server: server.clone(),
                    source,
                }
            })?);
        }
        data.push(cells);
    }

    tracing::debug!(logical_server = %server, rows = data.len(), "query returned");

    Ok(ResultSet {
        columns,
        rows: data,
    })
}

/// Map a driver-reported Postgres type name onto a column kind, once per
/// column. Types without a numeric or boolean reading are kept as text.
fn classify(type_name: &str) -> ColumnKind {
    match type_name {
        "INT2" | "INT4" | "INT8" => ColumnKind::Int,
        "FLOAT4" | "FLOAT8" => ColumnKind::Float,
        "BOOL" => ColumnKind::Bool,
        _ => ColumnKind::Text,
    }
}

fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> Result<Cell, sqlx::Error> {
    let cell = match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| Cell::Int(v as i64)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| Cell::Int(v as i64)),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Cell::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Cell::Float(v as f64)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Cell::Float),
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Cell::Bool),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|v| Cell::Text(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|v| Cell::Text(v.format("%Y-%m-%d %H:%M:%S%z").to_string())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|v| Cell::Text(v.format("%Y-%m-%d").to_string())),
        _ => row.try_get::<Option<String>, _>(index)?.map(Cell::Text),
    };

    Ok(cell.unwrap_or(Cell::Null))
}
