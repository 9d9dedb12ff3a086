//! The concrete [`GuestApi`] backed by a live Postgres transaction
//! (spec.md §4.8, §9). This is the only piece of the pipeline that ever
//! touches `sqlx` row/column machinery directly.

use async_trait::async_trait;
use chainproc_db::{check_guest_query, classify, translate_legacy_call, DbError, LegacyAction, LegacyCall};
use chainproc_runtime::{GuestApi, LegacyQuery, QueryError, QueryOutcome, QueryParam, QueryRow, QueryValue};
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, Either, PgConnection, Row, TypeInfo};

pub struct SqlGuestApi<'a> {
    conn: &'a mut PgConnection,
    contract_hash: [u8; 32],
    reserved: bool,
    reject_reason: Option<String>,
    fast_queue: Vec<(String, Vec<QueryParam>)>,
    fatal: Option<DbError>,
}

impl<'a> SqlGuestApi<'a> {
    pub fn new(conn: &'a mut PgConnection, contract_hash: [u8; 32], reserved: bool) -> Self {
        Self { conn, contract_hash, reserved, reject_reason: None, fast_queue: Vec::new(), fatal: None }
    }

    pub fn take_reject_reason(&mut self) -> Option<String> {
        self.reject_reason.take()
    }

    pub fn take_fatal(&mut self) -> Option<DbError> {
        self.fatal.take()
    }

    /// Run every query queued via [`GuestApi::query_fast`], FIFO, stopping
    /// at the first unrecoverable fault (spec.md §5: drained at Finishing,
    /// before `process_tx` returns).
    pub async fn drain_fast_queries(&mut self) -> Result<(), DbError> {
        let queued = std::mem::take(&mut self.fast_queue);
        for (sql, params) in queued {
            run(self.conn, &sql, &params).await.map(|_| ())?;
        }
        Ok(())
    }

    async fn run_guest_query(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<QueryOutcome, QueryError> {
        let normalised = check_guest_query(sql, self.reserved)?;
        self.execute(&normalised, params).await
    }

    async fn execute(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<QueryOutcome, QueryError> {
        match run(self.conn, sql, &params).await {
            Ok((rows, row_count)) => Ok(QueryOutcome { rows, row_count }),
            Err(DbError::Constraint { message, .. }) => Err(QueryError::Constraint(message)),
            Err(other) => {
                self.fatal = Some(other);
                Err(QueryError::InvalidQuery("database error".to_string()))
            }
        }
    }
}

#[async_trait]
impl<'a> GuestApi for SqlGuestApi<'a> {
    fn reject(&mut self, reason: String) {
        if self.reject_reason.is_none() {
            self.reject_reason = Some(reason);
        }
    }

    async fn query(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<QueryOutcome, QueryError> {
        self.run_guest_query(sql, params).await
    }

    async fn query_fast(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<(), QueryError> {
        let normalised = check_guest_query(sql, self.reserved)?;
        self.fast_queue.push((normalised, params));
        Ok(())
    }

    async fn query_legacy(&mut self, call: LegacyQuery) -> Result<QueryOutcome, QueryError> {
        let action = LegacyAction::parse(&call.action)
            .ok_or_else(|| QueryError::InvalidQuery(format!("unknown legacy action: {}", call.action)))?;
        let legacy =
            LegacyCall { action, table: call.table, info: call.info, params: call.params, use_private: call.use_private };
        let (sql, params) = translate_legacy_call(&legacy, &self.contract_hash);
        let normalised = check_guest_query(&sql, self.reserved)?;
        self.execute(&normalised, params).await
    }
}

/// Runs `sql` to completion, collecting every selected row alongside the
/// engine's affected-row count (read off the command-complete tag via
/// `fetch_many` rather than `fetch_all`, since a plain `UPDATE`/`DELETE`
/// with no `RETURNING` clause produces zero rows but still affects some).
async fn run(conn: &mut PgConnection, sql: &str, params: &[QueryParam]) -> Result<(Vec<QueryRow>, u64), DbError> {
    let mut query: sqlx::query::Query<'_, sqlx::Postgres, PgArguments> = sqlx::query(sql);
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<i64>),
            QueryParam::Bool(b) => query.bind(*b),
            QueryParam::Int(n) => query.bind(*n),
            QueryParam::IntArray(v) => query.bind(v.clone()),
            QueryParam::Text(s) => query.bind(s.clone()),
            QueryParam::TextArray(v) => query.bind(v.clone()),
            QueryParam::Bytes(b) => query.bind(b.clone()),
        };
    }

    let mut rows = Vec::new();
    let mut row_count = 0u64;
    let mut stream = query.fetch_many(conn);
    while let Some(item) = stream.try_next().await.map_err(|e| classify(&e))? {
        match item {
            Either::Left(result) => row_count = result.rows_affected(),
            Either::Right(row) => rows.push(row_to_values(&row)),
        }
    }
    drop(stream);
    Ok((rows, row_count))
}

fn row_to_values(row: &PgRow) -> QueryRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| match col.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(i).ok().flatten().map(QueryValue::Bool).unwrap_or(QueryValue::Null),
            "INT8" | "INT4" | "INT2" => {
                row.try_get::<Option<i64>, _>(i).ok().flatten().map(QueryValue::Int).unwrap_or(QueryValue::Null)
            }
            "TEXT" | "VARCHAR" | "JSONB" | "JSON" => {
                row.try_get::<Option<String>, _>(i).ok().flatten().map(QueryValue::Text).unwrap_or(QueryValue::Null)
            }
            "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(i).ok().flatten().map(QueryValue::Bytes).unwrap_or(QueryValue::Null),
            "_INT8" | "_INT4" | "_INT2" => row
                .try_get::<Option<Vec<i64>>, _>(i)
                .ok()
                .flatten()
                .map(QueryValue::IntArray)
                .unwrap_or(QueryValue::Null),
            "_TEXT" | "_VARCHAR" => row
                .try_get::<Option<Vec<String>>, _>(i)
                .ok()
                .flatten()
                .map(QueryValue::TextArray)
                .unwrap_or(QueryValue::Null),
            _ => QueryValue::Null,
        })
        .collect()
}
