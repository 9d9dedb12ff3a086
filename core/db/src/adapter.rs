use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};

use crate::error::{classify, DbError};
use crate::role::{set_local_role, Role};

/// Wraps a single persistent SQL connection to a Postgres-compatible
/// engine (spec.md §4.8). The pool is capped at one connection: the
/// concurrency model is single-threaded cooperative scheduling within one
/// processor instance (spec.md §5), so there is never a reason to hand out
/// a second connection.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let options: PgConnectOptions = url.parse().map_err(|e: sqlx::Error| classify(&e))?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| classify(&e))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, DbError> {
        self.pool.begin().await.map_err(|e| classify(&e))
    }

    /// `SET LOCAL ROLE`, scoped to `tx`.
    pub async fn switch_role(&self, tx: &mut sqlx::PgConnection, role: Role) -> Result<(), DbError> {
        set_local_role(&mut *tx, role).await.map_err(|e| classify(&e))
    }

    /// Temporarily disable `statement_timeout` for the create-contract init
    /// path, running `body`, then always restoring the prior value
    /// (spec.md §5) even if `body` fails.
    pub async fn with_statement_timeout_disabled<F, Fut, T>(
        tx: &mut sqlx::PgConnection,
        body: F,
    ) -> Result<T, DbError>
    where
        F: FnOnce(&mut sqlx::PgConnection) -> Fut,
        Fut: std::future::Future<Output = Result<T, DbError>>,
    {
        tx.execute("SET LOCAL statement_timeout = 0").await.map_err(|e| classify(&e))?;
        let result = body(tx).await;
        tx.execute("SET LOCAL statement_timeout = DEFAULT")
            .await
            .map_err(|e| classify(&e))?;
        result
    }
}

/// Detects whether another processor instance already holds the engine's
/// advisory lock (engine code `53300`), the same construction
/// `cowprotocol-services`' `database::leader_pg_lock` uses for leader
/// election, adapted to a single pass/fail check rather than a polling
/// loop since at most one processor instance should ever run.
pub struct LeaderLock {
    pool: PgPool,
    key: String,
}

impl LeaderLock {
    pub fn new(pool: PgPool, key: impl Into<String>) -> Self {
        Self { pool, key: key.into() }
    }

    /// `true` if the lock was acquired (this instance may proceed); `false`
    /// if another instance already holds it.
    pub async fn try_acquire(&self) -> Result<bool, DbError> {
        const QUERY: &str = "SELECT pg_try_advisory_lock(hashtextextended($1, 0))";
        let mut conn = self.pool.acquire().await.map_err(|e| classify(&e))?;
        let got: bool = sqlx::query_scalar(QUERY)
            .bind(&self.key)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| classify(&e))?;
        if !got {
            tracing::warn!(key = %self.key, "processing lock already held by another instance");
        }
        Ok(got)
    }

    pub async fn release(&self) -> Result<(), DbError> {
        const QUERY: &str = "SELECT pg_advisory_unlock(hashtextextended($1, 0))";
        sqlx::query(QUERY)
            .bind(&self.key)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }
}
