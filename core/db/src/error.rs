use thiserror::Error;

/// `DB/index corruption` shutdown code (spec.md §6.4).
pub const EXIT_FATAL_CORRUPTION: i32 = 51;
/// `conflict lock / another instance` shutdown code (spec.md §6.4).
pub const EXIT_CONFLICT_LOCK: i32 = 50;

/// The three-way (plus lock-conflict) classification of spec.md §4.8.
#[derive(Debug, Error)]
pub enum DbError {
    /// `08xxx` except `08P01`: connection dropped, retry later.
    #[error("retryable database connectivity fault: {0}")]
    Retryable(String),
    /// `XX001`/`XX002`: corruption, the process must shut down.
    #[error("fatal database corruption: {0}")]
    Fatal(String),
    /// Another processor instance holds the leader advisory lock (`53300`).
    #[error("another instance holds the processing lock: {0}")]
    LockConflict(String),
    /// `23xxx`: a constraint violation, surfaced to the guest as a
    /// catchable error with the original `code` preserved.
    #[error("constraint violation [{code}]: {message}")]
    Constraint { code: String, message: String },
    /// Anything else: the enclosing transaction is marked invalid and the
    /// fault is logged.
    #[error("database error: {0}")]
    Invalid(String),
}

impl DbError {
    /// `Some(code)` when this fault should trigger a graceful process
    /// shutdown with that exit code; `None` for per-transaction faults.
    pub fn shutdown_exit_code(&self) -> Option<i32> {
        match self {
            DbError::Fatal(_) => Some(EXIT_FATAL_CORRUPTION),
            DbError::LockConflict(_) => Some(EXIT_CONFLICT_LOCK),
            _ => None,
        }
    }
}

/// Classify a raw `sqlx::Error` per spec.md §4.8. Connectivity/protocol
/// faults without a Postgres error code (broken pipe, pool timeout) are
/// treated as retryable; anything else not recognised falls through to
/// `Invalid`, matching "everything else: mark transaction invalid and log".
pub fn classify(err: &sqlx::Error) -> DbError {
    if let Some(db_err) = err.as_database_error() {
        if let Some(code) = db_err.code() {
            let code = code.as_ref();
            if code == "53300" {
                return DbError::LockConflict(db_err.message().to_string());
            }
            if code.starts_with("XX") {
                return DbError::Fatal(format!("[{code}] {}", db_err.message()));
            }
            if code.starts_with("08") && code != "08P01" {
                return DbError::Retryable(format!("[{code}] {}", db_err.message()));
            }
            if code.starts_with("23") {
                return DbError::Constraint {
                    code: code.to_string(),
                    message: db_err.message().to_string(),
                };
            }
        }
        return DbError::Invalid(db_err.message().to_string());
    }

    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            DbError::Retryable(err.to_string())
        }
        other => DbError::Invalid(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_faults_carry_the_corruption_exit_code() {
        let err = DbError::Fatal("index corrupted".to_string());
        assert_eq!(err.shutdown_exit_code(), Some(EXIT_FATAL_CORRUPTION));
    }

    #[test]
    fn lock_conflict_carries_the_conflict_exit_code() {
        let err = DbError::LockConflict("another holds it".to_string());
        assert_eq!(err.shutdown_exit_code(), Some(EXIT_CONFLICT_LOCK));
    }

    #[test]
    fn constraint_and_invalid_do_not_shut_down() {
        let constraint = DbError::Constraint { code: "23505".to_string(), message: "dup".to_string() };
        let invalid = DbError::Invalid("parse error".to_string());
        assert_eq!(constraint.shutdown_exit_code(), None);
        assert_eq!(invalid.shutdown_exit_code(), None);
    }
}
