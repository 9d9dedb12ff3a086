use async_trait::async_trait;
use chainproc_crypto::encoding::{decode_base58, decode_base64, decode_hex, encode_base64, encode_hex};
use chainproc_crypto::hash::{hash160, hash256, md5, ripemd160, sha1, sha256, sha512};
use chainproc_crypto::keys::Address;
use thiserror::Error;

/// A bound query parameter. Integers travel as `i64`/`Vec<i64>` the way the
/// wire's bounded-integer codec does, never as unbounded bignums (spec.md
/// §4.8's bigint/bigint[] mapping).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    IntArray(Vec<i64>),
    Text(String),
    TextArray(Vec<String>),
    Bytes(Vec<u8>),
}

/// A column value as returned from a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    IntArray(Vec<i64>),
    Text(String),
    TextArray(Vec<String>),
    Bytes(Vec<u8>),
}

pub type QueryRow = Vec<QueryValue>;

/// What a query resolves with: the selected rows (if any) alongside the
/// engine's affected-row count, mirroring the `{rows, rowCount}` shape a
/// guest contract's query calls resolve to (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOutcome {
    pub rows: Vec<QueryRow>,
    pub row_count: u64,
}

/// The positional legacy (v1) query tuple `(action, table, info,
/// params[, use_private])` (spec.md §4.8). Kept as a plain data carrier
/// here so `GuestApi` doesn't have to depend on the DB crate's own
/// `LegacyAction`/`LegacyCall` types; an implementor translates it.
#[derive(Debug, Clone)]
pub struct LegacyQuery {
    pub action: String,
    pub table: String,
    pub info: String,
    pub params: Vec<QueryParam>,
    pub use_private: bool,
}

/// Classification surfaced back to the guest, mirroring the DB adapter's
/// three-way split (spec.md §4.8): retryable connectivity faults and fatal
/// corruption never reach here as `QueryError` — they abort or shut down
/// the processor before returning control to guest code. Only
/// guest-catchable faults (a constraint violation) or a rejected query
/// (the five-rule grammar gate) are visible to `GuestApi::query`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("query violates a database constraint: {0}")]
    Constraint(String),
    #[error("query rejected: {0}")]
    InvalidQuery(String),
}

/// The only capability surface reachable from contract code while
/// sandboxed. Deliberately has no clock, RNG, locale, or raw I/O methods:
/// there is nothing to forbid at runtime because there is nothing to call.
#[async_trait]
pub trait GuestApi: Send {
    /// Record the reason execution should be rejected. Only the first call
    /// during a given `process_tx` invocation has any effect; the
    /// processor enforces that, not `GuestApi` itself.
    fn reject(&mut self, reason: String);

    /// Issue a query that may suspend this call while it awaits the
    /// database. This and [`Self::query_fast`] are the *only* suspension
    /// points inside the sandbox (invariant 7).
    async fn query(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<QueryOutcome, QueryError>;

    /// Enqueue a query whose result the contract does not need before it
    /// finishes; actually dispatched once the sandboxed call returns, in
    /// FIFO order, before `process_tx` itself returns (spec.md §5).
    async fn query_fast(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<(), QueryError>;

    /// The legacy (v1) positional calling convention, translated into the
    /// same canonical SQL `query` runs (spec.md §4.8).
    async fn query_legacy(&mut self, call: LegacyQuery) -> Result<QueryOutcome, QueryError>;

    fn is_valid_address(&self, address: &str) -> bool {
        Address::is_valid(address)
    }

    fn sha1(&self, data: &[u8]) -> [u8; 20] {
        sha1(data)
    }

    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        sha256(data)
    }

    fn sha512(&self, data: &[u8]) -> [u8; 64] {
        sha512(data)
    }

    fn md5(&self, data: &[u8]) -> [u8; 16] {
        md5(data)
    }

    fn ripemd160(&self, data: &[u8]) -> [u8; 20] {
        ripemd160(data)
    }

    fn hash160(&self, data: &[u8]) -> [u8; 20] {
        hash160(data)
    }

    fn hash256(&self, data: &[u8]) -> [u8; 32] {
        hash256(data)
    }

    fn encode_hex(&self, data: &[u8]) -> String {
        encode_hex(data)
    }

    fn decode_hex(&self, s: &str) -> Option<Vec<u8>> {
        decode_hex(s).ok()
    }

    fn encode_base64(&self, data: &[u8]) -> String {
        encode_base64(data)
    }

    fn decode_base64(&self, s: &str) -> Option<Vec<u8>> {
        decode_base64(s).ok()
    }

    fn decode_base58(&self, s: &str) -> Option<Vec<u8>> {
        decode_base58(s).ok()
    }
}
