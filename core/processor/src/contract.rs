//! Contract dispatch: the `ContractBody` tagged sum (spec.md §9, "Dynamic
//! dispatch for contract code") and one worked example contract exercising
//! the pipeline end to end.

use std::sync::Arc;

use async_trait::async_trait;
use chainproc_runtime::{GuestApi, QueryParam, QueryValue};
use serde_json::Value;

/// The ordered eight positional arguments a user contract's compiled code
/// receives (spec.md §6.3); `api` is the implicit eighth via `&mut dyn
/// GuestApi`, carried out-of-band rather than as a struct field.
#[derive(Debug, Clone)]
pub struct ContractArgs {
    pub payload: Value,
    pub from: String,
    pub block: u64,
    pub processor: String,
    pub previous_block_timestamp: u64,
    pub previous_block_hash: String,
    pub transaction_id: String,
    pub current_block_timestamp: u64,
}

/// Same calling convention minus `payload` (spec.md §6.3: "Init functions
/// receive the same arguments minus `payload`").
#[derive(Debug, Clone)]
pub struct InitArgs {
    pub from: String,
    pub block: u64,
    pub processor: String,
    pub previous_block_timestamp: u64,
    pub previous_block_hash: String,
    pub transaction_id: String,
    pub current_block_timestamp: u64,
}

/// A compiled contract's native-Rust representation. The interpreter for
/// the guest source language is explicitly out of scope (spec.md §9); this
/// trait is the seam a real interpreter/compiler would sit behind.
#[async_trait]
pub trait UserContract: Send + Sync {
    async fn init(&self, _api: &mut dyn GuestApi, _args: &InitArgs) -> Result<(), String> {
        Ok(())
    }

    async fn invoke(&self, api: &mut dyn GuestApi, args: &ContractArgs) -> Result<String, String>;
}

/// Adapter from a dynamically-dispatched user contract into `ContractBody`.
/// `Arc` rather than `Box`: the same compiled implementation is looked up
/// and invoked across many transactions, not owned by a single call.
pub type NativeContract = Arc<dyn UserContract>;

pub enum ReservedKind {
    CreateContract,
    DeleteContract,
}

/// What `Executing` actually runs (spec.md §4.7): one of the two built-in
/// reserved handlers, or a user contract's compiled code.
pub enum ContractBody {
    Reserved(ReservedKind),
    User(NativeContract),
}

/// The literal S1 scenario: an `init` that creates `test(addr PK, called
/// BIGINT NOT NULL)` and an invocation that increments `called` by
/// `payload.amount`, returning the value *before* the increment.
pub struct CallCounter;

#[async_trait]
impl UserContract for CallCounter {
    async fn init(&self, api: &mut dyn GuestApi, _args: &InitArgs) -> Result<(), String> {
        api.query("CREATE TABLE test (addr TEXT PRIMARY KEY, called BIGINT NOT NULL)", vec![])
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn invoke(&self, api: &mut dyn GuestApi, args: &ContractArgs) -> Result<String, String> {
        let amount = args
            .payload
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| "missing integer field \"amount\"".to_string())?;

        let existing = api
            .query("SELECT called FROM test WHERE addr = $1", vec![QueryParam::Text(args.from.clone())])
            .await
            .map_err(|e| e.to_string())?;

        let previous = match existing.rows.first().and_then(|row| row.first()) {
            Some(QueryValue::Int(n)) => *n,
            _ => 0,
        };
        let updated = previous + amount;

        api.query(
            "INSERT INTO test (addr, called) VALUES ($1, $2) \
             ON CONFLICT (addr) DO UPDATE SET called = EXCLUDED.called",
            vec![QueryParam::Text(args.from.clone()), QueryParam::Int(updated)],
        )
        .await
        .map_err(|e| e.to_string())?;

        Ok(previous.to_string())
    }
}
