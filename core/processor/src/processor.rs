//! The `Idle -> Validating -> TemplateMatching -> Executing -> Finishing`
//! transaction processor (spec.md §4, §5).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chainproc_crypto::encoding::{decode_hex, encode_hex};
use chainproc_crypto::keys::Address;
use chainproc_db::DbAdapter;
use chainproc_registry::{ContractEntry, Registry};
use chainproc_runtime::Sandbox;
use chainproc_template::{validate_payload, ContractVersion, FieldSpec, Template};
use chainproc_wire::Transaction;
use serde_json::Value;

use crate::contract::{ContractArgs, ContractBody, InitArgs, ReservedKind, UserContract};
use crate::create::handle_create_contract;
use crate::delete::handle_delete_contract;
use crate::guest_impl::SqlGuestApi;
use crate::outcome::Outcome;

/// What a single pass through `Executing` produced, before Finishing has
/// had a chance to apply the create/delete reject-to-invalid promotion or
/// the v1/v2 result-string rules.
enum ExecOutcome {
    /// The reserved handler or a native contract returned successfully.
    Success(String),
    /// An explicit `reject(reason)`, a failed payload-level check inside a
    /// reserved handler, or a contract returning `Err(reason)`.
    Rejected(String),
    /// An execution-level impossibility (e.g. no compiled implementation
    /// for this contract hash) rather than a business-logic rejection.
    Invalid(String),
}

/// Owns the one sandbox instance, the one registry, and the one database
/// connection a processor has (spec.md §5: single-threaded, one in-flight
/// call at a time).
pub struct TxProcessor {
    sandbox: Sandbox,
    registry: Registry,
    db: DbAdapter,
    processor_address: Address,
    sign_prefix: Option<Vec<u8>>,
    /// Native implementations available for already-created contracts,
    /// keyed by contract hash. The guest source interpreter itself is out
    /// of scope; this is the seam a real compiler/loader would populate.
    contract_factory: HashMap<[u8; 32], Arc<dyn UserContract>>,
    /// Set by a caller ahead of sending a create-contract transaction it
    /// knows corresponds to a native implementation, consumed on the next
    /// successful create.
    pending_create_native: Option<Arc<dyn UserContract>>,
    is_processing: bool,
}

impl TxProcessor {
    pub fn new(registry: Registry, db: DbAdapter, processor_address: Address, sign_prefix: Option<Vec<u8>>) -> Self {
        Self {
            sandbox: Sandbox::new(),
            registry,
            db,
            processor_address,
            sign_prefix,
            contract_factory: HashMap::new(),
            pending_create_native: None,
            is_processing: false,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Exposed so a caller can run its own clock/randomness guards
    /// (`Sandbox::assert_unsandboxed_clock`/`assert_unsandboxed_random`)
    /// before touching those outside the call this processor makes.
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Associate a native implementation with an already-installed
    /// contract hash, bypassing the create-contract path (useful when
    /// restoring state on startup alongside `Registry::reload`).
    pub fn register_native_contract(&mut self, contract_hash: [u8; 32], contract: Arc<dyn UserContract>) {
        self.contract_factory.insert(contract_hash, contract);
    }

    /// The next create-contract transaction that succeeds installs this
    /// implementation under its freshly computed contract hash.
    pub fn set_pending_create_native(&mut self, contract: Arc<dyn UserContract>) {
        self.pending_create_native = Some(contract);
    }

    pub async fn process_tx(
        &mut self,
        tx: &Transaction,
        block: u64,
        previous_block_timestamp: u64,
        previous_block_hash: [u8; 32],
        current_block_timestamp: u64,
        verify_signature: bool,
    ) -> Outcome {
        assert!(!self.is_processing, "process_tx invoked re-entrantly");
        self.is_processing = true;
        let outcome = self
            .process_tx_inner(tx, block, previous_block_timestamp, previous_block_hash, current_block_timestamp, verify_signature)
            .await;
        self.is_processing = false;
        outcome
    }

    async fn process_tx_inner(
        &mut self,
        tx: &Transaction,
        block: u64,
        previous_block_timestamp: u64,
        previous_block_hash: [u8; 32],
        current_block_timestamp: u64,
        verify_signature: bool,
    ) -> Outcome {
        // --- Validating ---
        if verify_signature {
            match &self.sign_prefix {
                None => {
                    tracing::error!("signature verification requested but no sign prefix is configured");
                    return Outcome::Retry("no sign prefix configured".to_string());
                }
                Some(prefix) => {
                    if !tx.verify_signature(prefix) {
                        return Outcome::Invalid("Invalid signature.".to_string());
                    }
                }
            }
        }
        if tx.valid_till() != 0 && previous_block_timestamp >= tx.valid_till() {
            return Outcome::Invalid("Transaction valid till expired.".to_string());
        }

        let payload: Value = match serde_json::from_str(tx.payload()) {
            Ok(v) => v,
            Err(_) => return Outcome::Invalid("Payload is invalid json.".to_string()),
        };

        // --- TemplateMatching ---
        let contract_hash = tx.contract_hash();
        let is_create = tx.is_create_contract();
        let is_delete = tx.is_delete_contract();

        let (template, version) = if is_create {
            (create_contract_template(), ContractVersion::V2)
        } else if is_delete {
            (delete_contract_template(), ContractVersion::V2)
        } else {
            match self.registry.get(&contract_hash).await {
                None => return Outcome::Rejected("Contract does not exist.".to_string()),
                Some(entry) => (entry.template.clone(), entry.validana_version),
            }
        };

        if let Some(msg) = validate_payload(&payload, &template, version) {
            return Outcome::Rejected(msg);
        }

        // --- Executing ---
        let mut pg_tx = match self.db.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                if let Some(code) = e.shutdown_exit_code() {
                    tracing::error!(exit_code = code, error = %e, "shutting down: unrecoverable database fault");
                    std::process::exit(code);
                }
                return Outcome::Retry(e.to_string());
            }
        };

        self.sandbox.enter();
        let from = tx.from_address();
        let mut guest = SqlGuestApi::new(&mut *pg_tx, contract_hash, is_create || is_delete);

        let body: Option<ContractBody> = if is_create {
            Some(ContractBody::Reserved(ReservedKind::CreateContract))
        } else if is_delete {
            Some(ContractBody::Reserved(ReservedKind::DeleteContract))
        } else {
            self.contract_factory.get(&contract_hash).cloned().map(ContractBody::User)
        };

        let (mut exec, new_entry, delete_target) = match body {
            None => (
                ExecOutcome::Invalid("No compiled implementation available for this contract.".to_string()),
                None,
                None,
            ),
            Some(ContractBody::Reserved(ReservedKind::CreateContract)) => {
                let init_args = InitArgs {
                    from: from.to_base58(),
                    block,
                    processor: self.processor_address.to_base58(),
                    previous_block_timestamp,
                    previous_block_hash: encode_hex(&previous_block_hash),
                    transaction_id: encode_hex(&tx.transaction_id()),
                    current_block_timestamp,
                };
                let native = self.pending_create_native.clone();
                match handle_create_contract(
                    &mut guest,
                    &self.registry,
                    &payload,
                    &from,
                    &self.processor_address,
                    &init_args,
                    native.as_deref(),
                )
                .await
                {
                    Ok(entry) => {
                        if let Some(native) = self.pending_create_native.take() {
                            self.contract_factory.insert(entry.contract_hash, native);
                        }
                        (ExecOutcome::Success("OK".to_string()), Some(entry), None::<[u8; 32]>)
                    }
                    Err(msg) => (ExecOutcome::Rejected(msg), None, None),
                }
            }
            Some(ContractBody::Reserved(ReservedKind::DeleteContract)) => match parse_delete_target(&payload) {
                Ok(target_hash) => match handle_delete_contract(&mut guest, &target_hash, &from).await {
                    Ok(()) => (ExecOutcome::Success("OK".to_string()), None, Some(target_hash)),
                    Err(msg) => (ExecOutcome::Rejected(msg), None, None),
                },
                Err(msg) => (ExecOutcome::Invalid(msg), None, None),
            },
            Some(ContractBody::User(native)) => {
                let args = ContractArgs {
                    payload: payload.clone(),
                    from: from.to_base58(),
                    block,
                    processor: self.processor_address.to_base58(),
                    previous_block_timestamp,
                    previous_block_hash: encode_hex(&previous_block_hash),
                    transaction_id: encode_hex(&tx.transaction_id()),
                    current_block_timestamp,
                };
                match native.invoke(&mut guest, &args).await {
                    Ok(result) => (ExecOutcome::Success(result), None, None),
                    Err(reason) => (ExecOutcome::Rejected(reason), None, None),
                }
            }
        };

        if let Some(reason) = guest.take_reject_reason() {
            exec = ExecOutcome::Rejected(reason);
        }
        let fast_drain = guest.drain_fast_queries().await;
        let fatal = guest.take_fatal();
        self.sandbox.leave();

        let outcome = self.finish(exec, fatal, fast_drain, is_create, is_delete, version, new_entry, delete_target).await;

        if outcome.is_accepted() || matches!(outcome, Outcome::V1Rejected(_)) {
            if let Err(e) = pg_tx.commit().await {
                tracing::error!(error = %e, "commit failed after an accepted outcome");
                return Outcome::Retry("failed to commit transaction".to_string());
            }
        } else {
            let _ = pg_tx.rollback().await;
        }

        outcome
    }

    async fn finish(
        &self,
        exec: ExecOutcome,
        fatal: Option<chainproc_db::DbError>,
        fast_drain: Result<(), chainproc_db::DbError>,
        is_create: bool,
        is_delete: bool,
        version: ContractVersion,
        new_entry: Option<ContractEntry>,
        delete_target: Option<[u8; 32]>,
    ) -> Outcome {
        if let Some(fault) = fatal.or_else(|| fast_drain.err()) {
            if let Some(code) = fault.shutdown_exit_code() {
                tracing::error!(exit_code = code, error = %fault, "shutting down: unrecoverable database fault");
                std::process::exit(code);
            }
            return match fault {
                chainproc_db::DbError::Retryable(_) => Outcome::Retry(fault.to_string()),
                _ => Outcome::Invalid(fault.to_string()),
            };
        }

        let outcome = match exec {
            ExecOutcome::Invalid(msg) => Outcome::Invalid(msg),
            ExecOutcome::Rejected(msg) => {
                // Create/delete failures never land in a block half-done;
                // everything else from a reserved handler is promoted.
                if is_create || is_delete {
                    Outcome::Invalid(msg)
                } else {
                    Outcome::Rejected(msg)
                }
            }
            ExecOutcome::Success(result) => classify_result(result, version),
        };

        if outcome.is_accepted() || matches!(outcome, Outcome::V1Rejected(_)) {
            if is_create {
                if let Some(entry) = new_entry {
                    if let Err(e) = self.registry.insert_committed(entry).await {
                        tracing::error!(error = ?e, "failed to install newly created contract into the registry");
                    }
                }
            } else if is_delete {
                if let Some(hash) = delete_target {
                    if let Err(e) = self.registry.remove_committed(&hash).await {
                        tracing::error!(error = ?e, "failed to remove deleted contract from the registry");
                    }
                }
            }
        }

        outcome
    }
}

/// v1 demands the exact literal `"OK"`; anything else is a `v1Rejected`
/// that still lands in a block. v2 contracts accept any returned string
/// (spec.md §6.3's "non-string result" case does not arise here: a native
/// `UserContract::invoke` is statically typed to return `Result<String,
/// String>`, so there is no runtime value to classify as non-string).
fn classify_result(result: String, version: ContractVersion) -> Outcome {
    match version {
        ContractVersion::V1 if result == "OK" => Outcome::Accepted(result),
        ContractVersion::V1 => Outcome::V1Rejected(result),
        ContractVersion::V2 => Outcome::Accepted(result),
    }
}

fn parse_delete_target(payload: &Value) -> Result<[u8; 32], String> {
    let hex = payload
        .get("hash")
        .and_then(Value::as_str)
        .ok_or_else(|| "Payload is missing key: hash.".to_string())?;
    let bytes = decode_hex(hex).map_err(|_| "Invalid hash.".to_string())?;
    if bytes.len() != 32 {
        return Err("Invalid hash.".to_string());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn field(field_type: &str, name: &str, desc: &str) -> FieldSpec {
    FieldSpec::new(field_type, name, desc)
}

/// Built-in template for the reserved create-contract handler (spec.md
/// §4.7.1), validated under v2 rules since `template` is a raw JSON object.
fn create_contract_template() -> Template {
    let mut t: Template = BTreeMap::new();
    t.insert("type".to_string(), field("str", "Type", "Contract type name."));
    t.insert("version".to_string(), field("str", "Version", "Contract version string."));
    t.insert("description".to_string(), field("str", "Description", "Human-readable description."));
    t.insert("template".to_string(), field("json", "Template", "Payload field template."));
    t.insert("init".to_string(), field("str", "Init", "Base64-encoded init source, may be empty."));
    t.insert("code".to_string(), field("str", "Code", "Base64-encoded contract source, may be empty."));
    t.insert("validanaVersion".to_string(), field("uint?", "Validana version", "Defaults to 1."));
    t
}

/// Built-in template for the reserved delete-contract handler (spec.md
/// §4.7.2): the hash of the contract to remove.
fn delete_contract_template() -> Template {
    let mut t: Template = BTreeMap::new();
    t.insert("hash".to_string(), field("hash", "Hash", "Hash of the contract to delete."));
    t
}
