//! Thin processor daemon.
//!
//! Connects to Postgres, loads the contract registry, and feeds wire-format
//! transactions read line-by-line (hex-encoded) from stdin through
//! [`chainproc_processor::TxProcessor`], logging the outcome of each one.
//! Block assembly, P2P replication and an RPC surface are someone else's
//! job; this binary only demonstrates the interfaces the processor exposes.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use chainproc_crypto::encoding::{decode_hex, encode_base64};
use chainproc_crypto::keys::PrivateKey;
use chainproc_db::{DbAdapter, LeaderLock};
use chainproc_processor::TxProcessor;
use chainproc_registry::{ContractEntry, Registry};
use chainproc_template::{ContractVersion, FieldSpec, Template};
use chainproc_wire::Transaction;
use clap::Parser;
use serde::Deserialize;
use sqlx::Row;
use tracing::{info, warn};

/// Command-line surface; anything that can also come from a config file or
/// environment is read through [`NodeConfig`] instead.
#[derive(Parser)]
#[command(name = "chainproc-node")]
#[command(about = "Runs the chain processor execution core against a Postgres database")]
struct Cli {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// WIF-encoded private key the processor signs its own create/delete
    /// contract transactions with.
    #[arg(long, env = "PROCESSOR_PRIVATE_KEY")]
    processor_key: String,

    /// Optional TOML file layered underneath CLI flags and environment
    /// variables (`CHAINPROC_*`).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Settings that make sense to keep in a file or environment rather than
/// typed on every invocation.
#[derive(Debug, Deserialize)]
struct NodeConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_lock_key")]
    lock_key: String,
    #[serde(default)]
    sign_prefix: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lock_key() -> String {
    "chainproc-processor".to_string()
}

fn load_config(path: Option<&PathBuf>) -> Result<NodeConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix("CHAINPROC"));
    builder.build()?.try_deserialize().context("loading node configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| "info".into()))
        .init();

    info!("connecting to database");
    let db = DbAdapter::connect(&cli.database_url).await.context("connecting to database")?;

    let lock = LeaderLock::new(db.pool().clone(), cfg.lock_key.clone());
    if !lock.try_acquire().await.context("acquiring processing lock")? {
        bail!("another processor instance already holds the lock {}", cfg.lock_key);
    }
    info!(key = %cfg.lock_key, "processing lock acquired");

    let registry = Registry::new();
    let entries = load_registry(&db).await.context("loading contract registry")?;
    info!(count = entries.len(), "loaded contract registry");
    registry.reload(entries).await;

    let processor_key =
        PrivateKey::from_wif(&cli.processor_key).map_err(|e| anyhow::anyhow!("invalid processor key: {e}"))?;
    let processor_address = processor_key.public_key().address();
    info!(address = %processor_address.to_base58(), "processor identity");

    let sign_prefix = if cfg.sign_prefix.is_empty() { None } else { Some(cfg.sign_prefix.into_bytes()) };
    let mut processor = TxProcessor::new(registry, db, processor_address, sign_prefix);

    info!("reading hex-encoded transactions from stdin, one per line");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bytes = match decode_hex(line) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "skipping line: not valid hex");
                continue;
            }
        };
        let tx = match Transaction::from_bytes(bytes) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "skipping line: not a valid transaction");
                continue;
            }
        };

        processor.sandbox().assert_unsandboxed_clock();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let outcome = processor.process_tx(&tx, 0, now, [0u8; 32], now, true).await;
        info!(transaction_id = %encode_base64(&tx.transaction_id()), outcome = ?outcome, "processed");
    }

    lock.release().await.context("releasing processing lock")?;
    Ok(())
}

/// Read every row of `basics.contracts` back into the in-memory shape
/// [`Registry::reload`] expects. The stored `template` column is the raw
/// JSON object the create-contract payload carried.
async fn load_registry(db: &DbAdapter) -> Result<Vec<ContractEntry>> {
    let rows = sqlx::query(
        "SELECT contract_hash, creator, type, version, description, template, code_bytes, validana_version \
         FROM basics.contracts",
    )
    .fetch_all(db.pool())
    .await
    .context("querying basics.contracts")?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let contract_hash: Vec<u8> = row.try_get("contract_hash")?;
        let creator: Vec<u8> = row.try_get("creator")?;
        let contract_type: String = row.try_get("type")?;
        let contract_version: String = row.try_get("version")?;
        let description: String = row.try_get("description")?;
        let template_json: String = row.try_get("template")?;
        let code_bytes: Vec<u8> = row.try_get("code_bytes")?;
        let validana_version: i64 = row.try_get("validana_version")?;

        let contract_hash: [u8; 32] = contract_hash.try_into().map_err(|_| anyhow::anyhow!("contract_hash is not 32 bytes"))?;
        let creator: [u8; 20] = creator.try_into().map_err(|_| anyhow::anyhow!("creator is not 20 bytes"))?;
        let template = parse_template(&template_json)?;
        let validana_version = ContractVersion::from_u8(validana_version as u8)
            .ok_or_else(|| anyhow::anyhow!("validana_version {validana_version} out of range"))?;

        entries.push(ContractEntry {
            contract_hash,
            creator: chainproc_crypto::keys::Address::from_hash160(creator),
            contract_type,
            contract_version,
            description,
            template,
            code: encode_base64(&code_bytes),
            validana_version,
        });
    }
    Ok(entries)
}

fn parse_template(json: &str) -> Result<Template> {
    let value: serde_json::Value = serde_json::from_str(json).context("template column is not valid json")?;
    let obj = value.as_object().ok_or_else(|| anyhow::anyhow!("template column is not a json object"))?;
    let mut template = Template::new();
    for (key, spec) in obj {
        let spec = spec.as_object().ok_or_else(|| anyhow::anyhow!("template field {key} is not an object"))?;
        let field_type = spec.get("type").and_then(serde_json::Value::as_str).unwrap_or_default();
        let name = spec.get("name").and_then(serde_json::Value::as_str).unwrap_or_default();
        let desc = spec.get("desc").and_then(serde_json::Value::as_str).unwrap_or_default();
        template.insert(key.clone(), FieldSpec::new(field_type, name, desc));
    }
    Ok(template)
}
