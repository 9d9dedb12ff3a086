//! In-memory contract registry (spec.md §3.3, §4.5).
//!
//! Every loaded contract entry is also a committed row of `basics.contracts`.
//! The registry never writes to the database itself: the processor commits
//! a create/delete first and only mutates the registry afterwards. If a
//! commit fails, the caller must reload from the database rather than trust
//! the in-memory map — `Registry` has no rollback of its own.

use std::collections::HashMap;
use std::sync::Arc;

use chainproc_crypto::Address;
use chainproc_template::{ContractVersion, Template};
use chainproc_wire::{CREATE_CONTRACT_HASH, DELETE_CONTRACT_HASH};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("contract hash is reserved and can never be registered")]
    ReservedHash,
    #[error("contract is already registered")]
    AlreadyExists,
    #[error("contract is not registered")]
    NotFound,
}

/// One row of `basics.contracts` (spec.md §3.3), kept in memory for the
/// lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractEntry {
    pub contract_hash: [u8; 32],
    pub creator: Address,
    pub contract_type: String,
    pub contract_version: String,
    pub description: String,
    pub template: Template,
    /// Base64-encoded contract code, as stored (spec.md §4.7.1).
    pub code: String,
    pub validana_version: ContractVersion,
}

/// Keyed by `contract_hash`, shared behind a single `RwLock` so concurrent
/// readers (template matching, dispatch) never block each other, while a
/// committed create or delete takes the write half exactly once.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<HashMap<[u8; 32], Arc<ContractEntry>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole table with freshly loaded rows, e.g. at startup or
    /// after a commit whose outcome could not be confirmed locally.
    pub async fn reload(&self, entries: Vec<ContractEntry>) {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.contract_hash == CREATE_CONTRACT_HASH || entry.contract_hash == DELETE_CONTRACT_HASH {
                tracing::warn!("dropping reserved contract hash found in storage during reload");
                continue;
            }
            map.insert(entry.contract_hash, Arc::new(entry));
        }
        *self.entries.write().await = map;
    }

    pub async fn get(&self, contract_hash: &[u8; 32]) -> Option<Arc<ContractEntry>> {
        self.entries.read().await.get(contract_hash).cloned()
    }

    pub async fn contains(&self, contract_hash: &[u8; 32]) -> bool {
        self.entries.read().await.contains_key(contract_hash)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Record a contract whose creation has already committed. Call this
    /// only after the owning transaction commits successfully.
    pub async fn insert_committed(&self, entry: ContractEntry) -> Result<(), RegistryError> {
        if entry.contract_hash == CREATE_CONTRACT_HASH || entry.contract_hash == DELETE_CONTRACT_HASH {
            return Err(RegistryError::ReservedHash);
        }
        let mut map = self.entries.write().await;
        if map.contains_key(&entry.contract_hash) {
            return Err(RegistryError::AlreadyExists);
        }
        map.insert(entry.contract_hash, Arc::new(entry));
        Ok(())
    }

    /// Drop a contract whose deletion has already committed.
    pub async fn remove_committed(&self, contract_hash: &[u8; 32]) -> Result<Arc<ContractEntry>, RegistryError> {
        self.entries
            .write()
            .await
            .remove(contract_hash)
            .ok_or(RegistryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainproc_crypto::PrivateKey;

    fn sample_entry(hash: [u8; 32]) -> ContractEntry {
        ContractEntry {
            contract_hash: hash,
            creator: PrivateKey::generate().public_key().address(),
            contract_type: "counter".to_string(),
            contract_version: "1".to_string(),
            description: "".to_string(),
            template: Template::new(),
            code: "".to_string(),
            validana_version: ContractVersion::V2,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let registry = Registry::new();
        let entry = sample_entry([7u8; 32]);
        registry.insert_committed(entry.clone()).await.unwrap();
        let fetched = registry.get(&[7u8; 32]).await.unwrap();
        assert_eq!(*fetched, entry);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let registry = Registry::new();
        registry.insert_committed(sample_entry([1u8; 32])).await.unwrap();
        let err = registry.insert_committed(sample_entry([1u8; 32])).await.unwrap_err();
        assert_eq!(err, RegistryError::AlreadyExists);
    }

    #[tokio::test]
    async fn reserved_hashes_cannot_be_inserted() {
        let registry = Registry::new();
        assert_eq!(
            registry.insert_committed(sample_entry(CREATE_CONTRACT_HASH)).await.unwrap_err(),
            RegistryError::ReservedHash
        );
        assert_eq!(
            registry.insert_committed(sample_entry(DELETE_CONTRACT_HASH)).await.unwrap_err(),
            RegistryError::ReservedHash
        );
    }

    #[tokio::test]
    async fn remove_of_missing_contract_fails() {
        let registry = Registry::new();
        assert_eq!(registry.remove_committed(&[2u8; 32]).await.unwrap_err(), RegistryError::NotFound);
    }

    #[tokio::test]
    async fn reload_replaces_whole_table_and_drops_reserved_rows() {
        let registry = Registry::new();
        registry.insert_committed(sample_entry([3u8; 32])).await.unwrap();
        registry
            .reload(vec![sample_entry([4u8; 32]), sample_entry(CREATE_CONTRACT_HASH)])
            .await;
        assert!(registry.get(&[3u8; 32]).await.is_none());
        assert!(registry.get(&[4u8; 32]).await.is_some());
        assert_eq!(registry.len().await, 1);
    }
}
