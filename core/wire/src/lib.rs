//! Byte-exact transaction and block wire/DB codec (spec.md §3, §4.3).

pub mod block;
pub mod error;
pub mod stream;
pub mod transaction;

pub use block::Block;
pub use error::WireError;
pub use transaction::{Transaction, CREATE_CONTRACT_HASH, DELETE_CONTRACT_HASH};
