//! Built-in delete-contract handler (spec.md §4.7.2).

use chainproc_crypto::keys::Address;
use chainproc_runtime::{GuestApi, QueryParam, QueryValue};

/// Delete a contract owned by `from`. Returns `Ok(())` on success, in which
/// case the caller removes the entry from the registry at Finishing. The
/// error message matches scenario S7 verbatim and is promoted from
/// `Rejected` to `Invalid` by the Finishing step, same as a failed create.
pub async fn handle_delete_contract(
    api: &mut dyn GuestApi,
    contract_hash: &[u8; 32],
    from: &Address,
) -> Result<(), String> {
    let result = api
        .query(
            "DELETE FROM basics.contracts WHERE contract_hash = $1 AND creator = $2 RETURNING contract_hash",
            vec![QueryParam::Bytes(contract_hash.to_vec()), QueryParam::Bytes(from.as_hash160().to_vec())],
        )
        .await
        .map_err(|e| e.to_string())?;

    if result.rows.is_empty() {
        return Err(format!(
            "Not creator of contract or contract: {} does not exist.",
            chainproc_crypto::encoding::encode_hex(contract_hash)
        ));
    }

    // Defensive: the WHERE clause already guarantees at most one row.
    debug_assert!(matches!(result.rows[0].first(), Some(QueryValue::Bytes(h)) if h == contract_hash));
    Ok(())
}
