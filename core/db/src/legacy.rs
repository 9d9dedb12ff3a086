use chainproc_runtime::QueryParam;

/// One of the four legacy (v1) query actions (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyAction {
    Select,
    Insert,
    Update,
    Delete,
}

impl LegacyAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action.to_lowercase().as_str() {
            "select" => Some(LegacyAction::Select),
            "insert" => Some(LegacyAction::Insert),
            "update" => Some(LegacyAction::Update),
            "delete" => Some(LegacyAction::Delete),
            _ => None,
        }
    }
}

/// The positional 4/5-tuple `(action, table, info, params[, usePrivate])`
/// (spec.md §4.8). `info` is the action-specific SQL fragment that follows
/// the table name: a column/value list for `insert`, or a `WHERE`-clause
/// body for `select`/`update`/`delete`.
#[derive(Debug, Clone)]
pub struct LegacyCall {
    pub action: LegacyAction,
    pub table: String,
    pub info: String,
    pub params: Vec<QueryParam>,
    pub use_private: bool,
}

/// Translate a legacy call into the canonical SQL string the query gate and
/// adapter operate on. `contract_hash` scopes `usePrivate` tables: two
/// distinct hashes never collide on a suffix (spec.md §8 property 10)
/// because the suffix is taken from the hash itself, not from any
/// caller-supplied name.
pub fn translate_legacy_call(call: &LegacyCall, contract_hash: &[u8; 32]) -> (String, Vec<QueryParam>) {
    let table = if call.use_private {
        format!("{}_{}", call.table, private_suffix(contract_hash))
    } else {
        call.table.clone()
    };

    let sql = match call.action {
        LegacyAction::Select => format!("SELECT * FROM {table} WHERE {}", call.info),
        LegacyAction::Insert => format!("INSERT INTO {table} {}", call.info),
        LegacyAction::Update => format!("UPDATE {table} SET {}", call.info),
        LegacyAction::Delete => format!("DELETE FROM {table} WHERE {}", call.info),
    };

    (sql, call.params.clone())
}

/// First 32 hex characters (16 bytes) of `contract_hash`.
fn private_suffix(contract_hash: &[u8; 32]) -> String {
    chainproc_crypto::encoding::encode_hex(&contract_hash[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_translated_with_where_clause() {
        let call = LegacyCall {
            action: LegacyAction::Select,
            table: "balances".to_string(),
            info: "address = $1".to_string(),
            params: vec![QueryParam::Text("addr".to_string())],
            use_private: false,
        };
        let (sql, params) = translate_legacy_call(&call, &[0u8; 32]);
        assert_eq!(sql, "SELECT * FROM balances WHERE address = $1");
        assert_eq!(params, vec![QueryParam::Text("addr".to_string())]);
    }

    #[test]
    fn private_tables_are_suffixed_by_contract_hash_and_never_collide() {
        let call = LegacyCall {
            action: LegacyAction::Insert,
            table: "state".to_string(),
            info: "(k, v) VALUES ($1, $2)".to_string(),
            params: vec![],
            use_private: true,
        };
        let (sql_a, _) = translate_legacy_call(&call, &[1u8; 32]);
        let (sql_b, _) = translate_legacy_call(&call, &[2u8; 32]);
        assert_ne!(sql_a, sql_b);
        assert!(sql_a.starts_with("INSERT INTO state_"));
    }
}
