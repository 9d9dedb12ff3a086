//! Built-in create-contract handler (spec.md §4.7.1).

use chainproc_crypto::encoding::decode_base64;
use chainproc_crypto::hash::hash256;
use chainproc_crypto::keys::Address;
use chainproc_registry::{ContractEntry, Registry};
use chainproc_runtime::{GuestApi, QueryParam};
use chainproc_template::{ContractVersion, FieldSpec, Template};
use chainproc_wire::{CREATE_CONTRACT_HASH, DELETE_CONTRACT_HASH};
use serde_json::Value;

use crate::contract::{InitArgs, UserContract};

const STRICT_MODE_PROLOG: &str = "\"use strict\";\n";
const MAX_TYPE_LEN: usize = 64;
const MAX_VERSION_LEN: usize = 32;
const MAX_DESCRIPTION_LEN: usize = 256;
const MAX_TEMPLATE_KEY_LEN: usize = 64;

/// Validate, compile and install a new contract. Returns the row to insert
/// into the registry once the enclosing transaction commits (spec.md
/// §4.7: registry installation happens at Finishing, not here).
///
/// `native`, if present, is the already-"compiled" native implementation
/// corresponding to this transaction's `code` field — the source-text
/// interpreter itself is out of scope (spec.md §9), so a caller that knows
/// which native contract a given `code` blob maps to supplies it here;
/// otherwise `init` is validated but not executed.
pub async fn handle_create_contract(
    api: &mut dyn GuestApi,
    registry: &Registry,
    payload: &Value,
    from: &Address,
    processor_address: &Address,
    init_args: &InitArgs,
    native: Option<&dyn UserContract>,
) -> Result<ContractEntry, String> {
    if from != processor_address {
        return Err("Only the processor's own address may create a contract.".to_string());
    }

    let obj = payload.as_object().ok_or_else(|| "Payload is invalid json.".to_string())?;

    let contract_type = string_field(obj, "type")?;
    if contract_type.len() > MAX_TYPE_LEN {
        return Err("Contract type too long.".to_string());
    }
    let contract_version = string_field(obj, "version")?;
    if contract_version.len() > MAX_VERSION_LEN {
        return Err("Contract version too long.".to_string());
    }
    let description = string_field(obj, "description")?;
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err("Contract description too long.".to_string());
    }

    let validana_version_num = match obj.get("validanaVersion") {
        None => 1u8,
        Some(v) => v
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| "Invalid validanaVersion.".to_string())?,
    };
    if validana_version_num != 1 && validana_version_num != 2 {
        return Err("validanaVersion must be 1 or 2.".to_string());
    }
    let validana_version = ContractVersion::from_u8(validana_version_num).expect("checked above");

    let template = parse_and_validate_template(
        obj.get("template").ok_or_else(|| "Missing template.".to_string())?,
    )?;

    let init_b64 = obj.get("init").and_then(Value::as_str).unwrap_or("");
    let code_b64 = obj.get("code").and_then(Value::as_str).unwrap_or("");
    if init_b64.is_empty() && code_b64.is_empty() {
        return Err("init and code must not both be empty.".to_string());
    }

    let code_source = decode_source(code_b64, validana_version)?;
    let init_source = decode_source(init_b64, validana_version)?;
    check_forbidden_patterns(&code_source)?;
    check_forbidden_patterns(&init_source)?;

    let contract_hash = hash256(code_source.as_bytes());
    if contract_hash == CREATE_CONTRACT_HASH || contract_hash == DELETE_CONTRACT_HASH {
        return Err("Generated contract hash collides with a reserved hash.".to_string());
    }
    if registry.contains(&contract_hash).await {
        return Err("Contract already exists.".to_string());
    }

    if !init_source.is_empty() {
        api.query("SET LOCAL ROLE smartcontract", vec![]).await.map_err(|e| e.to_string())?;
        api.query("SET LOCAL statement_timeout = 0", vec![]).await.map_err(|e| e.to_string())?;

        if let Some(contract) = native {
            contract.init(api, init_args).await.map_err(|e| format!("Contract init failed: {e}"))?;
        }

        api.query("SET LOCAL statement_timeout = DEFAULT", vec![]).await.map_err(|e| e.to_string())?;
        api.query("SET LOCAL ROLE smartcontractmanager", vec![]).await.map_err(|e| e.to_string())?;
    }

    let template_json = serde_json::to_string(obj.get("template").unwrap()).unwrap_or_default();
    api.query(
        "INSERT INTO basics.contracts \
         (contract_hash, type, version, description, creator, template, code_bytes, validana_version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        vec![
            QueryParam::Bytes(contract_hash.to_vec()),
            QueryParam::Text(contract_type.clone()),
            QueryParam::Text(contract_version.clone()),
            QueryParam::Text(description.clone()),
            QueryParam::Bytes(from.as_hash160().to_vec()),
            QueryParam::Text(template_json),
            QueryParam::Bytes(code_source.as_bytes().to_vec()),
            QueryParam::Int(validana_version_num as i64),
        ],
    )
    .await
    .map_err(|e| e.to_string())?;

    api.query("SET LOCAL ROLE smartcontract", vec![]).await.map_err(|e| e.to_string())?;

    Ok(ContractEntry {
        contract_hash,
        creator: *from,
        contract_type,
        contract_version,
        description,
        template,
        code: code_b64.to_string(),
        validana_version,
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| format!("Missing or invalid string field \"{key}\"."))
}

fn parse_and_validate_template(value: &Value) -> Result<Template, String> {
    let obj = value.as_object().ok_or_else(|| "Template must be a JSON object.".to_string())?;
    let mut template = Template::new();
    for (key, field_value) in obj {
        if key.len() > MAX_TEMPLATE_KEY_LEN {
            return Err(format!("Template key \"{key}\" is too long."));
        }
        let field_obj = field_value
            .as_object()
            .ok_or_else(|| format!("Template field \"{key}\" must be an object."))?;
        if field_obj.len() != 3
            || !field_obj.contains_key("type")
            || !field_obj.contains_key("name")
            || !field_obj.contains_key("desc")
        {
            return Err(format!("Template field \"{key}\" must have exactly type, name and desc."));
        }
        let field_type = field_obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Template field \"{key}\".type must be a string."))?;
        let name = field_obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Template field \"{key}\".name must be a string."))?;
        let desc = field_obj
            .get("desc")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Template field \"{key}\".desc must be a string."))?;
        if field_type.len() > MAX_TYPE_LEN || name.len() > MAX_TYPE_LEN {
            return Err(format!("Template field \"{key}\" type or name too long."));
        }
        if desc.len() > MAX_DESCRIPTION_LEN {
            return Err(format!("Template field \"{key}\" desc too long."));
        }
        template.insert(key.clone(), FieldSpec::new(field_type, name, desc));
    }
    Ok(template)
}

fn decode_source(b64: &str, version: ContractVersion) -> Result<String, String> {
    if b64.is_empty() {
        return Ok(String::new());
    }
    let bytes = decode_base64(b64).map_err(|_| "Invalid base64 source.".to_string())?;
    let text = String::from_utf8(bytes).map_err(|_| "Source is not valid UTF-8.".to_string())?;
    if version == ContractVersion::V1 {
        Ok(text)
    } else {
        Ok(format!("{STRICT_MODE_PROLOG}{text}"))
    }
}

/// Raw substring search: `try` followed, anywhere later in the source, by
/// `catch` with at least one character between them (spec.md §4.7.1).
fn contains_try_catch(source: &str) -> bool {
    let mut start = 0;
    while let Some(rel) = source[start..].find("try") {
        let try_idx = start + rel;
        let after = try_idx + 3;
        if after < source.len() {
            if let Some(catch_rel) = source[after..].find("catch") {
                if catch_rel > 0 {
                    return true;
                }
            }
        }
        start = try_idx + 1;
    }
    false
}

/// A bare `query(` not immediately preceded by `await ` (spec.md §4.7.1).
fn contains_bare_query_call(source: &str) -> bool {
    let needle = "query(";
    let mut start = 0;
    while let Some(rel) = source[start..].find(needle) {
        let idx = start + rel;
        let preceded = idx >= 6 && &source[idx - 6..idx] == "await ";
        if !preceded {
            return true;
        }
        start = idx + 1;
    }
    false
}

fn check_forbidden_patterns(source: &str) -> Result<(), String> {
    if contains_try_catch(source) {
        return Err("Contract source contains a forbidden try...catch.".to_string());
    }
    if contains_bare_query_call(source) {
        return Err("Contract source contains a bare query( not preceded by await.".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_try_catch_with_nonempty_middle() {
        assert!(contains_try_catch("try { x() } catch (e) {}"));
        assert!(!contains_try_catch("trycatch"));
        assert!(!contains_try_catch("catch without try"));
    }

    #[test]
    fn detects_bare_query_call() {
        assert!(contains_bare_query_call("let r = query('select 1');"));
        assert!(!contains_bare_query_call("let r = await query('select 1');"));
    }

    #[test]
    fn strict_prolog_only_added_for_v2() {
        let v1 = decode_source(&base64_of("code"), ContractVersion::V1).unwrap();
        let v2 = decode_source(&base64_of("code"), ContractVersion::V2).unwrap();
        assert_eq!(v1, "code");
        assert_eq!(v2, format!("{STRICT_MODE_PROLOG}code"));
    }

    fn base64_of(s: &str) -> String {
        chainproc_crypto::encoding::encode_base64(s.as_bytes())
    }
}
