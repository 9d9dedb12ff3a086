//! Typed template matching of decoded JSON transaction payloads
//! (spec.md §3.4, §4.4).

use std::collections::BTreeMap;

use chainproc_crypto::encoding::{is_valid_base64, is_valid_hex};
use chainproc_crypto::keys::Address;
use serde_json::Value;

/// A contract's `validana_version` compatibility mode (spec.md §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractVersion {
    V1,
    V2,
}

impl ContractVersion {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ContractVersion::V1),
            2 => Some(ContractVersion::V2),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ContractVersion::V1 => 1,
            ContractVersion::V2 => 2,
        }
    }
}

/// One template field: `{type, name, desc}` (spec.md §3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub field_type: String,
    pub name: String,
    pub desc: String,
}

impl FieldSpec {
    pub fn new(field_type: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            name: name.into(),
            desc: desc.into(),
        }
    }
}

/// Mapping from field name to its spec, ordered for deterministic iteration
/// (matters for which template-mismatch reason surfaces first).
pub type Template = BTreeMap<String, FieldSpec>;

struct ParsedType<'a> {
    base: &'a str,
    is_array: bool,
    optional: bool,
}

fn parse_type(raw: &str, version: ContractVersion) -> ParsedType<'_> {
    let mut rest = raw;
    let mut optional = false;
    if version != ContractVersion::V1 {
        if let Some(stripped) = rest.strip_suffix('?') {
            rest = stripped;
            optional = true;
        }
    }
    let is_array = rest.ends_with("Array");
    let base = if is_array {
        rest.strip_suffix("Array").unwrap()
    } else {
        rest
    };
    ParsedType { base, is_array, optional }
}

/// Validate `payload` against `template` under `version`'s rules. Returns
/// `Some(reason)` on the first failure, `None` if the payload matches.
pub fn validate_payload(payload: &Value, template: &Template, version: ContractVersion) -> Option<String> {
    let obj = match payload {
        Value::Object(map) => map,
        _ => return Some("Payload is invalid json.".to_string()),
    };

    for key in obj.keys() {
        if !template.contains_key(key) {
            return Some("Payload has extra key.".to_string());
        }
    }

    for (key, spec) in template {
        let parsed = parse_type(&spec.field_type, version);
        match obj.get(key) {
            None => {
                if parsed.optional {
                    continue;
                }
                return Some(format!("Payload is missing key: {key}."));
            }
            Some(value) => {
                if let Some(reason) = check_value(value, &parsed, version) {
                    return Some(format!("Key \"{key}\": {reason}"));
                }
            }
        }
    }

    None
}

fn check_value(value: &Value, parsed: &ParsedType<'_>, version: ContractVersion) -> Option<String> {
    if parsed.is_array {
        let items = match value.as_array() {
            Some(items) => items,
            None => return Some(format!("Invalid {}: expected an array.", parsed.base)),
        };
        for item in items {
            if let Some(base_error) = check_base_type(item, parsed.base, version) {
                return Some(format!("{base_error} in array"));
            }
        }
        None
    } else {
        check_base_type(value, parsed.base, version)
    }
}

fn check_base_type(value: &Value, tag: &str, version: ContractVersion) -> Option<String> {
    match tag {
        "bool" => {
            if value.is_boolean() {
                None
            } else {
                Some("Invalid bool.".to_string())
            }
        }
        "int" => check_int(value),
        "uint" => match value.as_i64() {
            Some(n) if n >= 0 && is_safe_integer(value) && n as u64 <= chainproc_crypto::encoding::MAX_SAFE_INTEGER => {
                None
            }
            _ => Some("Invalid uint.".to_string()),
        },
        "float" => match value.as_f64() {
            Some(f) if f.is_finite() => None,
            _ => Some("Invalid float.".to_string()),
        },
        "addr" => match value.as_str() {
            Some(s) if Address::is_valid(s) => None,
            _ => Some("Invalid addr.".to_string()),
        },
        "hex" => match value.as_str() {
            Some(s) if is_valid_hex(s) => None,
            _ => Some("Invalid hex.".to_string()),
        },
        "hash" => match value.as_str() {
            Some(s) if s.len() == 64 && is_valid_hex(s) => None,
            _ => Some("Invalid hash.".to_string()),
        },
        "base64" => match value.as_str() {
            Some(s) if is_valid_base64(s) => None,
            _ => Some("Invalid base64.".to_string()),
        },
        "json" => match version {
            ContractVersion::V1 => match value.as_str() {
                Some(s) if serde_json::from_str::<Value>(s).is_ok() => None,
                _ => Some("Invalid json.".to_string()),
            },
            ContractVersion::V2 => None,
        },
        "id" => match version {
            ContractVersion::V1 => {
                if value.is_string() {
                    None
                } else {
                    Some("Invalid id.".to_string())
                }
            }
            ContractVersion::V2 => match value.as_str() {
                Some(s) if s.len() == 32 && is_valid_hex(s) => None,
                _ => Some("Invalid id.".to_string()),
            },
        },
        // "str" and any tag unknown to the dispatcher are treated as `str`.
        _ => {
            if value.is_string() {
                None
            } else {
                Some(format!("Invalid {tag}."))
            }
        }
    }
}

fn check_int(value: &Value) -> Option<String> {
    match value.as_i64() {
        Some(n) if is_safe_integer(value) && n.unsigned_abs() as u64 <= chainproc_crypto::encoding::MAX_SAFE_INTEGER => {
            None
        }
        _ => Some("Invalid int.".to_string()),
    }
}

fn is_safe_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template_with(ty: &str) -> Template {
        let mut t = Template::new();
        t.insert("field".to_string(), FieldSpec::new(ty, "Field", "desc"));
        t
    }

    #[test]
    fn empty_template_rejects_extra_key() {
        let template = Template::new();
        let payload = json!({"extrakey": ""});
        assert_eq!(
            validate_payload(&payload, &template, ContractVersion::V2),
            Some("Payload has extra key.".to_string())
        );
    }

    #[test]
    fn non_object_payload_rejected() {
        let template = Template::new();
        let payload = json!([1, 2, 3]);
        assert_eq!(
            validate_payload(&payload, &template, ContractVersion::V2),
            Some("Payload is invalid json.".to_string())
        );
    }

    #[test]
    fn int_type_matrix() {
        let template = template_with("int");
        assert!(validate_payload(&json!({"field": 1}), &template, ContractVersion::V2).is_none());
        assert!(validate_payload(&json!({"field": 1.2}), &template, ContractVersion::V2).is_some());
    }

    #[test]
    fn uint_rejects_negative() {
        let template = template_with("uint");
        assert!(validate_payload(&json!({"field": 5}), &template, ContractVersion::V2).is_none());
        assert!(validate_payload(&json!({"field": -1}), &template, ContractVersion::V2).is_some());
    }

    #[test]
    fn uint_rejects_above_max_safe_integer() {
        let template = template_with("uint");
        let max_safe = chainproc_crypto::encoding::MAX_SAFE_INTEGER;
        assert!(validate_payload(&json!({"field": max_safe}), &template, ContractVersion::V2).is_none());
        assert!(validate_payload(&json!({"field": max_safe + 1}), &template, ContractVersion::V2).is_some());
    }

    #[test]
    fn hex_type_matrix() {
        let template = template_with("hex");
        assert!(validate_payload(&json!({"field": "a0b1"}), &template, ContractVersion::V2).is_none());
        assert!(validate_payload(&json!({"field": "agrt"}), &template, ContractVersion::V2).is_some());
    }

    #[test]
    fn hash_requires_exactly_64_hex_chars() {
        let template = template_with("hash");
        let good = "a".repeat(64);
        let short = "a".repeat(63);
        let long = "a".repeat(65);
        assert!(validate_payload(&json!({"field": good}), &template, ContractVersion::V2).is_none());
        assert!(validate_payload(&json!({"field": short}), &template, ContractVersion::V2).is_some());
        assert!(validate_payload(&json!({"field": long}), &template, ContractVersion::V2).is_some());
    }

    #[test]
    fn array_suffix_checks_every_element() {
        let template = template_with("intArray");
        assert!(validate_payload(&json!({"field": [1, 2, 3]}), &template, ContractVersion::V2).is_none());
        let err = validate_payload(&json!({"field": [1, "nope"]}), &template, ContractVersion::V2).unwrap();
        assert!(err.contains("in array"));
    }

    #[test]
    fn optional_suffix_allows_absence_in_v2_only() {
        let template = template_with("int?");
        assert!(validate_payload(&json!({}), &template, ContractVersion::V2).is_none());
        // v1 does not support the `?` suffix: the field is still required.
        assert!(validate_payload(&json!({}), &template, ContractVersion::V1).is_some());
    }

    #[test]
    fn id_type_is_version_aware() {
        let template = template_with("id");
        assert!(validate_payload(&json!({"field": "anything"}), &template, ContractVersion::V1).is_none());
        assert!(validate_payload(&json!({"field": "anything"}), &template, ContractVersion::V2).is_some());
        let hex32 = "a".repeat(32);
        assert!(validate_payload(&json!({"field": hex32}), &template, ContractVersion::V2).is_none());
    }

    #[test]
    fn json_type_is_version_aware() {
        let template = template_with("json");
        assert!(validate_payload(&json!({"field": "{\"a\":1}"}), &template, ContractVersion::V1).is_none());
        assert!(validate_payload(&json!({"field": "not json"}), &template, ContractVersion::V1).is_some());
        assert!(validate_payload(&json!({"field": {"a": 1}}), &template, ContractVersion::V2).is_none());
    }

    #[test]
    fn unknown_type_tag_falls_back_to_str() {
        let template = template_with("totallyUnknown");
        assert!(validate_payload(&json!({"field": "text"}), &template, ContractVersion::V2).is_none());
        assert!(validate_payload(&json!({"field": 5}), &template, ContractVersion::V2).is_some());
    }
}
