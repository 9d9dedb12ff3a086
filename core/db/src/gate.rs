use chainproc_runtime::QueryError;

const FORBIDDEN_SUBSTRINGS: [&str; 3] = ["localtime", "current_date", "current_time"];

/// The guest-facing `query` grammar gate (spec.md §4.8). Returns the
/// normalised (trimmed, single trailing `;`) query on success.
///
/// `allow_reserved_exception` is set only while executing the built-in
/// create/delete-contract handler, which alone may switch role or touch
/// `statement_timeout`.
pub fn check_guest_query(sql: &str, allow_reserved_exception: bool) -> Result<String, QueryError> {
    let trimmed = sql.trim();
    let without_trailing_semicolon = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    if without_trailing_semicolon.contains(';') {
        return Err(QueryError::InvalidQuery("query contains more than one statement".to_string()));
    }

    let lowered = without_trailing_semicolon.to_lowercase();
    if lowered.contains("--") {
        return Err(QueryError::InvalidQuery("query contains a SQL comment".to_string()));
    }
    for needle in FORBIDDEN_SUBSTRINGS {
        if lowered.contains(needle) {
            return Err(QueryError::InvalidQuery(format!("query references host time via `{needle}`")));
        }
    }

    if allow_reserved_exception && is_reserved_exception(&lowered) {
        return Ok(format!("{without_trailing_semicolon};"));
    }

    if !has_allowed_leading_keyword(&lowered) {
        return Err(QueryError::InvalidQuery("query does not start with an allowed keyword".to_string()));
    }

    Ok(format!("{without_trailing_semicolon};"))
}

fn is_reserved_exception(lowered: &str) -> bool {
    lowered.starts_with("set local role smartcontract")
        || lowered.starts_with("set local statement_timeout")
        || lowered.starts_with("show statement_timeout")
}

fn has_allowed_leading_keyword(lowered: &str) -> bool {
    let mut words = lowered.split_whitespace();
    match words.next() {
        Some("select") | Some("insert") | Some("update") | Some("delete") | Some("with") => true,
        Some("alter") | Some("drop") => matches!(words.next(), Some("index") | Some("table") | Some("type")),
        Some("create") => match words.next() {
            Some("index") | Some("table") | Some("type") => true,
            Some("unique") => matches!(words.next(), Some("index")),
            _ => false,
        },
        _ => false,
    }
}
