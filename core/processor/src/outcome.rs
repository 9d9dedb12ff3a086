/// The five `processTx` response statuses (spec.md §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Contract returned without error. Carries the contract's result
    /// message (`"OK"` for v1, the returned string for v2).
    Accepted(String),
    /// A v1 contract returned something other than the exact string `"OK"`.
    /// Should still commit and land in a block.
    V1Rejected(String),
    /// Explicit `reject(reason)`, or a template mismatch against a known,
    /// existing contract.
    Rejected(String),
    /// Malformed transaction, bad signature, expired, an execution fault,
    /// forbidden SQL, or a failed create/delete. Roll back; never block.
    Invalid(String),
    /// No DB connection, or no sign prefix configured. Try again later.
    Retry(String),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Accepted(m) | Outcome::V1Rejected(m) | Outcome::Rejected(m) | Outcome::Invalid(m) | Outcome::Retry(m) => m,
        }
    }
}
