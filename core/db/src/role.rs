use sqlx::Executor;

/// The two roles spec.md §6.2 requires: contract code always runs as
/// `smartcontract`; the framework switches to `smartcontractmanager` only
/// to record or remove a `basics.contracts` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SmartContract,
    SmartContractManager,
}

impl Role {
    pub fn as_sql_identifier(self) -> &'static str {
        match self {
            Role::SmartContract => "smartcontract",
            Role::SmartContractManager => "smartcontractmanager",
        }
    }
}

/// `SET LOCAL ROLE <role>`, scoped to the enclosing SQL transaction
/// (spec.md §5, §9).
pub async fn set_local_role<'c, E>(executor: E, role: Role) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = sqlx::Postgres>,
{
    let sql = format!("SET LOCAL ROLE {}", role.as_sql_identifier());
    executor.execute(sql.as_str()).await?;
    Ok(())
}
