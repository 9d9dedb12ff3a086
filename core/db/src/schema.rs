use sqlx::PgPool;

/// Bootstrap DDL for `basics.contracts` and the two execution roles
/// (spec.md §6.2). Spec.md treats the DDL itself as out of scope for the
/// behavioural specification, but the adapter's own tests need a real
/// schema to run against, so it ships here as ambient test tooling.
pub const BOOTSTRAP_DDL: &str = r#"
CREATE SCHEMA IF NOT EXISTS basics;

CREATE TABLE IF NOT EXISTS basics.contracts (
    contract_hash BYTEA PRIMARY KEY,
    type TEXT NOT NULL,
    version TEXT NOT NULL,
    description TEXT NOT NULL,
    creator BYTEA NOT NULL,
    template JSONB NOT NULL,
    code_bytes BYTEA NOT NULL,
    validana_version SMALLINT NOT NULL
);

DO $do$ BEGIN
    CREATE ROLE smartcontract NOLOGIN;
EXCEPTION WHEN duplicate_object THEN NULL; END $do$;

DO $do$ BEGIN
    CREATE ROLE smartcontractmanager NOLOGIN;
EXCEPTION WHEN duplicate_object THEN NULL; END $do$;

GRANT USAGE ON SCHEMA basics TO smartcontractmanager;
GRANT SELECT, INSERT, DELETE ON basics.contracts TO smartcontractmanager;
GRANT USAGE ON SCHEMA public TO smartcontract;

REVOKE EXECUTE ON FUNCTION random() FROM PUBLIC;
REVOKE EXECUTE ON FUNCTION now() FROM PUBLIC;
REVOKE EXECUTE ON FUNCTION clock_timestamp() FROM PUBLIC;
REVOKE EXECUTE ON FUNCTION statement_timestamp() FROM PUBLIC;
REVOKE EXECUTE ON FUNCTION transaction_timestamp() FROM PUBLIC;
"#;

/// Apply [`BOOTSTRAP_DDL`] against `pool`. Idempotent: every statement in
/// the DDL is `IF NOT EXISTS`/`duplicate_object`-guarded.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(BOOTSTRAP_DDL).execute(pool).await?;
    Ok(())
}
