//! Ledger schema migration.
//!
//! Creates accounts, operation types and the append-only transactions table,
//! and seeds the reference operation types.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TABLES
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(OPERATION_TYPES_SQL).await?;
        db.execute_unprepared(TRANSACTIONS_SQL).await?;

        // ============================================================
        // PART 2: REFERENCE DATA
        // ============================================================
        db.execute_unprepared(SEED_OPERATION_TYPES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS transactions CASCADE;
             DROP TABLE IF EXISTS operation_types CASCADE;
             DROP TABLE IF EXISTS accounts CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id BIGSERIAL PRIMARY KEY,
    document_number TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_accounts_document_number UNIQUE (document_number),
    CONSTRAINT chk_document_number_not_empty CHECK (document_number <> '')
);
";

const OPERATION_TYPES_SQL: &str = r"
CREATE TABLE operation_types (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    sign SMALLINT NOT NULL,
    CONSTRAINT chk_operation_type_sign CHECK (sign IN (-1, 1))
);
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id BIGSERIAL PRIMARY KEY,
    account_id BIGINT NOT NULL REFERENCES accounts(id),
    operation_type_id INTEGER NOT NULL REFERENCES operation_types(id),
    amount_minor_units BIGINT NOT NULL,
    event_date TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_not_zero CHECK (amount_minor_units <> 0)
);

-- Per-account history lookups
CREATE INDEX idx_transactions_account ON transactions(account_id);
";

const SEED_OPERATION_TYPES_SQL: &str = r"
INSERT INTO operation_types (id, description, sign) VALUES
    (1, 'Normal Purchase', -1),
    (2, 'Purchase with installments', -1),
    (3, 'Withdrawal', -1),
    (4, 'Credit Voucher', 1)
ON CONFLICT (id) DO NOTHING;
";
