//! Domain types for the ledger write path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, OperationTypeId, TransactionId};

use super::error::LedgerError;

/// A customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identifier.
    pub id: AccountId,
    /// Unique business key.
    pub document_number: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An account that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Unique business key.
    pub document_number: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Direction of an operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    /// Money leaving the account (-1).
    Debit,
    /// Money entering the account (+1).
    Credit,
}

impl Sign {
    /// The multiplier stored in reference data.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Debit => -1,
            Self::Credit => 1,
        }
    }

    /// Applies this sign to the magnitude of `amount`.
    ///
    /// The caller's own sign is discarded: `|amount|` is always recomputed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` when `|amount|` does not fit in `i64`.
    pub fn apply(self, amount: i64) -> Result<i64, LedgerError> {
        let magnitude = amount.checked_abs().ok_or(LedgerError::InvalidAmount)?;
        Ok(match self {
            Self::Debit => -magnitude,
            Self::Credit => magnitude,
        })
    }
}

impl TryFrom<i16> for Sign {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Debit),
            1 => Ok(Self::Credit),
            other => Err(other),
        }
    }
}

/// An operation type as stored in reference data.
///
/// `sign` is kept raw so that corrupt rows surface as
/// `LedgerError::InvalidOperation` instead of failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationType {
    /// Identifier.
    pub id: OperationTypeId,
    /// Display text.
    pub description: String,
    /// Stored multiplier; valid values are -1 and +1.
    pub sign: i16,
}

impl OperationType {
    /// Creates an operation type with a valid sign.
    #[must_use]
    pub fn new(id: i32, description: impl Into<String>, sign: Sign) -> Self {
        Self {
            id: OperationTypeId::new(id),
            description: description.into(),
            sign: sign.as_i16(),
        }
    }

    /// Resolves the stored multiplier.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidOperation` unless the stored sign is exactly -1 or +1.
    pub fn resolve_sign(&self) -> Result<Sign, LedgerError> {
        Sign::try_from(self.sign).map_err(|sign| LedgerError::InvalidOperation {
            operation_type_id: self.id,
            sign,
        })
    }
}

/// Normal purchase (debit).
pub const NORMAL_PURCHASE: OperationTypeId = OperationTypeId(1);
/// Purchase with installments (debit).
pub const PURCHASE_WITH_INSTALLMENTS: OperationTypeId = OperationTypeId(2);
/// Withdrawal (debit).
pub const WITHDRAWAL: OperationTypeId = OperationTypeId(3);
/// Credit voucher (credit).
pub const CREDIT_VOUCHER: OperationTypeId = OperationTypeId(4);

/// Reference operation types seeded into every store.
#[must_use]
pub fn default_operation_types() -> Vec<OperationType> {
    vec![
        OperationType::new(NORMAL_PURCHASE.0, "Normal Purchase", Sign::Debit),
        OperationType::new(
            PURCHASE_WITH_INSTALLMENTS.0,
            "Purchase with installments",
            Sign::Debit,
        ),
        OperationType::new(WITHDRAWAL.0, "Withdrawal", Sign::Debit),
        OperationType::new(CREDIT_VOUCHER.0, "Credit Voucher", Sign::Credit),
    ]
}

/// An immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned identifier.
    pub id: TransactionId,
    /// Account the event is recorded against.
    pub account_id: AccountId,
    /// Operation type that decided the sign.
    pub operation_type_id: OperationTypeId,
    /// Signed amount in minor currency units.
    pub amount_minor_units: i64,
    /// When the event happened.
    pub event_date: DateTime<Utc>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// A transaction that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Account the event is recorded against.
    pub account_id: AccountId,
    /// Operation type that decided the sign.
    pub operation_type_id: OperationTypeId,
    /// Signed amount in minor currency units.
    pub amount_minor_units: i64,
    /// When the event happened.
    pub event_date: DateTime<Utc>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Attaches the store-assigned identifier.
    #[must_use]
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            operation_type_id: self.operation_type_id,
            amount_minor_units: self.amount_minor_units,
            event_date: self.event_date,
            created_at: self.created_at,
        }
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransactionInput {
    /// Target account.
    pub account_id: AccountId,
    /// Operation type deciding the sign.
    pub operation_type_id: OperationTypeId,
    /// Positive magnitude in minor units.
    pub amount_minor_units: i64,
}
