//! Property-based tests for LedgerService.
//!
//! - Sign normalization: stored amount is always `sign × |amount|`
//! - Non-positive amounts never reach the store
//! - Unknown accounts and corrupt signs are reported with their own category

use proptest::prelude::*;
use tally_shared::types::{AccountId, OperationTypeId};

use super::context::{Cancellation, ExecutionContext};
use super::error::LedgerError;
use super::types::{CreateTransactionInput, OperationType, Sign, default_operation_types};
use crate::memory::MemoryLedger;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

/// Strategy picking one of the seeded operation types.
fn seeded_operation_type() -> impl Strategy<Value = OperationType> {
    prop::sample::select(default_operation_types())
}

/// Strategy for stored signs other than -1 and +1.
fn corrupt_sign() -> impl Strategy<Value = i16> {
    any::<i16>().prop_filter("valid signs excluded", |s| *s != -1 && *s != 1)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_amount_takes_operation_type_sign(
        amount in 1i64..=i64::MAX,
        operation_type in seeded_operation_type(),
    ) {
        let ledger = MemoryLedger::with_default_operation_types();
        let service = ledger.service();
        let ctx = ExecutionContext::detached(Cancellation::new());

        let tx = block_on(async {
            let account = service.create_account(&ctx, "1").await?;
            service
                .create_transaction(
                    &ctx,
                    CreateTransactionInput {
                        account_id: account.id,
                        operation_type_id: operation_type.id,
                        amount_minor_units: amount,
                    },
                )
                .await
        })
        .unwrap();

        let expected = match operation_type.resolve_sign().unwrap() {
            Sign::Debit => -amount,
            Sign::Credit => amount,
        };
        prop_assert_eq!(tx.amount_minor_units, expected);
        prop_assert_eq!(tx.amount_minor_units.signum(), i64::from(operation_type.sign));
    }

    #[test]
    fn prop_non_positive_amount_is_rejected(amount in i64::MIN..=0i64) {
        let ledger = MemoryLedger::with_default_operation_types();
        let service = ledger.service();
        let ctx = ExecutionContext::detached(Cancellation::new());

        let result = block_on(service.create_transaction(
            &ctx,
            CreateTransactionInput {
                account_id: AccountId::new(1),
                operation_type_id: OperationTypeId::new(1),
                amount_minor_units: amount,
            },
        ));

        prop_assert!(matches!(result, Err(LedgerError::InvalidAmount)));
        prop_assert_eq!(ledger.begin_count(), 0);
    }

    #[test]
    fn prop_unknown_account_is_not_found(account_id in 2i64..i64::MAX, amount in 1i64..1_000_000) {
        let ledger = MemoryLedger::with_default_operation_types();
        let service = ledger.service();
        let ctx = ExecutionContext::detached(Cancellation::new());

        let result = block_on(async {
            service.create_account(&ctx, "only-account").await?;
            service
                .create_transaction(
                    &ctx,
                    CreateTransactionInput {
                        account_id: AccountId::new(account_id),
                        operation_type_id: OperationTypeId::new(4),
                        amount_minor_units: amount,
                    },
                )
                .await
        });

        prop_assert!(matches!(result, Err(LedgerError::AccountNotFound(id)) if id.0 == account_id));
        prop_assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn prop_corrupt_sign_is_invalid_operation(sign in corrupt_sign(), amount in 1i64..1_000_000) {
        let ledger = MemoryLedger::new();
        ledger.seed_operation_type(OperationType {
            sign,
            ..OperationType::new(1, "Corrupt", Sign::Debit)
        });
        let service = ledger.service();
        let ctx = ExecutionContext::detached(Cancellation::new());

        let result = block_on(async {
            let account = service.create_account(&ctx, "1").await?;
            service
                .create_transaction(
                    &ctx,
                    CreateTransactionInput {
                        account_id: account.id,
                        operation_type_id: OperationTypeId::new(1),
                        amount_minor_units: amount,
                    },
                )
                .await
        });

        let is_invalid_operation = matches!(result, Err(LedgerError::InvalidOperation { .. }));
        prop_assert!(is_invalid_operation);
        prop_assert!(ledger.transactions().is_empty());
    }
}
