use rust_decimal::Decimal;
use std::sync::Arc;

use super::errors::WalletError;
use super::value_objects::Wallet;
use crate::metrics::Metrics;
use crate::models::UserId;
use crate::persistence::{
    ConditionalUpdate, LedgerReader, StoreError, TransactionalStore, UnitOfWork,
};

// ============================================================================
// Wallet Ledger
// ============================================================================
//
// Authoritative balance per user. Debits are conditional ("only if the
// balance covers the amount") and applied by the store in one statement, so
// two concurrent debits can never both pass a stale balance check.
// Credits are unconditional and only used for top-ups.
//
// ============================================================================

#[derive(Clone)]
pub struct WalletLedger {
    metrics: Arc<Metrics>,
}

impl WalletLedger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Debit `amount` inside `uow`. Returns the balance left.
    pub async fn debit<U: UnitOfWork>(
        &self,
        uow: &mut U,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<Decimal, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }

        match uow.debit_balance(user_id, amount).await? {
            ConditionalUpdate::Applied(balance) => {
                tracing::debug!(user_id = %user_id, amount = %amount, balance = %balance, "Debited wallet");
                Ok(balance)
            }
            ConditionalUpdate::Rejected { current } => {
                self.metrics.record_debit_rejection();
                tracing::info!(
                    user_id = %user_id,
                    required = %amount,
                    available = %current,
                    "Wallet debit refused"
                );
                Err(WalletError::InsufficientBalance {
                    user_id,
                    required: amount,
                    available: current,
                })
            }
            ConditionalUpdate::Missing => Err(WalletError::WalletNotFound(user_id)),
        }
    }

    /// Credit `amount` inside `uow`. Returns the new balance.
    pub async fn credit<U: UnitOfWork>(
        &self,
        uow: &mut U,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<Decimal, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }

        let balance = uow
            .credit_balance(user_id, amount)
            .await?
            .ok_or(WalletError::WalletNotFound(user_id))?;

        self.metrics.record_credit();
        Ok(balance)
    }

    /// Credit in a unit of work of its own
    pub async fn top_up<S: TransactionalStore>(
        &self,
        store: &S,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<Decimal, WalletError> {
        let mut uow = store.begin().await?;
        let balance = self.credit(&mut uow, user_id, amount).await?;
        uow.commit().await?;

        tracing::info!(user_id = %user_id, amount = %amount, balance = %balance, "💰 Wallet topped up");
        Ok(balance)
    }

    /// Create the zero-balance wallet of a newly registered user
    pub async fn open_wallet<S: TransactionalStore>(
        &self,
        store: &S,
        user_id: UserId,
        currency: &str,
    ) -> Result<Wallet, WalletError> {
        let mut uow = store.begin().await?;
        let wallet = match uow.insert_wallet(user_id, currency).await {
            Ok(wallet) => wallet,
            Err(StoreError::UniqueViolation { .. }) => {
                return Err(WalletError::WalletAlreadyExists(user_id))
            }
            Err(e) => return Err(e.into()),
        };
        uow.commit().await?;

        tracing::info!(user_id = %user_id, currency, "👛 Opened wallet");
        Ok(wallet)
    }

    /// Committed wallet of a user
    pub async fn balance<R: LedgerReader>(
        &self,
        reader: &R,
        user_id: UserId,
    ) -> Result<Wallet, WalletError> {
        reader
            .wallet_of(user_id)
            .await?
            .ok_or(WalletError::WalletNotFound(user_id))
    }
}
