use async_trait::async_trait;
use rust_decimal::Decimal;

use super::errors::StoreResult;
use crate::domain::order::{NewOrder, Order};
use crate::domain::wallet::Wallet;
use crate::models::{ProductId, UserId};

// ============================================================================
// Unit of Work - Transactional Ledger Mutation
// ============================================================================
//
// Key Principles:
// 1. Ledger rows change only through conditional updates
//    ("decrement only if the current value covers it"), never read-then-write
// 2. Nothing done inside a unit is visible to other readers before commit
// 3. A unit that is dropped without commit rolls back everything it did,
//    so a cancelled or timed-out caller never leaves partial effects
// 4. A unit holds row locks from its first touch of a row until it ends;
//    callers touch stock rows in ascending product id order, wallet last
//
// ============================================================================

/// Outcome of a conditional "update where value covers amount" statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalUpdate<T> {
    /// Condition held; carries the value after the update
    Applied(T),
    /// Condition failed; the row is unchanged and carries its current value
    Rejected { current: T },
    /// The row does not exist
    Missing,
}

/// A single atomic unit of work across the stock, wallet and order tables.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Decrement a product's stock by `quantity` only if stock >= quantity
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> StoreResult<ConditionalUpdate<i64>>;

    /// Unconditionally add `quantity` to a product's stock.
    /// Returns the new stock, or `None` when the product does not exist.
    async fn increment_stock(&mut self, product_id: ProductId, quantity: i64)
        -> StoreResult<Option<i64>>;

    /// Decrement a wallet balance by `amount` only if balance >= amount
    async fn debit_balance(
        &mut self,
        user_id: UserId,
        amount: Decimal,
    ) -> StoreResult<ConditionalUpdate<Decimal>>;

    /// Unconditionally add `amount` to a wallet balance.
    /// Returns the new balance, or `None` when the wallet does not exist.
    async fn credit_balance(&mut self, user_id: UserId, amount: Decimal)
        -> StoreResult<Option<Decimal>>;

    /// Create a zero-balance wallet. Fails with `StoreError::UniqueViolation`
    /// when the user already has one.
    async fn insert_wallet(&mut self, user_id: UserId, currency: &str) -> StoreResult<Wallet>;

    /// Persist an order header and its lines; returns the stored order with
    /// its assigned id and creation time.
    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order>;

    /// Make every change of this unit visible atomically
    async fn commit(self) -> StoreResult<()>;

    /// Discard every change of this unit
    async fn rollback(self) -> StoreResult<()>;
}

/// A store able to open units of work
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    type UnitOfWork: UnitOfWork;

    async fn begin(&self) -> StoreResult<Self::UnitOfWork>;
}
