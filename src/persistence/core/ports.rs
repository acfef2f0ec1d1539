use async_trait::async_trait;
use std::collections::BTreeSet;

use super::errors::StoreResult;
use super::unit_of_work::TransactionalStore;
use crate::domain::catalog::{PriceRule, Product};
use crate::domain::order::Order;
use crate::domain::wallet::Wallet;
use crate::models::{GroupId, OrderId, ProductId, UserId};

// ============================================================================
// Read Ports
// ============================================================================
//
// Committed-state reads consumed by the engine. The catalogue and the group
// memberships are owned by the CRUD layer; the engine only reads them.
//
// ============================================================================

#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Product with its visibility group tags, `None` if it does not exist
    async fn find_product(&self, product_id: ProductId) -> StoreResult<Option<Product>>;

    /// Every price rule of a product, in rule id order
    async fn price_rules_for(&self, product_id: ProductId) -> StoreResult<Vec<PriceRule>>;
}

#[async_trait]
pub trait MembershipReader: Send + Sync {
    async fn groups_of_user(&self, user_id: UserId) -> StoreResult<BTreeSet<GroupId>>;
}

#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Committed stock count, `None` if the product does not exist
    async fn stock_of(&self, product_id: ProductId) -> StoreResult<Option<i64>>;

    async fn wallet_of(&self, user_id: UserId) -> StoreResult<Option<Wallet>>;
}

#[async_trait]
pub trait OrderReader: Send + Sync {
    async fn find_order(&self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// A user's orders, newest first
    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;
}

/// Everything the fulfillment engine needs from a store
pub trait Store:
    CatalogReader + MembershipReader + LedgerReader + OrderReader + TransactionalStore
{
}

impl<T> Store for T where
    T: CatalogReader + MembershipReader + LedgerReader + OrderReader + TransactionalStore
{
}
