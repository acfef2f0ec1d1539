use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::catalog::{Group, PriceRule, Product};
use crate::domain::order::{NewOrder, Order};
use crate::domain::wallet::Wallet;
use crate::models::{GroupId, OrderId, PriceRuleId, ProductId, UserId};
use crate::persistence::core::{
    CatalogReader, ConditionalUpdate, LedgerReader, MembershipReader, OrderReader, StoreError,
    StoreResult, TransactionalStore, UnitOfWork,
};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Committed state sits behind one RwLock and is only written by `commit`.
// A unit of work takes a per-row async lock the first time it touches a stock
// or wallet row and keeps it until it ends, working on private copies of the
// rows it locked. Commit publishes the copies together with the new orders
// under one write lock; dropping the unit discards them.
//
// The state lock is never held while waiting for a row lock.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Stock(ProductId),
    Wallet(UserId),
}

#[derive(Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    price_rules: BTreeMap<PriceRuleId, PriceRule>,
    groups: BTreeMap<GroupId, Group>,
    user_groups: BTreeMap<UserId, BTreeSet<GroupId>>,
    wallets: BTreeMap<UserId, Wallet>,
    orders: BTreeMap<OrderId, Order>,
}

struct Inner {
    state: RwLock<State>,
    row_locks: Mutex<HashMap<RowKey, Arc<Mutex<()>>>>,
    next_order_id: AtomicI64,
    next_rule_id: AtomicI64,
}

#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                row_locks: Mutex::new(HashMap::new()),
                next_order_id: AtomicI64::new(1),
                next_rule_id: AtomicI64::new(1),
            }),
        }
    }

    // ========================================================================
    // Catalogue upkeep
    // ========================================================================

    /// Insert or replace a product
    pub async fn insert_product(&self, product: Product) {
        let mut state = self.inner.state.write().await;
        state.products.insert(product.id, product);
    }

    pub async fn add_price_rule(
        &self,
        product_id: ProductId,
        group_id: Option<GroupId>,
        price: Decimal,
    ) -> PriceRule {
        let rule = PriceRule {
            id: PriceRuleId(self.inner.next_rule_id.fetch_add(1, Ordering::SeqCst)),
            product_id,
            group_id,
            price,
        };

        let mut state = self.inner.state.write().await;
        state.price_rules.insert(rule.id, rule.clone());
        rule
    }

    pub async fn create_group(&self, group: Group) {
        let mut state = self.inner.state.write().await;
        state.groups.insert(group.id, group);
    }

    pub async fn add_user_to_group(&self, user_id: UserId, group_id: GroupId) {
        let mut state = self.inner.state.write().await;
        state.user_groups.entry(user_id).or_default().insert(group_id);
    }

    pub async fn remove_user_from_group(&self, user_id: UserId, group_id: GroupId) {
        let mut state = self.inner.state.write().await;
        if let Some(groups) = state.user_groups.get_mut(&user_id) {
            groups.remove(&group_id);
        }
    }

    /// Tag a product with a group. Returns false if the product does not exist.
    pub async fn add_product_to_group(&self, product_id: ProductId, group_id: GroupId) -> bool {
        let mut state = self.inner.state.write().await;
        match state.products.get_mut(&product_id) {
            Some(product) => {
                product.group_ids.insert(group_id);
                true
            }
            None => false,
        }
    }

    pub async fn remove_product_from_group(&self, product_id: ProductId, group_id: GroupId) {
        let mut state = self.inner.state.write().await;
        if let Some(product) = state.products.get_mut(&product_id) {
            product.group_ids.remove(&group_id);
        }
    }

    /// Delete a group with its memberships, product tags and price rules.
    /// Users and products stay.
    pub async fn delete_group(&self, group_id: GroupId) -> Option<Group> {
        let mut state = self.inner.state.write().await;
        let group = state.groups.remove(&group_id)?;

        for groups in state.user_groups.values_mut() {
            groups.remove(&group_id);
        }
        for product in state.products.values_mut() {
            product.group_ids.remove(&group_id);
        }
        state
            .price_rules
            .retain(|_, rule| rule.group_id != Some(group_id));

        Some(group)
    }
}

#[async_trait]
impl CatalogReader for InMemoryStore {
    async fn find_product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.inner.state.read().await.products.get(&product_id).cloned())
    }

    async fn price_rules_for(&self, product_id: ProductId) -> StoreResult<Vec<PriceRule>> {
        let state = self.inner.state.read().await;
        Ok(state
            .price_rules
            .values()
            .filter(|rule| rule.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MembershipReader for InMemoryStore {
    async fn groups_of_user(&self, user_id: UserId) -> StoreResult<BTreeSet<GroupId>> {
        let state = self.inner.state.read().await;
        Ok(state.user_groups.get(&user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl LedgerReader for InMemoryStore {
    async fn stock_of(&self, product_id: ProductId) -> StoreResult<Option<i64>> {
        let state = self.inner.state.read().await;
        Ok(state.products.get(&product_id).map(|product| product.stock))
    }

    async fn wallet_of(&self, user_id: UserId) -> StoreResult<Option<Wallet>> {
        Ok(self.inner.state.read().await.wallets.get(&user_id).cloned())
    }
}

#[async_trait]
impl OrderReader for InMemoryStore {
    async fn find_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.inner.state.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let state = self.inner.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> StoreResult<InMemoryUnitOfWork> {
        Ok(InMemoryUnitOfWork {
            inner: self.inner.clone(),
            locks: HashMap::new(),
            stock: BTreeMap::new(),
            balances: BTreeMap::new(),
            new_wallets: BTreeMap::new(),
            orders: Vec::new(),
        })
    }
}

// ============================================================================
// Unit of Work
// ============================================================================

pub struct InMemoryUnitOfWork {
    inner: Arc<Inner>,
    locks: HashMap<RowKey, OwnedMutexGuard<()>>,
    stock: BTreeMap<ProductId, i64>,
    balances: BTreeMap<UserId, Decimal>,
    new_wallets: BTreeMap<UserId, Wallet>,
    orders: Vec<Order>,
}

impl InMemoryUnitOfWork {
    /// Take the row lock once; later touches of the same row reuse it
    async fn lock_row(&mut self, key: RowKey) {
        if self.locks.contains_key(&key) {
            return;
        }

        let row = {
            let mut registry = self.inner.row_locks.lock().await;
            registry.entry(key).or_default().clone()
        };

        let guard = row.lock_owned().await;
        self.locks.insert(key, guard);
    }

    async fn current_stock(&mut self, product_id: ProductId) -> Option<i64> {
        self.lock_row(RowKey::Stock(product_id)).await;

        if let Some(stock) = self.stock.get(&product_id) {
            return Some(*stock);
        }

        let committed = {
            let state = self.inner.state.read().await;
            let stock = state.products.get(&product_id).map(|product| product.stock);
            stock
        }?;
        self.stock.insert(product_id, committed);
        Some(committed)
    }

    async fn current_balance(&mut self, user_id: UserId) -> Option<Decimal> {
        self.lock_row(RowKey::Wallet(user_id)).await;

        if let Some(balance) = self.balances.get(&user_id) {
            return Some(*balance);
        }

        let committed = match self.new_wallets.get(&user_id) {
            Some(wallet) => wallet.balance,
            None => {
                let state = self.inner.state.read().await;
                let balance = state.wallets.get(&user_id).map(|wallet| wallet.balance);
                balance?
            }
        };
        self.balances.insert(user_id, committed);
        Some(committed)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> StoreResult<ConditionalUpdate<i64>> {
        let Some(current) = self.current_stock(product_id).await else {
            return Ok(ConditionalUpdate::Missing);
        };

        if current < quantity {
            return Ok(ConditionalUpdate::Rejected { current });
        }

        let remaining = current - quantity;
        self.stock.insert(product_id, remaining);
        Ok(ConditionalUpdate::Applied(remaining))
    }

    async fn increment_stock(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> StoreResult<Option<i64>> {
        let Some(current) = self.current_stock(product_id).await else {
            return Ok(None);
        };

        // Postgres answers the same overflow with "bigint out of range"
        let stock = current.checked_add(quantity).ok_or_else(|| {
            StoreError::Other(anyhow::anyhow!("stock of product {product_id} out of range"))
        })?;
        self.stock.insert(product_id, stock);
        Ok(Some(stock))
    }

    async fn debit_balance(
        &mut self,
        user_id: UserId,
        amount: Decimal,
    ) -> StoreResult<ConditionalUpdate<Decimal>> {
        let Some(current) = self.current_balance(user_id).await else {
            return Ok(ConditionalUpdate::Missing);
        };

        if current < amount {
            return Ok(ConditionalUpdate::Rejected { current });
        }

        let balance = current - amount;
        self.balances.insert(user_id, balance);
        Ok(ConditionalUpdate::Applied(balance))
    }

    async fn credit_balance(
        &mut self,
        user_id: UserId,
        amount: Decimal,
    ) -> StoreResult<Option<Decimal>> {
        let Some(current) = self.current_balance(user_id).await else {
            return Ok(None);
        };

        let balance = current.checked_add(amount).ok_or_else(|| {
            StoreError::Other(anyhow::anyhow!("balance of user {user_id} out of range"))
        })?;
        self.balances.insert(user_id, balance);
        Ok(Some(balance))
    }

    async fn insert_wallet(&mut self, user_id: UserId, currency: &str) -> StoreResult<Wallet> {
        self.lock_row(RowKey::Wallet(user_id)).await;

        let exists = self.new_wallets.contains_key(&user_id)
            || self.inner.state.read().await.wallets.contains_key(&user_id);
        if exists {
            return Err(StoreError::UniqueViolation {
                constraint: Some("wallets_user_id_key".to_string()),
                message: format!("wallet for user {} already exists", user_id),
            });
        }

        let wallet = Wallet::empty(user_id, currency);
        self.new_wallets.insert(user_id, wallet.clone());
        Ok(wallet)
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let id = OrderId(self.inner.next_order_id.fetch_add(1, Ordering::SeqCst));
        let order = Order::from_new(id, order, Utc::now());
        self.orders.push(order.clone());
        Ok(order)
    }

    async fn commit(self) -> StoreResult<()> {
        let mut state = self.inner.state.write().await;

        for (user_id, wallet) in &self.new_wallets {
            state.wallets.insert(*user_id, wallet.clone());
        }
        for (product_id, stock) in &self.stock {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock = *stock;
            }
        }
        for (user_id, balance) in &self.balances {
            if let Some(wallet) = state.wallets.get_mut(user_id) {
                wallet.balance = *balance;
            }
        }
        for order in &self.orders {
            state.orders.insert(order.id, order.clone());
        }

        // Row locks are released after the new values are visible
        drop(state);
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderLine, OrderLineRequest, OrderStatus};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_product(Product::new(ProductId(1), "Pen", "PEN-1", 3))
            .await;
        let mut uow = store.begin().await.unwrap();
        uow.insert_wallet(UserId(1), "USD").await.unwrap();
        uow.credit_balance(UserId(1), dec!(40)).await.unwrap();
        uow.commit().await.unwrap();
        store
    }

    fn new_order(total: Decimal) -> NewOrder {
        NewOrder {
            user_id: UserId(1),
            status: OrderStatus::Paid,
            total,
            lines: vec![OrderLine::priced(OrderLineRequest::new(ProductId(1), 1), total).unwrap()],
            address: None,
            payment_method: None,
        }
    }

    #[tokio::test]
    async fn test_wallet_opened_and_credited_in_one_unit() {
        let store = seeded().await;
        let wallet = store.wallet_of(UserId(1)).await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(40));
        assert_eq!(wallet.currency, "USD");
    }

    #[tokio::test]
    async fn test_commit_publishes_everything_together() {
        let store = seeded().await;

        let mut uow = store.begin().await.unwrap();
        assert_eq!(
            uow.decrement_stock(ProductId(1), 1).await.unwrap(),
            ConditionalUpdate::Applied(2)
        );
        uow.debit_balance(UserId(1), dec!(10)).await.unwrap();
        let order = uow.insert_order(new_order(dec!(10))).await.unwrap();

        assert!(store.find_order(order.id).await.unwrap().is_none());
        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(3));

        uow.commit().await.unwrap();

        assert!(store.find_order(order.id).await.unwrap().is_some());
        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(2));
        assert_eq!(store.wallet_of(UserId(1)).await.unwrap().unwrap().balance, dec!(30));
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let store = seeded().await;

        let mut uow = store.begin().await.unwrap();
        uow.decrement_stock(ProductId(1), 3).await.unwrap();
        uow.debit_balance(UserId(1), dec!(40)).await.unwrap();
        uow.insert_order(new_order(dec!(40))).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(3));
        assert_eq!(store.wallet_of(UserId(1)).await.unwrap().unwrap().balance, dec!(40));
        assert!(store.orders_for_user(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_updates() {
        let store = seeded().await;
        let mut uow = store.begin().await.unwrap();

        assert_eq!(
            uow.decrement_stock(ProductId(1), 4).await.unwrap(),
            ConditionalUpdate::Rejected { current: 3 }
        );
        assert_eq!(
            uow.debit_balance(UserId(1), dec!(40.01)).await.unwrap(),
            ConditionalUpdate::Rejected { current: dec!(40) }
        );
        assert_eq!(
            uow.decrement_stock(ProductId(2), 1).await.unwrap(),
            ConditionalUpdate::Missing
        );
        assert_eq!(uow.credit_balance(UserId(2), dec!(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increments_out_of_range_fail_without_change() {
        let store = seeded().await;
        let mut uow = store.begin().await.unwrap();

        let err = uow.increment_stock(ProductId(1), i64::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));
        let err = uow.credit_balance(UserId(1), Decimal::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));

        assert_eq!(uow.increment_stock(ProductId(1), 1).await.unwrap(), Some(4));
        assert_eq!(uow.credit_balance(UserId(1), dec!(2)).await.unwrap(), Some(dec!(42)));
    }

    #[tokio::test]
    async fn test_row_lock_serializes_units() {
        let store = seeded().await;

        let mut first = store.begin().await.unwrap();
        first.decrement_stock(ProductId(1), 3).await.unwrap();

        let contender = store.clone();
        let handle = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            let outcome = second.decrement_stock(ProductId(1), 1).await.unwrap();
            second.commit().await.unwrap();
            outcome
        });

        // The second unit waits on the row held by the first
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        first.commit().await.unwrap();
        assert_eq!(handle.await.unwrap(), ConditionalUpdate::Rejected { current: 0 });
        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_duplicate_wallet_is_unique_violation() {
        let store = seeded().await;
        let mut uow = store.begin().await.unwrap();
        let err = uow.insert_wallet(UserId(1), "USD").await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_orders_for_user_newest_first() {
        let store = seeded().await;

        for total in [dec!(1), dec!(2)] {
            let mut uow = store.begin().await.unwrap();
            uow.insert_order(new_order(total)).await.unwrap();
            uow.commit().await.unwrap();
        }

        let orders = store.orders_for_user(UserId(1)).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].total, dec!(2));
        assert!(store.orders_for_user(UserId(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_membership_removal() {
        let store = seeded().await;
        store.add_user_to_group(UserId(1), GroupId(2)).await;
        store.add_user_to_group(UserId(1), GroupId(3)).await;
        store.add_product_to_group(ProductId(1), GroupId(2)).await;
        assert!(!store.add_product_to_group(ProductId(9), GroupId(2)).await);

        store.remove_user_from_group(UserId(1), GroupId(2)).await;
        store.remove_product_from_group(ProductId(1), GroupId(2)).await;

        let groups = store.groups_of_user(UserId(1)).await.unwrap();
        assert_eq!(groups.into_iter().collect::<Vec<_>>(), vec![GroupId(3)]);
        let product = store.find_product(ProductId(1)).await.unwrap().unwrap();
        assert!(product.group_ids.is_empty());
    }

    #[tokio::test]
    async fn test_delete_group_cascades_links_only() {
        let store = seeded().await;
        store
            .create_group(Group {
                id: GroupId(5),
                name: "wholesale".to_string(),
                description: None,
            })
            .await;
        store.add_user_to_group(UserId(1), GroupId(5)).await;
        assert!(store.add_product_to_group(ProductId(1), GroupId(5)).await);
        store.add_price_rule(ProductId(1), Some(GroupId(5)), dec!(8)).await;
        store.add_price_rule(ProductId(1), None, dec!(10)).await;

        assert!(store.delete_group(GroupId(5)).await.is_some());

        assert!(store.groups_of_user(UserId(1)).await.unwrap().is_empty());
        let product = store.find_product(ProductId(1)).await.unwrap().unwrap();
        assert!(product.group_ids.is_empty());
        let rules = store.price_rules_for(ProductId(1)).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].is_default());
        assert!(store.wallet_of(UserId(1)).await.unwrap().is_some());
    }
}
