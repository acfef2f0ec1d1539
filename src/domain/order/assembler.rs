use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use super::commands::PlaceOrder;
use super::errors::OrderError;
use super::value_objects::{Order, OrderLine, PendingOrder};
use crate::domain::catalog::{is_visible_to, PriceResolver};
use crate::domain::inventory::StockLedger;
use crate::domain::wallet::WalletLedger;
use crate::metrics::Metrics;
use crate::models::GroupId;
use crate::persistence::{Store, UnitOfWork};

// ============================================================================
// Order Assembler
// ============================================================================
//
// Orchestrates: Command → Resolution → Unit of Work (stock, wallet, order)
//
// Resolution (memberships, products, prices) is read-only and finishes before
// the unit of work begins. Inside the unit, stock rows are reserved in
// ascending product id order and the wallet is debited last, so concurrent
// units always take row locks in the same order.
//
// ============================================================================

pub struct OrderAssembler<S> {
    store: Arc<S>,
    pricing: PriceResolver<S>,
    stock: StockLedger,
    wallet: WalletLedger,
    metrics: Arc<Metrics>,
    placement_timeout: Option<Duration>,
}

impl<S: Store> OrderAssembler<S> {
    pub fn new(store: Arc<S>, metrics: Arc<Metrics>) -> Self {
        Self {
            pricing: PriceResolver::new(store.clone()),
            stock: StockLedger::new(metrics.clone()),
            wallet: WalletLedger::new(metrics.clone()),
            store,
            metrics,
            placement_timeout: None,
        }
    }

    /// Abort (and roll back) placements that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.placement_timeout = Some(timeout);
        self
    }

    pub fn stock_ledger(&self) -> &StockLedger {
        &self.stock
    }

    pub fn wallet_ledger(&self) -> &WalletLedger {
        &self.wallet
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Place an order: price every line, then reserve stock, debit the wallet
    /// and persist the order as one unit of work.
    pub async fn place_order(&self, command: PlaceOrder) -> Result<Order, OrderError> {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "place_order",
            user_id = %command.user_id,
            %correlation_id
        );

        async move {
            let started = Instant::now();

            let result = match self.placement_timeout {
                Some(limit) => tokio::time::timeout(limit, self.execute(command))
                    .await
                    .unwrap_or_else(|_| Err(OrderError::TimedOut(limit))),
                None => self.execute(command).await,
            };

            let elapsed = started.elapsed().as_secs_f64();
            match &result {
                Ok(order) => {
                    self.metrics.record_order_placed(elapsed);
                    tracing::info!(
                        order_id = %order.id,
                        total = %order.total,
                        lines = order.lines.len(),
                        "✅ Order placed"
                    );
                }
                Err(e) => {
                    self.metrics.record_order_rejected(e.reason(), elapsed);
                    tracing::warn!(
                        reason = e.reason(),
                        category = ?e.category(),
                        error = %e,
                        "❌ Order rejected"
                    );
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, command: PlaceOrder) -> Result<Order, OrderError> {
        command.validate()?;

        let groups = self.store.groups_of_user(command.user_id).await?;
        let pending = self.price_lines(command, &groups).await?;

        if self.store.wallet_of(pending.user_id).await?.is_none() {
            return Err(OrderError::WalletNotFound(pending.user_id));
        }

        let mut uow = self.store.begin().await?;
        match self.apply(&mut uow, pending).await {
            Ok(order) => {
                uow.commit().await?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Resolve every line against one membership snapshot
    async fn price_lines(
        &self,
        command: PlaceOrder,
        groups: &BTreeSet<GroupId>,
    ) -> Result<PendingOrder, OrderError> {
        let mut lines = Vec::with_capacity(command.lines.len());

        for request in command.lines {
            let product = self
                .store
                .find_product(request.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(request.product_id))?;

            if !product.is_active || !is_visible_to(&product, groups) {
                tracing::debug!(
                    product_id = %product.id,
                    is_active = product.is_active,
                    "Product not orderable by caller"
                );
                return Err(OrderError::ProductNotFound(product.id));
            }

            let unit_price = self.pricing.resolve_price(product.id, groups).await?;
            let line = OrderLine::priced(request, unit_price).ok_or(OrderError::InvalidQuantity {
                product_id: request.product_id,
                quantity: request.quantity,
            })?;
            lines.push(line);
        }

        PendingOrder::new(
            command.user_id,
            lines,
            command.address,
            command.payment_method,
        )
    }

    async fn apply(
        &self,
        uow: &mut S::UnitOfWork,
        pending: PendingOrder,
    ) -> Result<Order, OrderError> {
        for line in pending.lines_by_product() {
            self.stock.reserve(uow, line.product_id, line.quantity).await?;
        }

        self.wallet.debit(uow, pending.user_id, pending.total()).await?;

        Ok(uow.insert_order(pending.into_paid()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Product;
    use crate::domain::order::OrderStatus;
    use crate::domain::wallet::DEFAULT_CURRENCY;
    use crate::models::{ProductId, UserId};
    use crate::persistence::{InMemoryStore, LedgerReader, OrderReader};
    use rust_decimal_macros::dec;

    async fn setup() -> (Arc<InMemoryStore>, OrderAssembler<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let assembler = OrderAssembler::new(store.clone(), Arc::new(Metrics::new().unwrap()));

        store
            .insert_product(Product::new(ProductId(1), "Mug", "MUG-1", 10))
            .await;
        store.add_price_rule(ProductId(1), None, dec!(12.50)).await;

        assembler
            .wallet_ledger()
            .open_wallet(store.as_ref(), UserId(1), DEFAULT_CURRENCY)
            .await
            .unwrap();
        assembler
            .wallet_ledger()
            .top_up(store.as_ref(), UserId(1), dec!(100))
            .await
            .unwrap();

        (store, assembler)
    }

    #[tokio::test]
    async fn test_place_order_persists_notes_and_prices() {
        let (store, assembler) = setup().await;

        let order = assembler
            .place_order(
                PlaceOrder::new(UserId(1), [(ProductId(1), 2)])
                    .with_address("4 Mill Lane")
                    .with_payment_method("wallet"),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total, dec!(25.00));
        assert_eq!(order.lines[0].unit_price, dec!(12.50));
        assert_eq!(order.address.as_deref(), Some("4 Mill Lane"));

        let stored = store.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);
        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_inactive_and_hidden_products_are_not_found() {
        let (store, assembler) = setup().await;
        store
            .insert_product(Product::new(ProductId(2), "Old Mug", "MUG-0", 5).inactive())
            .await;
        store.add_price_rule(ProductId(2), None, dec!(1)).await;
        store
            .insert_product(
                Product::new(ProductId(3), "Staff Mug", "MUG-S", 5).restricted_to([GroupId(4)]),
            )
            .await;
        store.add_price_rule(ProductId(3), None, dec!(1)).await;

        for product_id in [ProductId(2), ProductId(3), ProductId(99)] {
            let err = assembler
                .place_order(PlaceOrder::new(UserId(1), [(product_id, 1)]))
                .await
                .unwrap_err();
            assert!(matches!(err, OrderError::ProductNotFound(id) if id == product_id));
        }
    }

    #[tokio::test]
    async fn test_unpriced_product_fails() {
        let (store, assembler) = setup().await;
        store
            .insert_product(Product::new(ProductId(5), "Free?", "FR-1", 5))
            .await;

        let err = assembler
            .place_order(PlaceOrder::new(UserId(1), [(ProductId(1), 1), (ProductId(5), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NoPriceForProduct(ProductId(5))));
        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_missing_wallet_fails_before_mutation() {
        let (store, assembler) = setup().await;

        let err = assembler
            .place_order(PlaceOrder::new(UserId(2), [(ProductId(1), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::WalletNotFound(UserId(2))));
        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_input_errors_rejected() {
        let (_store, assembler) = setup().await;

        let err = assembler
            .place_order(PlaceOrder::new(UserId(1), []))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyOrder));

        let err = assembler
            .place_order(PlaceOrder::new(UserId(1), [(ProductId(1), -2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity { quantity: -2, .. }));
    }
}
