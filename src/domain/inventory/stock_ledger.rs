use std::sync::Arc;

use super::errors::StockError;
use crate::metrics::Metrics;
use crate::models::ProductId;
use crate::persistence::{ConditionalUpdate, LedgerReader, TransactionalStore, UnitOfWork};

// ============================================================================
// Stock Ledger
// ============================================================================
//
// Authoritative count of sellable units per product. Stock only moves through
// the conditional decrement of the unit of work, so it can never go negative
// and a refused reservation leaves the row untouched.
//
// There is no release operation: a reservation only exists inside a unit of
// work and is undone by that unit's rollback.
//
// ============================================================================

#[derive(Clone)]
pub struct StockLedger {
    metrics: Arc<Metrics>,
}

impl StockLedger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Reserve `quantity` units inside `uow`. Returns the remaining stock.
    pub async fn reserve<U: UnitOfWork>(
        &self,
        uow: &mut U,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        match uow.decrement_stock(product_id, quantity).await? {
            ConditionalUpdate::Applied(remaining) => {
                tracing::debug!(
                    product_id = %product_id,
                    quantity,
                    remaining,
                    "Reserved stock"
                );
                Ok(remaining)
            }
            ConditionalUpdate::Rejected { current } => {
                self.metrics.record_stock_rejection();
                tracing::info!(
                    product_id = %product_id,
                    requested = quantity,
                    available = current,
                    "Stock reservation refused"
                );
                Err(StockError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: current,
                })
            }
            ConditionalUpdate::Missing => Err(StockError::UnknownProduct(product_id)),
        }
    }

    /// Add `quantity` units inside `uow`. Returns the new stock.
    pub async fn restock_in<U: UnitOfWork>(
        &self,
        uow: &mut U,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        uow.increment_stock(product_id, quantity)
            .await?
            .ok_or(StockError::UnknownProduct(product_id))
    }

    /// Add `quantity` units in a unit of work of its own
    pub async fn restock<S: TransactionalStore>(
        &self,
        store: &S,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<i64, StockError> {
        let mut uow = store.begin().await?;
        let stock = self.restock_in(&mut uow, product_id, quantity).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product_id, quantity, stock, "📦 Restocked product");
        Ok(stock)
    }

    /// Committed stock of a product
    pub async fn available<R: LedgerReader>(
        &self,
        reader: &R,
        product_id: ProductId,
    ) -> Result<i64, StockError> {
        reader
            .stock_of(product_id)
            .await?
            .ok_or(StockError::UnknownProduct(product_id))
    }
}
