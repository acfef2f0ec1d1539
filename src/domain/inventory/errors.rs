use crate::models::ProductId;
use crate::persistence::StoreError;

// ============================================================================
// Stock Ledger Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("Unknown product {0}")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
