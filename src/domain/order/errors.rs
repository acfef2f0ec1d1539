use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;

use crate::domain::catalog::PricingError;
use crate::domain::inventory::StockError;
use crate::domain::wallet::WalletError;
use crate::models::{ProductId, UserId};
use crate::persistence::StoreError;

// ============================================================================
// Order Placement Errors
// ============================================================================
//
// Every failure leaves the ledgers untouched: errors detected before the unit
// of work never mutate, errors detected inside it roll the unit back.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Malformed request, rejected before any lookup
    Input,
    /// Referenced product, price or wallet does not resolve
    Resolution,
    /// Not enough stock or balance
    Resource,
    /// Storage failure or timeout
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order lines cannot be empty")]
    EmptyOrder,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    #[error("Invalid order total: {0}")]
    InvalidTotal(Decimal),

    #[error("Order total exceeds the representable amount")]
    TotalOverflow,

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("No price for product {0}")]
    NoPriceForProduct(ProductId),

    #[error("No wallet for user {0}")]
    WalletNotFound(UserId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Order placement timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl OrderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrderError::EmptyOrder
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidTotal(_)
            | OrderError::TotalOverflow => ErrorCategory::Input,
            OrderError::ProductNotFound(_)
            | OrderError::NoPriceForProduct(_)
            | OrderError::WalletNotFound(_) => ErrorCategory::Resolution,
            OrderError::InsufficientStock { .. } | OrderError::InsufficientBalance { .. } => {
                ErrorCategory::Resource
            }
            OrderError::TimedOut(_) | OrderError::Persistence(_) => ErrorCategory::Persistence,
        }
    }

    /// Short label used for the rejection metric
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::EmptyOrder => "empty_order",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::InvalidTotal(_) | OrderError::TotalOverflow => "invalid_total",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::NoPriceForProduct(_) => "no_price",
            OrderError::WalletNotFound(_) => "wallet_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InsufficientBalance { .. } => "insufficient_balance",
            OrderError::TimedOut(_) => "timed_out",
            OrderError::Persistence(_) => "persistence",
        }
    }
}

impl From<StockError> for OrderError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::InvalidQuantity {
                product_id,
                quantity,
            } => OrderError::InvalidQuantity {
                product_id,
                quantity,
            },
            StockError::InsufficientStock {
                product_id,
                requested,
                available,
            } => OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            // Deleted between resolution and reservation
            StockError::UnknownProduct(product_id) => OrderError::ProductNotFound(product_id),
            StockError::Store(e) => OrderError::Persistence(e),
        }
    }
}

impl From<WalletError> for OrderError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InvalidAmount(amount) => OrderError::InvalidTotal(amount),
            WalletError::InsufficientBalance {
                required,
                available,
                ..
            } => OrderError::InsufficientBalance {
                required,
                available,
            },
            WalletError::WalletNotFound(user_id) => OrderError::WalletNotFound(user_id),
            WalletError::Store(e) => OrderError::Persistence(e),
            other @ WalletError::WalletAlreadyExists(_) => {
                OrderError::Persistence(StoreError::Other(anyhow::anyhow!(other.to_string())))
            }
        }
    }
}

impl From<PricingError> for OrderError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::NoPrice(product_id) => OrderError::NoPriceForProduct(product_id),
            PricingError::Store(e) => OrderError::Persistence(e),
        }
    }
}
