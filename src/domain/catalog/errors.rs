use crate::models::ProductId;
use crate::persistence::StoreError;

// ============================================================================
// Catalogue Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("No price found for product {0}")]
    NoPrice(ProductId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
