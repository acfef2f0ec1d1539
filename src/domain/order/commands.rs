use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use super::value_objects::OrderLineRequest;
use crate::models::{ProductId, UserId};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Place an order for the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub lines: Vec<OrderLineRequest>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl PlaceOrder {
    pub fn new(user_id: UserId, lines: impl IntoIterator<Item = (ProductId, i64)>) -> Self {
        Self {
            user_id,
            lines: lines
                .into_iter()
                .map(|(product_id, quantity)| OrderLineRequest::new(product_id, quantity))
                .collect(),
            address: None,
            payment_method: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    /// Input checks, run before any lookup
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        if let Some(line) = self.lines.iter().find(|line| line.quantity <= 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        Ok(())
    }
}
