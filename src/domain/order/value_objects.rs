use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use crate::models::{OrderId, ProductId, UserId};

// ============================================================================
// Order Value Objects
// ============================================================================

/// One requested line of a `PlaceOrder` command
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// `Pending` exists only in memory; `Failed` orders are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

/// A priced order line. The unit price is fixed at order time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl OrderLine {
    /// `None` when the subtotal does not fit in a `Decimal`
    pub fn priced(request: OrderLineRequest, unit_price: Decimal) -> Option<Self> {
        let subtotal = unit_price.checked_mul(Decimal::from(request.quantity))?;
        Some(Self {
            product_id: request.product_id,
            quantity: request.quantity,
            unit_price,
            subtotal,
        })
    }
}

/// Fully priced order that has not touched any ledger yet
#[derive(Clone, Debug)]
pub struct PendingOrder {
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
    total: Decimal,
}

impl PendingOrder {
    pub fn new(
        user_id: UserId,
        lines: Vec<OrderLine>,
        address: Option<String>,
        payment_method: Option<String>,
    ) -> Result<Self, OrderError> {
        let total = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.subtotal))
            .ok_or(OrderError::TotalOverflow)?;

        Ok(Self {
            user_id,
            lines,
            address,
            payment_method,
            total,
        })
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Lines in ascending product id order, the order reservations are made in
    pub fn lines_by_product(&self) -> Vec<&OrderLine> {
        let mut lines: Vec<&OrderLine> = self.lines.iter().collect();
        lines.sort_by_key(|line| line.product_id);
        lines
    }

    pub fn into_paid(self) -> NewOrder {
        NewOrder {
            user_id: self.user_id,
            status: OrderStatus::Paid,
            total: self.total,
            lines: self.lines,
            address: self.address,
            payment_method: self.payment_method,
        }
    }
}

/// Order header and lines ready to be written by a unit of work
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub lines: Vec<OrderLine>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
}

/// Persisted, immutable order
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub lines: Vec<OrderLine>,
    pub address: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_new(id: OrderId, order: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            lines: order.lines,
            address: order.address,
            payment_method: order.payment_method,
            created_at,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
