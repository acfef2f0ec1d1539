use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{GroupId, PriceRuleId, ProductId};

// ============================================================================
// Catalogue Value Objects
// ============================================================================

/// Product as seen by the engine. `stock` is informational here; the
/// authoritative count lives behind the stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub stock: i64,
    pub is_active: bool,
    /// Groups the product is restricted to; empty means unrestricted
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, sku: impl Into<String>, stock: i64) -> Self {
        Self {
            id,
            name: name.into(),
            sku: sku.into(),
            stock,
            is_active: true,
            group_ids: BTreeSet::new(),
        }
    }

    pub fn restricted_to(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.group_ids.extend(groups);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A (product, optional group) -> price mapping. `group_id = None` is the
/// product's default price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRule {
    pub id: PriceRuleId,
    pub product_id: ProductId,
    pub group_id: Option<GroupId>,
    pub price: Decimal,
}

impl PriceRule {
    pub fn is_default(&self) -> bool {
        self.group_id.is_none()
    }
}

/// Named collection of users and products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
}
