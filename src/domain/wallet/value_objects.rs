use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::UserId;

pub const DEFAULT_CURRENCY: &str = "USD";

/// One wallet per user. Mutated only through the wallet ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Decimal,
    pub currency: String,
}

impl Wallet {
    pub fn empty(user_id: UserId, currency: impl Into<String>) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    pub fn covers(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
