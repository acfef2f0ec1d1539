use rust_decimal::Decimal;

use crate::models::UserId;
use crate::persistence::StoreError;

// ============================================================================
// Wallet Ledger Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient balance for user {user_id}: required {required}, available {available}")]
    InsufficientBalance {
        user_id: UserId,
        required: Decimal,
        available: Decimal,
    },

    #[error("No wallet for user {0}")]
    WalletNotFound(UserId),

    #[error("User {0} already has a wallet")]
    WalletAlreadyExists(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
