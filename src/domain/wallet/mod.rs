// ============================================================================
// Wallet Domain - Balance Ledger
// ============================================================================
//
// - Value objects (Wallet)
// - Wallet ledger (debit, credit, top-up, open, balance)
// - Errors (WalletError enum)
//
// ============================================================================

pub mod errors;
pub mod value_objects;
pub mod wallet_ledger;

pub use errors::*;
pub use value_objects::*;
pub use wallet_ledger::*;
