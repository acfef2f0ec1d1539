// ============================================================================
// Inventory Domain - Stock Ledger
// ============================================================================

pub mod errors;
pub mod stock_ledger;

pub use errors::*;
pub use stock_ledger::*;
