// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each capability has its own subdirectory with:
// - Value objects
// - Errors
// - The service operating on it (resolver, ledger, assembler)
//
// This layer only talks to storage through the persistence ports.
//
// ============================================================================

pub mod catalog;
pub mod inventory;
pub mod order;
pub mod wallet;
