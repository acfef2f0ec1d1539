// ============================================================================
// Persistence Infrastructure
// ============================================================================
//
// Transactional storage behind the fulfillment engine.
// Domain-specific logic is in src/domain/
//
// ============================================================================

// Core abstractions (unit of work, read ports, storage errors)
pub mod core;
// Concrete stores (in-memory, PostgreSQL)
pub mod store;

pub use self::core::*;
pub use self::store::*;
