// ============================================================================
// Order Domain - Order Placement
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderLine, OrderStatus, Order)
// - Commands (PlaceOrder)
// - Errors (OrderError enum and its categories)
// - Assembler (OrderAssembler, the only entry point of the order path)
//
// ============================================================================

pub mod assembler;
pub mod commands;
pub mod errors;
pub mod value_objects;

// Re-export for convenience
pub use assembler::*;
pub use commands::*;
pub use errors::*;
pub use value_objects::*;
