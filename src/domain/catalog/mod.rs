// ============================================================================
// Catalogue Domain - Pricing and Visibility
// ============================================================================
//
// Read-only view of the product catalogue:
// - Value objects (Product, PriceRule, Group)
// - Price resolution per caller group memberships
// - Visibility predicate (which callers may order a product)
//
// Pricing and visibility are separate capabilities; the order assembler
// composes them.
//
// ============================================================================

pub mod errors;
pub mod pricing;
pub mod value_objects;
pub mod visibility;

pub use errors::*;
pub use pricing::*;
pub use value_objects::*;
pub use visibility::*;
