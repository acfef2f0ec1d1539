// ============================================================================
// Persistence Core - Storage Abstractions
// ============================================================================
//
// The traits every store implements:
// - UnitOfWork: conditional ledger updates + order insert, all-or-nothing
// - TransactionalStore: opens units of work
// - Read ports: catalogue, memberships, ledgers, orders
//
// ============================================================================

pub mod errors;
pub mod ports;
pub mod unit_of_work;

pub use errors::{StoreError, StoreResult};
pub use ports::{CatalogReader, LedgerReader, MembershipReader, OrderReader, Store};
pub use unit_of_work::{ConditionalUpdate, TransactionalStore, UnitOfWork};
