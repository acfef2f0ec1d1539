//! Order fulfillment engine.
//!
//! Resolves group-dependent unit prices, reserves stock, debits the caller's
//! wallet and persists the order, all inside one unit of work. The entry
//! point is [`domain::order::OrderAssembler::place_order`]; storage is
//! pluggable through [`persistence::Store`], with a PostgreSQL and an
//! in-memory implementation.

pub mod config;
pub mod domain;
pub mod intake;
pub mod metrics;
pub mod models;
pub mod persistence;
