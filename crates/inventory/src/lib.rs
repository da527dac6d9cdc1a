//! Inventory domain module: the per-item stock ledger.
//!
//! This crate contains the ledger's business rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Atomic
//! persistence of adjustments lives in `stockroom-infra`.

pub mod stock;

pub use stock::{StockDelta, StockEntry, StockLevel};
