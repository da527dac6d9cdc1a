//! Purchasing domain module.
//!
//! Purchases are orders placed with a supplier. Confirming one ("receiving")
//! adds every line's quantity to stock.

pub mod order;

pub use order::{Purchase, PurchaseDetail, PurchaseHeader, Supplier};
