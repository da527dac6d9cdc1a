//! Sales domain module.
//!
//! Sales are orders placed by a customer. Confirming one ("sending")
//! subtracts every line's quantity from stock.

pub mod order;

pub use order::{Customer, Sale, SalesDetail, SalesHeader};
