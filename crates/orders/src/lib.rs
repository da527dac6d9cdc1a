//! Order domain module shared by purchases and sales.
//!
//! Purchases and sales are the same aggregate (a header owning detail lines,
//! moving from draft to confirmed) parameterized by an [`OrderKind`]: which
//! code series it draws from, who the counterparty is, and which direction
//! confirmation moves stock. Pure domain logic only (no IO).

pub mod code;
pub mod detail;
pub mod header;
pub mod kind;

pub use code::{OrderCode, SequenceError, CODE_WIDTH};
pub use detail::{DetailInput, DetailView, OrderDetail};
pub use header::{HeaderUpdate, OrderHeader, OrderStatus};
pub use kind::{Counterparty, OrderKind, Series};
