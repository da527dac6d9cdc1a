//! Item catalog domain module.
//!
//! Items are owned by the catalog collaborator; orders and the stock ledger
//! only reference them by [`ItemId`](stockroom_core::ItemId).

pub mod item;

pub use item::{Item, ItemRef, ItemUpdate, NewItem};
