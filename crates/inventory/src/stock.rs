use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ItemId};

/// On-hand quantity of one item.
///
/// Created lazily on the first adjustment. The quantity may go negative:
/// over-selling is not prevented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub item_id: ItemId,
    pub quantity: i64,
}

impl StockEntry {
    /// Entry created by a first adjustment.
    pub fn opened_with(item_id: ItemId, delta: StockDelta) -> Self {
        Self {
            item_id,
            quantity: delta.value(),
        }
    }

    /// Add a delta to the stored quantity.
    pub fn apply(&mut self, delta: StockDelta) -> DomainResult<()> {
        self.quantity = self
            .quantity
            .checked_add(delta.value())
            .ok_or_else(|| DomainError::invariant(format!("stock of item {} overflows", self.item_id)))?;
        Ok(())
    }
}

/// Stock entry joined with the item's catalog fields, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub item_code: String,
    pub item_description: String,
    pub quantity: i64,
}

/// A signed, non-zero change to an item's on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockDelta(i64);

impl StockDelta {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value == 0 {
            return Err(DomainError::validation("stock delta cannot be zero"));
        }
        Ok(Self(value))
    }

    /// Delta for one order line: `sign * quantity`.
    ///
    /// `sign` is +1 for receipts and -1 for shipments; `quantity` must be
    /// positive.
    pub fn for_line(sign: i64, quantity: i64) -> DomainResult<Self> {
        if sign != 1 && sign != -1 {
            return Err(DomainError::invariant(format!("invalid stock sign {sign}")));
        }
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self(sign * quantity))
    }

    pub fn value(self) -> i64 {
        self.0
    }
}
