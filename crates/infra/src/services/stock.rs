use tracing::info;

use stockroom_catalog::Item;
use stockroom_core::ItemId;
use stockroom_inventory::{StockDelta, StockEntry, StockLevel};

use super::{ServiceError, ServiceResult};
use crate::store::{ItemCatalog, StockLedger};

/// Stock reporting and manual adjustments.
#[derive(Debug, Clone)]
pub struct StockService<S> {
    store: S,
}

impl<S: StockLedger + ItemCatalog> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Levels of every adjusted item, with item code and description.
    pub fn levels(&self) -> ServiceResult<Vec<StockLevel>> {
        Ok(self.store.list_levels()?)
    }

    /// Level of one item; `NotFound` if it was never adjusted.
    pub fn level(&self, item_id: ItemId) -> ServiceResult<StockLevel> {
        let entry = self
            .store
            .get(item_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("stock entry for item {item_id}")))?;
        let item = self.known_item(item_id)?;
        Ok(level_of(&item, entry))
    }

    /// Apply a manual, non-zero adjustment. The result may be negative.
    pub fn adjust(&self, item_id: ItemId, delta: i64) -> ServiceResult<StockLevel> {
        let delta = StockDelta::new(delta)?;
        let item = self.known_item(item_id)?;
        let entry = self.store.apply_delta(item_id, delta)?;
        info!(item_id = %item_id, delta = delta.value(), quantity = entry.quantity, "stock adjusted");
        Ok(level_of(&item, entry))
    }

    fn known_item(&self, item_id: ItemId) -> ServiceResult<Item> {
        self.store
            .item(item_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("item {item_id}")))
    }
}

fn level_of(item: &Item, entry: StockEntry) -> StockLevel {
    StockLevel {
        item_id: entry.item_id,
        item_code: item.code.clone(),
        item_description: item.description.clone(),
        quantity: entry.quantity,
    }
}
