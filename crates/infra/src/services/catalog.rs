use tracing::info;

use stockroom_catalog::{Item, ItemUpdate, NewItem};
use stockroom_core::ItemId;

use super::{ServiceError, ServiceResult};
use crate::store::ItemCatalog;

/// Item registration and lookup.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: ItemCatalog> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn create_item(&self, input: NewItem) -> ServiceResult<Item> {
        let item = input.into_item()?;
        self.store.insert_item(&item)?;
        info!(item_id = %item.id, code = %item.code, "item registered");
        Ok(item)
    }

    pub fn item(&self, id: ItemId) -> ServiceResult<Item> {
        self.store
            .item(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("item {id}")))
    }

    pub fn item_by_code(&self, code: &str) -> ServiceResult<Item> {
        self.store
            .item_by_code(code.trim())?
            .ok_or_else(|| ServiceError::NotFound(format!("item with code {}", code.trim())))
    }

    pub fn items(&self) -> ServiceResult<Vec<Item>> {
        Ok(self.store.items()?)
    }

    /// Replace code, description, cost and price, and optionally the active
    /// flag.
    pub fn update_item(&self, id: ItemId, update: ItemUpdate) -> ServiceResult<Item> {
        let mut item = self.item(id)?;
        item.revise(update)?;
        self.store.update_item(&item)?;
        info!(item_id = %item.id, code = %item.code, active = item.active, "item updated");
        Ok(item)
    }

    /// Remove an item nothing refers to; `Conflict` while order lines or a
    /// stock entry still do.
    pub fn delete_item(&self, id: ItemId) -> ServiceResult<()> {
        self.store.delete_item(id)?;
        info!(item_id = %id, "item deleted");
        Ok(())
    }
}
