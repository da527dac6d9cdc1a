use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ItemId};

/// Catalog item: immutable identity, mutable business fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Unique business code.
    pub code: String,
    pub description: String,
    pub cost: Decimal,
    pub price: Decimal,
    pub active: bool,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

/// Input for registering a new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub code: String,
    pub description: String,
    pub cost: Decimal,
    pub price: Decimal,
}

impl NewItem {
    /// Validate and build an active item with a fresh identity.
    pub fn into_item(self) -> DomainResult<Item> {
        let (code, description) =
            checked_fields(&self.code, &self.description, self.cost, self.price)?;
        Ok(Item {
            id: ItemId::new(),
            code,
            description,
            cost: self.cost,
            price: self.price,
            active: true,
        })
    }
}

/// Replacement business fields for an existing item. `active` is left
/// unchanged when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub code: String,
    pub description: String,
    pub cost: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub active: Option<bool>,
}

impl Item {
    /// Replace the business fields; the identity never changes.
    pub fn revise(&mut self, update: ItemUpdate) -> DomainResult<()> {
        let (code, description) =
            checked_fields(&update.code, &update.description, update.cost, update.price)?;
        self.code = code;
        self.description = description;
        self.cost = update.cost;
        self.price = update.price;
        if let Some(active) = update.active {
            self.active = active;
        }
        Ok(())
    }
}

/// Trimmed code and description, or the first rule they break.
fn checked_fields(
    code: &str,
    description: &str,
    cost: Decimal,
    price: Decimal,
) -> DomainResult<(String, String)> {
    let code = code.trim();
    let description = description.trim();

    if code.is_empty() {
        return Err(DomainError::validation("item code cannot be empty"));
    }
    if description.is_empty() {
        return Err(DomainError::validation("item description cannot be empty"));
    }
    if cost.is_sign_negative() {
        return Err(DomainError::validation("item cost cannot be negative"));
    }
    if price.is_sign_negative() {
        return Err(DomainError::validation("item price cannot be negative"));
    }
    Ok((code.to_string(), description.to_string()))
}

/// Reference to an item as received from callers: either its id or its code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Id(ItemId),
    Code(String),
}

impl ItemRef {
    /// Interpret a raw reference: anything that parses as an id is an id,
    /// everything else is treated as a business code.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("item reference cannot be empty"));
        }
        Ok(match raw.parse::<ItemId>() {
            Ok(id) => ItemRef::Id(id),
            Err(_) => ItemRef::Code(raw.to_string()),
        })
    }
}

impl From<ItemId> for ItemRef {
    fn from(id: ItemId) -> Self {
        ItemRef::Id(id)
    }
}

impl core::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemRef::Id(id) => write!(f, "item {id}"),
            ItemRef::Code(code) => write!(f, "item with code {code}"),
        }
    }
}
