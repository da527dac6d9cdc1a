//! Storage boundary.
//!
//! All traits here are synchronous and `Send + Sync`: callers see blocking
//! operations, backends decide how they reach their storage. Reads go through
//! [`OrderReader`], [`ItemCatalog`] and [`StockLedger`]; every write that has
//! to be guarded or atomic runs inside a [`UnitOfWork`] obtained from
//! [`TransactionalStore::begin`].
//!
//! ## Units of work
//!
//! A unit of work is all-or-nothing: nothing it wrote is visible to other
//! callers until [`UnitOfWork::commit`] succeeds, and dropping it without
//! committing discards every write. [`UnitOfWork::lock_header`] takes an
//! exclusive lock on the header row for the rest of the unit of work, which
//! is what serialises concurrent confirmations of the same order.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use stockroom_catalog::{Item, ItemRef};
use stockroom_core::{DetailId, ItemId, OrderId};
use stockroom_inventory::{StockDelta, StockEntry, StockLevel};
use stockroom_orders::{DetailView, OrderCode, OrderDetail, OrderHeader, OrderKind, Series};
use stockroom_purchasing::Purchase;
use stockroom_sales::Sale;

use crate::error::StoreError;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

/// Where an order kind lives in relational storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSchema {
    pub headers_table: &'static str,
    pub details_table: &'static str,
    pub counterparty_name: &'static str,
    pub counterparty_phone: Option<&'static str>,
    /// Boolean column recording confirmation (`received` / `sent`).
    pub confirmed_flag: &'static str,
    /// Decimal column holding the unit price (`cost` / `price`).
    pub unit_price: &'static str,
}

/// An order kind that has a storage layout.
pub trait StoredOrder: OrderKind {
    const SCHEMA: OrderSchema;
}

impl StoredOrder for Purchase {
    const SCHEMA: OrderSchema = OrderSchema {
        headers_table: "purchase_headers",
        details_table: "purchase_details",
        counterparty_name: "supplier_name",
        counterparty_phone: None,
        confirmed_flag: "received",
        unit_price: "cost",
    };
}

impl StoredOrder for Sale {
    const SCHEMA: OrderSchema = OrderSchema {
        headers_table: "sales_headers",
        details_table: "sales_details",
        counterparty_name: "customer_name",
        counterparty_phone: Some("customer_phone"),
        confirmed_flag: "sent",
        unit_price: "price",
    };
}

/// Read-then-derive preview of the next code in a series.
///
/// Nothing is reserved: two callers may see the same value. Header creation
/// uses [`UnitOfWork::reserve_code`] instead.
pub trait SequenceGenerator: Send + Sync {
    fn next_code(&self, series: Series) -> Result<OrderCode, StoreError>;
}

/// Per-item on-hand quantities.
pub trait StockLedger: Send + Sync {
    /// Add `delta` to the item's quantity in one atomic step, creating the
    /// entry on first use.
    fn apply_delta(&self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError>;

    /// `None` means the item was never adjusted.
    fn get(&self, item_id: ItemId) -> Result<Option<StockEntry>, StoreError>;

    fn list_all(&self) -> Result<Vec<StockEntry>, StoreError>;

    /// Entries joined with item code and description, ordered by item code.
    fn list_levels(&self) -> Result<Vec<StockLevel>, StoreError>;
}

/// Catalog collaborator: the items orders refer to.
pub trait ItemCatalog: Send + Sync {
    /// Fails with `Conflict` when the code is taken.
    fn insert_item(&self, item: &Item) -> Result<(), StoreError>;

    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    fn item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError>;

    fn items(&self) -> Result<Vec<Item>, StoreError>;

    /// Overwrite the business fields of an existing item. Fails with
    /// `NotFound` for an unknown id and `Conflict` when the new code is taken.
    fn update_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Fails with `Conflict` while order lines or a stock entry refer to the
    /// item.
    fn delete_item(&self, id: ItemId) -> Result<(), StoreError>;

    /// Resolve an id or code to an existing item.
    fn resolve_item(&self, reference: &ItemRef) -> Result<Item, StoreError> {
        let found = match reference {
            ItemRef::Id(id) => self.item(*id)?,
            ItemRef::Code(code) => self.item_by_code(code)?,
        };
        found.ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }
}

/// Committed order state, outside any unit of work.
pub trait OrderReader: Send + Sync {
    fn header<K: StoredOrder>(&self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError>;

    fn header_by_code<K: StoredOrder>(
        &self,
        code: &OrderCode,
    ) -> Result<Option<OrderHeader<K>>, StoreError>;

    /// All headers of the kind, ordered by code.
    fn headers<K: StoredOrder>(&self) -> Result<Vec<OrderHeader<K>>, StoreError>;

    /// Lines of a header in insertion order.
    fn details<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError>;

    fn detail<K: StoredOrder>(&self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError>;

    /// Lines joined with item code and description, in insertion order.
    fn detail_views<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<DetailView<K>>, StoreError>;

    /// Headers whose counterparty name contains `fragment`, ignoring case.
    fn headers_by_counterparty<K: StoredOrder>(
        &self,
        fragment: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError>;

    /// Headers with at least one line for the item with `item_code`.
    fn headers_by_item_code<K: StoredOrder>(
        &self,
        item_code: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError>;
}

/// Atomic group of guarded writes.
pub trait UnitOfWork {
    /// Advance the series counter and return the code it now points at.
    fn reserve_code(&mut self, series: Series) -> Result<OrderCode, StoreError>;

    /// Load a header and hold an exclusive lock on it until commit/rollback.
    fn lock_header<K: StoredOrder>(&mut self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError>;

    fn insert_header<K: StoredOrder>(&mut self, header: &OrderHeader<K>) -> Result<(), StoreError>;

    /// Persist code and counterparty of an existing header.
    fn update_header<K: StoredOrder>(&mut self, header: &OrderHeader<K>) -> Result<(), StoreError>;

    /// Remove a header together with all of its lines.
    fn delete_header<K: StoredOrder>(&mut self, id: OrderId) -> Result<(), StoreError>;

    fn insert_detail<K: StoredOrder>(&mut self, detail: &OrderDetail<K>) -> Result<(), StoreError>;

    fn update_detail<K: StoredOrder>(&mut self, detail: &OrderDetail<K>) -> Result<(), StoreError>;

    fn delete_detail<K: StoredOrder>(&mut self, id: DetailId) -> Result<(), StoreError>;

    fn details<K: StoredOrder>(&mut self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError>;

    fn detail<K: StoredOrder>(&mut self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError>;

    /// Flip the confirmation flag, only while the header is still a draft.
    ///
    /// Returns `false` when no draft header with `id` exists.
    fn mark_confirmed<K: StoredOrder>(&mut self, id: OrderId) -> Result<bool, StoreError>;

    /// Same semantics as [`StockLedger::apply_delta`], inside the unit of work.
    fn apply_delta(&mut self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

/// A store able to open units of work.
pub trait TransactionalStore: Send + Sync {
    type Tx<'a>: UnitOfWork
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>, StoreError>;
}

impl<S> TransactionalStore for Arc<S>
where
    S: TransactionalStore + ?Sized,
{
    type Tx<'a>
        = S::Tx<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>, StoreError> {
        (**self).begin()
    }
}

impl<S> SequenceGenerator for Arc<S>
where
    S: SequenceGenerator + ?Sized,
{
    fn next_code(&self, series: Series) -> Result<OrderCode, StoreError> {
        (**self).next_code(series)
    }
}

impl<S> StockLedger for Arc<S>
where
    S: StockLedger + ?Sized,
{
    fn apply_delta(&self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError> {
        (**self).apply_delta(item_id, delta)
    }

    fn get(&self, item_id: ItemId) -> Result<Option<StockEntry>, StoreError> {
        (**self).get(item_id)
    }

    fn list_all(&self) -> Result<Vec<StockEntry>, StoreError> {
        (**self).list_all()
    }

    fn list_levels(&self) -> Result<Vec<StockLevel>, StoreError> {
        (**self).list_levels()
    }
}

impl<S> ItemCatalog for Arc<S>
where
    S: ItemCatalog + ?Sized,
{
    fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        (**self).insert_item(item)
    }

    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).item(id)
    }

    fn item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError> {
        (**self).item_by_code(code)
    }

    fn items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).items()
    }

    fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        (**self).update_item(item)
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        (**self).delete_item(id)
    }
}

impl<S> OrderReader for Arc<S>
where
    S: OrderReader,
{
    fn header<K: StoredOrder>(&self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError> {
        (**self).header(id)
    }

    fn header_by_code<K: StoredOrder>(
        &self,
        code: &OrderCode,
    ) -> Result<Option<OrderHeader<K>>, StoreError> {
        (**self).header_by_code(code)
    }

    fn headers<K: StoredOrder>(&self) -> Result<Vec<OrderHeader<K>>, StoreError> {
        (**self).headers()
    }

    fn details<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError> {
        (**self).details(header_id)
    }

    fn detail<K: StoredOrder>(&self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError> {
        (**self).detail(id)
    }

    fn detail_views<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<DetailView<K>>, StoreError> {
        (**self).detail_views(header_id)
    }

    fn headers_by_counterparty<K: StoredOrder>(
        &self,
        fragment: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError> {
        (**self).headers_by_counterparty(fragment)
    }

    fn headers_by_item_code<K: StoredOrder>(
        &self,
        item_code: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError> {
        (**self).headers_by_item_code(item_code)
    }
}
