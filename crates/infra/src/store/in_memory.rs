use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockroom_catalog::Item;
use stockroom_core::{DetailId, ItemId, OrderId};
use stockroom_inventory::{StockDelta, StockEntry, StockLevel};
use stockroom_orders::{
    Counterparty, DetailView, OrderCode, OrderDetail, OrderHeader, OrderKind, OrderStatus, Series,
};

use super::{
    ItemCatalog, OrderReader, SequenceGenerator, StockLedger, StoredOrder, TransactionalStore,
    UnitOfWork,
};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct HeaderRow {
    series: Series,
    id: OrderId,
    code: OrderCode,
    name: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    confirmed: bool,
}

impl HeaderRow {
    fn from_header<K: OrderKind>(header: &OrderHeader<K>) -> Self {
        Self {
            series: K::SERIES,
            id: header.id,
            code: header.code.clone(),
            name: header.counterparty.name().to_string(),
            phone: header.counterparty.phone().map(str::to_string),
            created_at: header.created_at,
            confirmed: header.is_confirmed(),
        }
    }

    fn to_header<K: OrderKind>(&self) -> OrderHeader<K> {
        OrderHeader {
            id: self.id,
            code: self.code.clone(),
            counterparty: K::Counterparty::from_parts(self.name.clone(), self.phone.clone()),
            created_at: self.created_at,
            status: OrderStatus::from_confirmed(self.confirmed),
        }
    }
}

#[derive(Debug, Clone)]
struct DetailRow {
    series: Series,
    id: DetailId,
    header_id: OrderId,
    item_id: ItemId,
    quantity: i64,
    unit_price: Decimal,
    amount: Decimal,
}

impl DetailRow {
    fn from_detail<K: OrderKind>(detail: &OrderDetail<K>) -> Self {
        Self {
            series: K::SERIES,
            id: detail.id,
            header_id: detail.header_id,
            item_id: detail.item_id,
            quantity: detail.quantity,
            unit_price: detail.unit_price,
            amount: detail.amount,
        }
    }

    fn to_detail<K: OrderKind>(&self) -> OrderDetail<K> {
        OrderDetail::from_parts(
            self.id,
            self.header_id,
            self.item_id,
            self.quantity,
            self.unit_price,
            self.amount,
        )
    }
}

/// Every table of the store. Cloned whole to snapshot a unit of work.
#[derive(Debug, Clone, Default)]
struct Tables {
    items: HashMap<ItemId, Item>,
    headers: Vec<HeaderRow>,
    details: Vec<DetailRow>,
    stocks: HashMap<ItemId, StockEntry>,
    counters: HashMap<Series, u64>,
}

impl Tables {
    fn header_row(&self, series: Series, id: OrderId) -> Option<&HeaderRow> {
        self.headers.iter().find(|h| h.series == series && h.id == id)
    }

    fn header<K: OrderKind>(&self, id: OrderId) -> Option<OrderHeader<K>> {
        self.header_row(K::SERIES, id).map(HeaderRow::to_header)
    }

    fn headers_where<K, F>(&self, mut keep: F) -> Vec<OrderHeader<K>>
    where
        K: OrderKind,
        F: FnMut(&HeaderRow) -> bool,
    {
        let mut rows: Vec<&HeaderRow> = self
            .headers
            .iter()
            .filter(|h| h.series == K::SERIES && keep(*h))
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows.into_iter().map(HeaderRow::to_header).collect()
    }

    fn details<K: OrderKind>(&self, header_id: OrderId) -> Vec<OrderDetail<K>> {
        self.details
            .iter()
            .filter(|d| d.series == K::SERIES && d.header_id == header_id)
            .map(DetailRow::to_detail)
            .collect()
    }

    fn detail<K: OrderKind>(&self, id: DetailId) -> Option<OrderDetail<K>> {
        self.details
            .iter()
            .find(|d| d.series == K::SERIES && d.id == id)
            .map(DetailRow::to_detail)
    }

    fn next_code(&self, series: Series) -> Result<OrderCode, StoreError> {
        let codes = self
            .headers
            .iter()
            .filter(|h| h.series == series)
            .map(|h| h.code.as_str());
        Ok(OrderCode::next_after(codes)?)
    }

    fn reserve_code(&mut self, series: Series) -> Result<OrderCode, StoreError> {
        let from_codes = self.next_code(series)?.value();
        let last = self.counters.get(&series).copied().unwrap_or(0);
        let next = from_codes.max(last.saturating_add(1));
        let code = OrderCode::from_value(next)?;
        self.counters.insert(series, next);
        Ok(code)
    }

    fn ensure_code_free(&self, series: Series, id: OrderId, code: &OrderCode) -> Result<(), StoreError> {
        let taken = self
            .headers
            .iter()
            .any(|h| h.series == series && h.id != id && &h.code == code);
        if taken {
            return Err(StoreError::Conflict(format!("{series} code {code} already exists")));
        }
        Ok(())
    }

    fn ensure_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        if !self.items.contains_key(&item_id) {
            return Err(StoreError::NotFound(format!("item {item_id}")));
        }
        Ok(())
    }

    fn apply_delta(&mut self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError> {
        self.ensure_item(item_id)?;
        match self.stocks.get_mut(&item_id) {
            Some(entry) => {
                entry
                    .apply(delta)
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
                Ok(*entry)
            }
            None => {
                let entry = StockEntry::opened_with(item_id, delta);
                self.stocks.insert(item_id, entry);
                Ok(entry)
            }
        }
    }
}

/// In-memory store implementing every storage trait.
///
/// Intended for tests/dev. All tables sit behind one lock, so a unit of work
/// excludes every other writer and reader until it finishes.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(f(&tables))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::poisoned())
    }
}

/// Unit of work over [`InMemoryStore`].
///
/// Holds the write lock for its whole lifetime and restores the snapshot
/// taken at `begin` unless committed.
pub struct InMemoryUnitOfWork<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    snapshot: Option<Tables>,
}

impl Drop for InMemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

impl TransactionalStore for InMemoryStore {
    type Tx<'a> = InMemoryUnitOfWork<'a>;

    fn begin(&self) -> Result<InMemoryUnitOfWork<'_>, StoreError> {
        let tables = self.write()?;
        let snapshot = Some(tables.clone());
        Ok(InMemoryUnitOfWork { tables, snapshot })
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn reserve_code(&mut self, series: Series) -> Result<OrderCode, StoreError> {
        self.tables.reserve_code(series)
    }

    fn lock_header<K: StoredOrder>(&mut self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError> {
        // The write guard already excludes everyone else.
        Ok(self.tables.header(id))
    }

    fn insert_header<K: StoredOrder>(&mut self, header: &OrderHeader<K>) -> Result<(), StoreError> {
        if self.tables.header_row(K::SERIES, header.id).is_some() {
            return Err(StoreError::Conflict(format!("{} {} already exists", K::LABEL, header.id)));
        }
        self.tables.ensure_code_free(K::SERIES, header.id, &header.code)?;
        self.tables.headers.push(HeaderRow::from_header(header));
        Ok(())
    }

    fn update_header<K: StoredOrder>(&mut self, header: &OrderHeader<K>) -> Result<(), StoreError> {
        self.tables.ensure_code_free(K::SERIES, header.id, &header.code)?;
        let row = self
            .tables
            .headers
            .iter_mut()
            .find(|h| h.series == K::SERIES && h.id == header.id)
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", K::LABEL, header.id)))?;
        row.code = header.code.clone();
        row.name = header.counterparty.name().to_string();
        row.phone = header.counterparty.phone().map(str::to_string);
        Ok(())
    }

    fn delete_header<K: StoredOrder>(&mut self, id: OrderId) -> Result<(), StoreError> {
        let before = self.tables.headers.len();
        self.tables
            .headers
            .retain(|h| !(h.series == K::SERIES && h.id == id));
        if self.tables.headers.len() == before {
            return Err(StoreError::NotFound(format!("{} {id}", K::LABEL)));
        }
        self.tables
            .details
            .retain(|d| !(d.series == K::SERIES && d.header_id == id));
        Ok(())
    }

    fn insert_detail<K: StoredOrder>(&mut self, detail: &OrderDetail<K>) -> Result<(), StoreError> {
        if self.tables.header_row(K::SERIES, detail.header_id).is_none() {
            return Err(StoreError::NotFound(format!("{} {}", K::LABEL, detail.header_id)));
        }
        self.tables.ensure_item(detail.item_id)?;
        self.tables.details.push(DetailRow::from_detail(detail));
        Ok(())
    }

    fn update_detail<K: StoredOrder>(&mut self, detail: &OrderDetail<K>) -> Result<(), StoreError> {
        self.tables.ensure_item(detail.item_id)?;
        let row = self
            .tables
            .details
            .iter_mut()
            .find(|d| d.series == K::SERIES && d.id == detail.id)
            .ok_or_else(|| StoreError::NotFound(format!("{} detail {}", K::LABEL, detail.id)))?;
        *row = DetailRow::from_detail(detail);
        Ok(())
    }

    fn delete_detail<K: StoredOrder>(&mut self, id: DetailId) -> Result<(), StoreError> {
        let before = self.tables.details.len();
        self.tables
            .details
            .retain(|d| !(d.series == K::SERIES && d.id == id));
        if self.tables.details.len() == before {
            return Err(StoreError::NotFound(format!("{} detail {id}", K::LABEL)));
        }
        Ok(())
    }

    fn details<K: StoredOrder>(&mut self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError> {
        Ok(self.tables.details(header_id))
    }

    fn detail<K: StoredOrder>(&mut self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError> {
        Ok(self.tables.detail(id))
    }

    fn mark_confirmed<K: StoredOrder>(&mut self, id: OrderId) -> Result<bool, StoreError> {
        let row = self
            .tables
            .headers
            .iter_mut()
            .find(|h| h.series == K::SERIES && h.id == id && !h.confirmed);
        Ok(match row {
            Some(row) => {
                row.confirmed = true;
                true
            }
            None => false,
        })
    }

    fn apply_delta(&mut self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError> {
        self.tables.apply_delta(item_id, delta)
    }

    fn commit(mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }
}

impl SequenceGenerator for InMemoryStore {
    fn next_code(&self, series: Series) -> Result<OrderCode, StoreError> {
        self.read(|t| t.next_code(series))?
    }
}

impl StockLedger for InMemoryStore {
    fn apply_delta(&self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError> {
        self.write()?.apply_delta(item_id, delta)
    }

    fn get(&self, item_id: ItemId) -> Result<Option<StockEntry>, StoreError> {
        self.read(|t| t.stocks.get(&item_id).copied())
    }

    fn list_all(&self) -> Result<Vec<StockEntry>, StoreError> {
        self.read(|t| {
            let mut entries: Vec<StockEntry> = t.stocks.values().copied().collect();
            entries.sort_by_key(|e| e.item_id);
            entries
        })
    }

    fn list_levels(&self) -> Result<Vec<StockLevel>, StoreError> {
        self.read(|t| {
            let mut levels: Vec<StockLevel> = t
                .stocks
                .values()
                .filter_map(|entry| {
                    t.items.get(&entry.item_id).map(|item| StockLevel {
                        item_id: entry.item_id,
                        item_code: item.code.clone(),
                        item_description: item.description.clone(),
                        quantity: entry.quantity,
                    })
                })
                .collect();
            levels.sort_by(|a, b| a.item_code.cmp(&b.item_code));
            levels
        })
    }
}

impl ItemCatalog for InMemoryStore {
    fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.items.values().any(|i| i.code == item.code) {
            return Err(StoreError::Conflict(format!("item code {} already exists", item.code)));
        }
        if tables.items.contains_key(&item.id) {
            return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
        }
        tables.items.insert(item.id, item.clone());
        Ok(())
    }

    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.read(|t| t.items.get(&id).cloned())
    }

    fn item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError> {
        self.read(|t| t.items.values().find(|i| i.code == code).cloned())
    }

    fn items(&self) -> Result<Vec<Item>, StoreError> {
        self.read(|t| {
            let mut items: Vec<Item> = t.items.values().cloned().collect();
            items.sort_by(|a, b| a.code.cmp(&b.code));
            items
        })
    }

    fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.items.contains_key(&item.id) {
            return Err(StoreError::NotFound(format!("item {}", item.id)));
        }
        if tables.items.values().any(|i| i.id != item.id && i.code == item.code) {
            return Err(StoreError::Conflict(format!("item code {} already exists", item.code)));
        }
        tables.items.insert(item.id, item.clone());
        Ok(())
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.items.contains_key(&id) {
            return Err(StoreError::NotFound(format!("item {id}")));
        }
        if tables.details.iter().any(|d| d.item_id == id) {
            return Err(StoreError::Conflict(format!("item {id} is used by order lines")));
        }
        if tables.stocks.contains_key(&id) {
            return Err(StoreError::Conflict(format!("item {id} has a stock entry")));
        }
        tables.items.remove(&id);
        Ok(())
    }
}

impl OrderReader for InMemoryStore {
    fn header<K: StoredOrder>(&self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError> {
        self.read(|t| t.header(id))
    }

    fn header_by_code<K: StoredOrder>(
        &self,
        code: &OrderCode,
    ) -> Result<Option<OrderHeader<K>>, StoreError> {
        self.read(|t| {
            t.headers
                .iter()
                .find(|h| h.series == K::SERIES && &h.code == code)
                .map(HeaderRow::to_header)
        })
    }

    fn headers<K: StoredOrder>(&self) -> Result<Vec<OrderHeader<K>>, StoreError> {
        self.read(|t| t.headers_where(|_| true))
    }

    fn details<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError> {
        self.read(|t| t.details(header_id))
    }

    fn detail<K: StoredOrder>(&self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError> {
        self.read(|t| t.detail(id))
    }

    fn detail_views<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<DetailView<K>>, StoreError> {
        self.read(|t| {
            t.details::<K>(header_id)
                .into_iter()
                .filter_map(|detail| {
                    let item = t.items.get(&detail.item_id)?;
                    Some(DetailView {
                        item_code: item.code.clone(),
                        item_description: item.description.clone(),
                        detail,
                    })
                })
                .collect()
        })
    }

    fn headers_by_counterparty<K: StoredOrder>(
        &self,
        fragment: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError> {
        let needle = fragment.to_lowercase();
        self.read(|t| t.headers_where(|h| h.name.to_lowercase().contains(&needle)))
    }

    fn headers_by_item_code<K: StoredOrder>(
        &self,
        item_code: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError> {
        self.read(|t| {
            let Some(item) = t.items.values().find(|i| i.code == item_code) else {
                return Vec::new();
            };
            t.headers_where(|h| {
                t.details
                    .iter()
                    .any(|d| d.series == K::SERIES && d.header_id == h.id && d.item_id == item.id)
            })
        })
    }
}
