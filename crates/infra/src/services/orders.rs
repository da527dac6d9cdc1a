use core::marker::PhantomData;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockroom_catalog::ItemRef;
use stockroom_core::{DetailId, OrderId};
use stockroom_orders::{DetailInput, DetailView, HeaderUpdate, OrderCode, OrderDetail, OrderHeader};

use super::{ServiceError, ServiceResult};
use crate::store::{ItemCatalog, OrderReader, StoredOrder, TransactionalStore, UnitOfWork};

/// A detail line as requested by a caller: the item may be given by id or
/// by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub item: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// Header and detail management for one order kind.
///
/// Every mutation runs in its own unit of work with the owning header
/// locked, and is refused once the order is confirmed.
pub struct OrderService<K, S> {
    store: S,
    kind: PhantomData<fn() -> K>,
}

impl<K, S: Clone> Clone for OrderService<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            kind: PhantomData,
        }
    }
}

impl<K, S> OrderService<K, S>
where
    K: StoredOrder,
    S: TransactionalStore + OrderReader + ItemCatalog,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            kind: PhantomData,
        }
    }

    /// Open a draft with the next code of the series.
    #[instrument(skip_all, fields(kind = K::LABEL), err)]
    pub fn create_header(&self, counterparty: K::Counterparty) -> ServiceResult<OrderHeader<K>> {
        let mut tx = self.store.begin()?;
        let code = tx.reserve_code(K::SERIES)?;
        let header = OrderHeader::<K>::open(code, counterparty, Utc::now())?;
        tx.insert_header(&header)?;
        tx.commit()?;

        info!(header_id = %header.id, code = %header.code, "{} created", K::LABEL);
        Ok(header)
    }

    /// Replace code and counterparty of a draft.
    #[instrument(skip(self, update), fields(kind = K::LABEL), err)]
    pub fn update_header(&self, id: OrderId, update: HeaderUpdate<K>) -> ServiceResult<OrderHeader<K>> {
        let mut tx = self.store.begin()?;
        let mut header = Self::locked_header(&mut tx, id)?;
        header.revise(update)?;
        tx.update_header(&header)?;
        tx.commit()?;
        Ok(header)
    }

    pub fn header(&self, id: OrderId) -> ServiceResult<OrderHeader<K>> {
        self.store
            .header::<K>(id)?
            .ok_or_else(|| header_not_found::<K>(id))
    }

    pub fn header_by_code(&self, raw_code: &str) -> ServiceResult<OrderHeader<K>> {
        let code = OrderCode::parse(raw_code)?;
        self.store
            .header_by_code::<K>(&code)?
            .ok_or_else(|| ServiceError::NotFound(format!("{} with code {code}", K::LABEL)))
    }

    pub fn headers(&self) -> ServiceResult<Vec<OrderHeader<K>>> {
        Ok(self.store.headers::<K>()?)
    }

    /// Delete a draft and all of its lines.
    #[instrument(skip(self), fields(kind = K::LABEL), err)]
    pub fn delete_header(&self, id: OrderId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        let header = Self::locked_header(&mut tx, id)?;
        header.ensure_draft()?;
        tx.delete_header::<K>(id)?;
        tx.commit()?;

        info!(header_id = %id, code = %header.code, "{} deleted", K::LABEL);
        Ok(())
    }

    /// Attach a line to a draft; the amount is fixed here.
    #[instrument(skip(self, line), fields(kind = K::LABEL), err)]
    pub fn add_detail(&self, header_id: OrderId, line: LineRequest) -> ServiceResult<OrderDetail<K>> {
        let input = self.resolve_line(line)?;

        let mut tx = self.store.begin()?;
        let header = Self::locked_header(&mut tx, header_id)?;
        header.ensure_draft()?;
        let detail = OrderDetail::<K>::new(header_id, input)?;
        tx.insert_detail(&detail)?;
        tx.commit()?;
        Ok(detail)
    }

    /// Replace item, quantity and price of a line of a draft.
    #[instrument(skip(self, line), fields(kind = K::LABEL), err)]
    pub fn update_detail(&self, id: DetailId, line: LineRequest) -> ServiceResult<OrderDetail<K>> {
        let input = self.resolve_line(line)?;

        let mut tx = self.store.begin()?;
        let mut detail = Self::existing_detail(&mut tx, id)?;
        let header = Self::locked_header(&mut tx, detail.header_id)?;
        header.ensure_draft()?;
        detail.revise(input)?;
        tx.update_detail(&detail)?;
        tx.commit()?;
        Ok(detail)
    }

    #[instrument(skip(self), fields(kind = K::LABEL), err)]
    pub fn delete_detail(&self, id: DetailId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        let detail = Self::existing_detail(&mut tx, id)?;
        let header = Self::locked_header(&mut tx, detail.header_id)?;
        header.ensure_draft()?;
        tx.delete_detail::<K>(id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn detail(&self, id: DetailId) -> ServiceResult<OrderDetail<K>> {
        self.store
            .detail::<K>(id)?
            .ok_or_else(|| detail_not_found::<K>(id))
    }

    /// Lines of an existing header, in insertion order.
    pub fn details(&self, header_id: OrderId) -> ServiceResult<Vec<OrderDetail<K>>> {
        self.header(header_id)?;
        Ok(self.store.details::<K>(header_id)?)
    }

    /// Lines of an existing header with item code and description.
    pub fn detail_views(&self, header_id: OrderId) -> ServiceResult<Vec<DetailView<K>>> {
        self.header(header_id)?;
        Ok(self.store.detail_views::<K>(header_id)?)
    }

    /// Case-insensitive substring search on the counterparty name.
    pub fn search_by_counterparty(&self, fragment: &str) -> ServiceResult<Vec<OrderHeader<K>>> {
        Ok(self.store.headers_by_counterparty::<K>(fragment.trim())?)
    }

    /// Orders that contain a line for the item with `item_code`.
    pub fn headers_by_item_code(&self, item_code: &str) -> ServiceResult<Vec<OrderHeader<K>>> {
        Ok(self.store.headers_by_item_code::<K>(item_code.trim())?)
    }

    fn resolve_line(&self, line: LineRequest) -> ServiceResult<DetailInput> {
        let reference = ItemRef::parse(&line.item)?;
        let item = self.store.resolve_item(&reference)?;
        let input = DetailInput {
            item_id: item.id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        input.validate()?;
        Ok(input)
    }

    fn locked_header<T: UnitOfWork>(tx: &mut T, id: OrderId) -> ServiceResult<OrderHeader<K>> {
        tx.lock_header::<K>(id)?
            .ok_or_else(|| header_not_found::<K>(id))
    }

    fn existing_detail<T: UnitOfWork>(tx: &mut T, id: DetailId) -> ServiceResult<OrderDetail<K>> {
        tx.detail::<K>(id)?
            .ok_or_else(|| detail_not_found::<K>(id))
    }
}

pub(crate) fn header_not_found<K: StoredOrder>(id: OrderId) -> ServiceError {
    ServiceError::NotFound(format!("{} {id}", K::LABEL))
}

fn detail_not_found<K: StoredOrder>(id: DetailId) -> ServiceError {
    ServiceError::NotFound(format!("{} detail {id}", K::LABEL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockroom_catalog::NewItem;
    use stockroom_orders::OrderStatus;
    use stockroom_purchasing::{Purchase, Supplier};
    use stockroom_sales::{Customer, Sale};

    use crate::store::InMemoryStore;

    fn setup() -> (Arc<InMemoryStore>, String) {
        let store = Arc::new(InMemoryStore::new());
        let item = NewItem {
            code: "X".to_string(),
            description: "Item X".to_string(),
            cost: Decimal::new(200, 2),
            price: Decimal::new(500, 2),
        }
        .into_item()
        .unwrap();
        store.insert_item(&item).unwrap();
        (store, item.id.to_string())
    }

    fn line(item: &str, quantity: i64, unit_price: Decimal) -> LineRequest {
        LineRequest {
            item: item.to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn codes_increase_per_series() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store.clone());
        let sales = OrderService::<Sale, _>::new(store);

        let first = purchases.create_header(Supplier::new("Acme")).unwrap();
        let second = purchases.create_header(Supplier::new("Acme")).unwrap();
        let sale = sales.create_header(Customer::new("Bob")).unwrap();

        assert_eq!(first.code.as_str(), "0000000001");
        assert_eq!(second.code.as_str(), "0000000002");
        assert_eq!(sale.code.as_str(), "0000000001");
    }

    #[test]
    fn blank_counterparty_does_not_consume_a_code() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);

        let err = purchases.create_header(Supplier::new(" ")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let header = purchases.create_header(Supplier::new("Acme")).unwrap();
        assert_eq!(header.code.as_str(), "0000000001");
    }

    #[test]
    fn add_detail_resolves_item_by_code_and_fixes_amount() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);
        let header = purchases.create_header(Supplier::new("Acme")).unwrap();

        let detail = purchases
            .add_detail(header.id, line("X", 10, Decimal::new(200, 2)))
            .unwrap();
        assert_eq!(detail.amount, Decimal::new(2000, 2));

        let views = purchases.detail_views(header.id).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].item_code, "X");
        assert_eq!(views[0].item_description, "Item X");
    }

    #[test]
    fn add_detail_rejects_unknown_item_and_bad_quantities() {
        let (store, item) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);
        let header = purchases.create_header(Supplier::new("Acme")).unwrap();

        let err = purchases
            .add_detail(header.id, line("NOPE", 1, Decimal::ONE))
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = purchases
            .add_detail(header.id, line(&item, 0, Decimal::ONE))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = purchases
            .add_detail(header.id, line(&item, 1, Decimal::new(-1, 0)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = purchases
            .add_detail(OrderId::new(), line(&item, 1, Decimal::ONE))
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn update_header_validates_code() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);
        let header = purchases.create_header(Supplier::new("Acme")).unwrap();

        let err = purchases
            .update_header(
                header.id,
                HeaderUpdate {
                    code: String::new(),
                    counterparty: Supplier::new("Acme"),
                },
            )
            .unwrap_err();
        assert_eq!(err, ServiceError::Validation("code is required".to_string()));

        let updated = purchases
            .update_header(
                header.id,
                HeaderUpdate {
                    code: "42".to_string(),
                    counterparty: Supplier::new("Globex"),
                },
            )
            .unwrap();
        assert_eq!(updated.code.as_str(), "0000000042");
        assert_eq!(purchases.header_by_code("42").unwrap().counterparty.name, "Globex");

        let next = purchases.create_header(Supplier::new("Initech")).unwrap();
        assert_eq!(next.code.as_str(), "0000000043");
    }

    #[test]
    fn update_header_rejects_taken_code() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);
        purchases.create_header(Supplier::new("Acme")).unwrap();
        let second = purchases.create_header(Supplier::new("Globex")).unwrap();

        let err = purchases
            .update_header(
                second.id,
                HeaderUpdate {
                    code: "1".to_string(),
                    counterparty: Supplier::new("Globex"),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn update_detail_recomputes_amount() {
        let (store, item) = setup();
        let sales = OrderService::<Sale, _>::new(store);
        let header = sales.create_header(Customer::new("Bob")).unwrap();
        let detail = sales
            .add_detail(header.id, line(&item, 3, Decimal::new(500, 2)))
            .unwrap();

        let updated = sales
            .update_detail(detail.id, line("X", 4, Decimal::new(250, 2)))
            .unwrap();
        assert_eq!(updated.header_id, header.id);
        assert_eq!(updated.amount, Decimal::new(1000, 2));
        assert_eq!(sales.detail(detail.id).unwrap(), updated);
    }

    #[test]
    fn delete_detail_removes_only_that_line() {
        let (store, item) = setup();
        let sales = OrderService::<Sale, _>::new(store);
        let header = sales.create_header(Customer::new("Bob")).unwrap();
        let first = sales.add_detail(header.id, line(&item, 1, Decimal::ONE)).unwrap();
        let second = sales.add_detail(header.id, line(&item, 2, Decimal::ONE)).unwrap();

        sales.delete_detail(first.id).unwrap();

        let remaining = sales.details(header.id).unwrap();
        assert_eq!(remaining, vec![second]);
        assert!(matches!(
            sales.delete_detail(first.id).unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn lines_keep_insertion_order() {
        let (store, item) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);
        let header = purchases.create_header(Supplier::new("Acme")).unwrap();
        let ids: Vec<DetailId> = (1..=5)
            .map(|q| purchases.add_detail(header.id, line(&item, q, Decimal::ONE)).unwrap().id)
            .collect();

        let listed: Vec<DetailId> = purchases.details(header.id).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn purchase_and_sale_ids_do_not_cross() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store.clone());
        let sales = OrderService::<Sale, _>::new(store);
        let header = purchases.create_header(Supplier::new("Acme")).unwrap();

        assert!(matches!(sales.header(header.id).unwrap_err(), ServiceError::NotFound(_)));
        assert_eq!(purchases.header(header.id).unwrap().status, OrderStatus::Draft);
    }

    #[test]
    fn search_by_counterparty_ignores_case() {
        let (store, _) = setup();
        let sales = OrderService::<Sale, _>::new(store);
        sales.create_header(Customer::new("Bob Builder")).unwrap();
        sales.create_header(Customer::new("Alice")).unwrap();
        sales.create_header(Customer::new("bobby")).unwrap();

        let found = sales.search_by_counterparty("BOB").unwrap();
        let names: Vec<&str> = found.iter().map(|h| h.counterparty.name.as_str()).collect();
        assert_eq!(names, vec!["Bob Builder", "bobby"]);
    }

    #[test]
    fn headers_by_item_code_finds_orders_with_the_item() {
        let (store, item) = setup();
        let sales = OrderService::<Sale, _>::new(store);
        let with_item = sales.create_header(Customer::new("Bob")).unwrap();
        sales.create_header(Customer::new("Alice")).unwrap();
        sales.add_detail(with_item.id, line(&item, 1, Decimal::ONE)).unwrap();

        let found = sales.headers_by_item_code("X").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, with_item.id);
        assert!(sales.headers_by_item_code("Y").unwrap().is_empty());
    }

    #[test]
    fn header_by_code_rejects_garbage() {
        let (store, _) = setup();
        let purchases = OrderService::<Purchase, _>::new(store);
        assert!(matches!(
            purchases.header_by_code("abc").unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            purchases.header_by_code("7").unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
