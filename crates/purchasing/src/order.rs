use serde::{Deserialize, Serialize};

use stockroom_orders::{Counterparty, OrderDetail, OrderHeader, OrderKind, Series};

/// Supplier a purchase is placed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(rename = "supplier_name")]
    pub name: String,
}

impl Supplier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Counterparty for Supplier {
    fn name(&self) -> &str {
        &self.name
    }

    fn from_parts(name: String, _phone: Option<String>) -> Self {
        Self { name }
    }
}

/// Purchase order kind: supplier counterparty, receiving adds stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase;

impl OrderKind for Purchase {
    type Counterparty = Supplier;

    const SERIES: Series = Series::Purchases;
    const STOCK_SIGN: i64 = 1;
    const LABEL: &'static str = "purchase";
    const CONFIRMED_LABEL: &'static str = "received";
}

pub type PurchaseHeader = OrderHeader<Purchase>;
pub type PurchaseDetail = OrderDetail<Purchase>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use stockroom_core::{DomainError, ItemId};
    use stockroom_orders::{DetailInput, OrderCode, OrderStatus};

    fn open(name: &str) -> PurchaseHeader {
        PurchaseHeader::open(OrderCode::first(), Supplier::new(name), Utc::now()).unwrap()
    }

    #[test]
    fn new_purchase_is_a_draft() {
        let header = open("Acme Supplies");
        assert_eq!(header.status, OrderStatus::Draft);
        assert_eq!(header.counterparty.name, "Acme Supplies");
    }

    #[test]
    fn supplier_name_is_required() {
        let err = PurchaseHeader::open(OrderCode::first(), Supplier::new(""), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("counterparty name cannot be empty"));
    }

    #[test]
    fn receiving_adds_stock() {
        let header = open("Acme");
        let line = PurchaseDetail::new(
            header.id,
            DetailInput {
                item_id: ItemId::new(),
                quantity: 10,
                unit_price: Decimal::new(199, 2),
            },
        )
        .unwrap();
        assert_eq!(line.stock_delta().unwrap().value(), 10);
    }

    #[test]
    fn received_purchase_rejects_edits() {
        let mut header = open("Acme");
        header.confirm().unwrap();
        let err = header.ensure_draft().unwrap_err();
        assert_eq!(
            err,
            DomainError::already_confirmed("purchase 0000000001 (received)")
        );
    }

    #[test]
    fn header_json_uses_supplier_name() {
        let header = open("Acme");
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["counterparty"]["supplier_name"], "Acme");
        assert_eq!(json["status"], "draft");
        assert_eq!(json["code"], "0000000001");
    }
}
