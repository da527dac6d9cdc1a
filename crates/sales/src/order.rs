use serde::{Deserialize, Serialize};

use stockroom_orders::{Counterparty, OrderDetail, OrderHeader, OrderKind, Series};

/// Customer a sale is made to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "customer_name")]
    pub name: String,
    #[serde(rename = "customer_phone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

impl Counterparty for Customer {
    fn name(&self) -> &str {
        &self.name
    }

    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    fn from_parts(name: String, phone: Option<String>) -> Self {
        Self { name, phone }
    }
}

/// Sales order kind: customer counterparty, sending subtracts stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sale;

impl OrderKind for Sale {
    type Counterparty = Customer;

    const SERIES: Series = Series::Sales;
    const STOCK_SIGN: i64 = -1;
    const LABEL: &'static str = "sale";
    const CONFIRMED_LABEL: &'static str = "sent";
}

pub type SalesHeader = OrderHeader<Sale>;
pub type SalesDetail = OrderDetail<Sale>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use stockroom_core::{DomainError, ItemId};
    use stockroom_orders::{DetailInput, OrderCode};

    #[test]
    fn sending_subtracts_stock() {
        let header = SalesHeader::open(OrderCode::first(), Customer::new("Jane"), Utc::now()).unwrap();
        let line = SalesDetail::new(
            header.id,
            DetailInput {
                item_id: ItemId::new(),
                quantity: 3,
                unit_price: Decimal::new(500, 2),
            },
        )
        .unwrap();
        assert_eq!(line.stock_delta().unwrap().value(), -3);
        assert_eq!(line.amount, Decimal::new(1500, 2));
    }

    #[test]
    fn blank_phone_is_dropped() {
        let header = SalesHeader::open(
            OrderCode::first(),
            Customer::new(" Jane ").with_phone("   "),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(header.counterparty, Customer::new("Jane"));
    }

    #[test]
    fn phone_is_kept_trimmed() {
        let header = SalesHeader::open(
            OrderCode::first(),
            Customer::new("Jane").with_phone(" 555-0100 "),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(header.counterparty.phone(), Some("555-0100"));
    }

    #[test]
    fn sent_sale_rejects_second_confirmation() {
        let mut header = SalesHeader::open(OrderCode::first(), Customer::new("Jane"), Utc::now()).unwrap();
        header.confirm().unwrap();
        assert_eq!(
            header.confirm().unwrap_err(),
            DomainError::already_confirmed("sale 0000000001 (sent)")
        );
    }

    #[test]
    fn customer_json_fields() {
        let customer: Customer =
            serde_json::from_str(r#"{"customer_name":"Jane","customer_phone":"555"}"#).unwrap();
        assert_eq!(customer, Customer::new("Jane").with_phone("555"));

        let json = serde_json::to_value(Customer::new("Bob")).unwrap();
        assert_eq!(json, serde_json::json!({"customer_name": "Bob"}));
    }
}
