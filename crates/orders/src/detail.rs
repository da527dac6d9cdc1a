use core::marker::PhantomData;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DetailId, DomainError, DomainResult, Entity, ItemId, OrderId, ValueObject};
use stockroom_inventory::StockDelta;

use crate::kind::OrderKind;

/// Caller-supplied line fields: which item, how many, at what unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailInput {
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl ValueObject for DetailInput {}

impl DetailInput {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.unit_price.is_sign_negative() {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        self.amount().map(|_| ())
    }

    /// quantity × unit price; `Validation` when the product does not fit a
    /// `Decimal`.
    pub fn amount(&self) -> DomainResult<Decimal> {
        Decimal::from(self.quantity)
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::validation("amount overflows"))
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct OrderDetail<K: OrderKind> {
    pub id: DetailId,
    pub header_id: OrderId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// quantity × unit price, fixed when the line is written.
    pub amount: Decimal,
    #[serde(skip)]
    kind: PhantomData<fn() -> K>,
}

impl<K: OrderKind> OrderDetail<K> {
    pub fn new(header_id: OrderId, input: DetailInput) -> DomainResult<Self> {
        input.validate()?;
        let amount = input.amount()?;
        Ok(Self::from_parts(
            DetailId::new(),
            header_id,
            input.item_id,
            input.quantity,
            input.unit_price,
            amount,
        ))
    }

    /// Rebuild a persisted line without re-validating it.
    pub fn from_parts(
        id: DetailId,
        header_id: OrderId,
        item_id: ItemId,
        quantity: i64,
        unit_price: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            id,
            header_id,
            item_id,
            quantity,
            unit_price,
            amount,
            kind: PhantomData,
        }
    }

    /// Replace item, quantity and price. The owning header never changes.
    pub fn revise(&mut self, input: DetailInput) -> DomainResult<()> {
        input.validate()?;
        self.amount = input.amount()?;
        self.item_id = input.item_id;
        self.quantity = input.quantity;
        self.unit_price = input.unit_price;
        Ok(())
    }

    /// Stock movement this line causes when its order is confirmed.
    pub fn stock_delta(&self) -> DomainResult<StockDelta> {
        StockDelta::for_line(K::STOCK_SIGN, self.quantity)
    }
}

impl<K: OrderKind> Entity for OrderDetail<K> {
    type Id = DetailId;

    fn id(&self) -> DetailId {
        self.id
    }
}

/// A detail line enriched with the item's code and description for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DetailView<K: OrderKind> {
    #[serde(flatten)]
    pub detail: OrderDetail<K>,
    pub item_code: String,
    pub item_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::Inbound;

    fn input(quantity: i64, unit_price: Decimal) -> DetailInput {
        DetailInput {
            item_id: ItemId::new(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn new_line_validates_quantity() {
        let err = OrderDetail::<Inbound>::new(OrderId::new(), input(0, Decimal::ONE)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = OrderDetail::<Inbound>::new(OrderId::new(), input(-3, Decimal::ONE)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn free_lines_are_allowed() {
        let line = OrderDetail::<Inbound>::new(OrderId::new(), input(2, Decimal::ZERO)).unwrap();
        assert_eq!(line.amount, Decimal::ZERO);
    }

    #[test]
    fn negative_price_is_rejected() {
        let err =
            OrderDetail::<Inbound>::new(OrderId::new(), input(1, Decimal::new(-1, 2))).unwrap_err();
        assert_eq!(err, DomainError::validation("unit price cannot be negative"));
    }

    #[test]
    fn overflowing_amount_is_rejected() {
        let err =
            OrderDetail::<Inbound>::new(OrderId::new(), input(i64::MAX, Decimal::MAX)).unwrap_err();
        assert_eq!(err, DomainError::validation("amount overflows"));

        let mut line = OrderDetail::<Inbound>::new(OrderId::new(), input(2, Decimal::ONE)).unwrap();
        let err = line.revise(input(i64::MAX, Decimal::MAX)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(line.quantity, 2);
        assert_eq!(line.amount, Decimal::TWO);
    }

    #[test]
    fn revise_keeps_header() {
        let header_id = OrderId::new();
        let mut line = OrderDetail::<Inbound>::new(header_id, input(2, Decimal::ONE)).unwrap();
        let replacement = input(5, Decimal::new(250, 2));
        line.revise(replacement.clone()).unwrap();

        assert_eq!(line.header_id, header_id);
        assert_eq!(line.item_id, replacement.item_id);
        assert_eq!(line.quantity, 5);
        assert_eq!(line.amount, Decimal::new(1250, 2));
    }

    #[test]
    fn stock_delta_follows_kind_sign() {
        let line = OrderDetail::<Inbound>::new(OrderId::new(), input(4, Decimal::ONE)).unwrap();
        assert_eq!(line.stock_delta().unwrap().value(), 4);
    }
}
