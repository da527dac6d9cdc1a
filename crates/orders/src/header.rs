use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, OrderId};

use crate::code::OrderCode;
use crate::kind::{Counterparty, OrderKind};

/// Order lifecycle. `Confirmed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Confirmed,
}

impl OrderStatus {
    pub fn from_confirmed(confirmed: bool) -> Self {
        if confirmed {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Draft
        }
    }

    pub fn is_confirmed(self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }
}

/// Order header: the aggregate root owning detail lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct OrderHeader<K: OrderKind> {
    pub id: OrderId,
    pub code: OrderCode,
    pub counterparty: K::Counterparty,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Replacement business fields for a draft header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderUpdate<K: OrderKind> {
    /// Raw code as supplied by the caller; validated on apply.
    pub code: String,
    pub counterparty: K::Counterparty,
}

impl<K: OrderKind> OrderHeader<K> {
    /// Open a new draft order.
    pub fn open(
        code: OrderCode,
        counterparty: K::Counterparty,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let counterparty = counterparty.normalized();
        counterparty.validate()?;

        Ok(Self {
            id: OrderId::new(),
            code,
            counterparty,
            created_at,
            status: OrderStatus::Draft,
        })
    }

    pub fn is_confirmed(&self) -> bool {
        self.status.is_confirmed()
    }

    /// Reject any mutation once the order has been confirmed.
    pub fn ensure_draft(&self) -> DomainResult<()> {
        if self.is_confirmed() {
            return Err(DomainError::already_confirmed(format!(
                "{} {} ({})",
                K::LABEL,
                self.code,
                K::CONFIRMED_LABEL
            )));
        }
        Ok(())
    }

    /// Replace code and counterparty of a draft order.
    pub fn revise(&mut self, update: HeaderUpdate<K>) -> DomainResult<()> {
        self.ensure_draft()?;

        let code = OrderCode::parse(&update.code)?;
        let counterparty = update.counterparty.normalized();
        counterparty.validate()?;

        self.code = code;
        self.counterparty = counterparty;
        Ok(())
    }

    /// Draft → Confirmed. Fails on an already confirmed order.
    pub fn confirm(&mut self) -> DomainResult<()> {
        self.ensure_draft()?;
        self.status = OrderStatus::Confirmed;
        Ok(())
    }
}

impl<K: OrderKind> Entity for OrderHeader<K> {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}
