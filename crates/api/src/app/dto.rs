use std::str::FromStr;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_infra::LineRequest;
use stockroom_orders::{DetailView, OrderHeader, OrderKind};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    #[serde(alias = "quantity")]
    pub delta: i64,
}

/// Header update: a code plus the kind's counterparty fields at top level.
#[derive(Debug, Deserialize)]
pub struct UpdateHeaderRequest<C> {
    #[serde(default)]
    pub code: String,
    #[serde(flatten)]
    pub counterparty: C,
}

/// Item, quantity and unit price of a line. The item may be given by id or
/// by code.
#[derive(Debug, Deserialize)]
pub struct LineBody {
    #[serde(alias = "item_id", alias = "item_code")]
    pub item: String,
    pub quantity: i64,
    #[serde(alias = "cost", alias = "price")]
    pub unit_price: Decimal,
}

impl From<LineBody> for LineRequest {
    fn from(body: LineBody) -> Self {
        LineRequest {
            item: body.item,
            quantity: body.quantity,
            unit_price: body.unit_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDetailRequest {
    #[serde(alias = "purchase_header_id", alias = "sales_header_id")]
    pub header_id: String,
    #[serde(flatten)]
    pub line: LineBody,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Name fragment; `?customer=` and `?supplier=` are accepted too.
    #[serde(default, alias = "customer", alias = "supplier")]
    pub name: String,
}

// -------------------------
// Response DTOs
// -------------------------

/// A header together with its lines for display.
#[derive(Debug, Serialize)]
#[serde(bound = "")]
pub struct HeaderWithDetails<K: OrderKind> {
    #[serde(flatten)]
    pub header: OrderHeader<K>,
    pub details: Vec<DetailView<K>>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path or body identifier, answering 400 when malformed.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.trim().parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id `{raw}`"),
        )
    })
}
