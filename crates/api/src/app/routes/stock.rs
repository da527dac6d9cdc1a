use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
};

use stockroom_core::ItemId;

use crate::app::dto;
use crate::app::routes::common::blocking;
use crate::app::services::{AppServices, Backend};

pub fn router<S: Backend>() -> Router {
    Router::new()
        .route("/", get(list_stock::<S>))
        .route("/:item_id", get(get_stock::<S>).put(adjust_stock::<S>))
}

/// Every stock entry with item code and description.
pub async fn list_stock<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match blocking(&services, |s| s.stock.levels()).await {
        Ok(levels) => Json(levels).into_response(),
        Err(resp) => resp,
    }
}

/// One item's level with its code and description.
pub async fn get_stock<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match dto::parse_id(&item_id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| s.stock.level(item_id)).await {
        Ok(entry) => Json(entry).into_response(),
        Err(resp) => resp,
    }
}

/// Manual correction: add `delta` (positive or negative) to the quantity.
pub async fn adjust_stock<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match dto::parse_id(&item_id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| s.stock.adjust(item_id, body.delta)).await {
        Ok(entry) => Json(entry).into_response(),
        Err(resp) => resp,
    }
}
