use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_catalog::{ItemUpdate, NewItem};
use stockroom_core::ItemId;

use crate::app::dto;
use crate::app::routes::common::blocking;
use crate::app::services::{AppServices, Backend};

pub fn router<S: Backend>() -> Router {
    Router::new()
        .route("/", post(create_item::<S>).get(list_items::<S>))
        .route("/code/:code", get(get_item_by_code::<S>))
        .route(
            "/:id",
            get(get_item::<S>)
                .put(update_item::<S>)
                .delete(delete_item::<S>),
        )
}

pub async fn create_item<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<NewItem>,
) -> axum::response::Response {
    match blocking(&services, move |s| s.catalog.create_item(body)).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_items<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match blocking(&services, |s| s.catalog.items()).await {
        Ok(items) => Json(items).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_item<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| s.catalog.item(id)).await {
        Ok(item) => Json(item).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_item_by_code<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match blocking(&services, move |s| s.catalog.item_by_code(&code)).await {
        Ok(item) => Json(item).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_item<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Json(body): Json<ItemUpdate>,
) -> axum::response::Response {
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| s.catalog.update_item(id, body)).await {
        Ok(item) => Json(item).into_response(),
        Err(resp) => resp,
    }
}

/// Refused with 409 while order lines or stock refer to the item.
pub async fn delete_item<S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| s.catalog.delete_item(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}
