//! Header and detail endpoints shared by purchases and sales.
//!
//! Each order kind mounts [`router`] under its own prefix and only supplies
//! which services to use and the path of its confirmation endpoint.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_core::{DetailId, OrderId};
use stockroom_infra::{ConfirmationWorkflow, LineRequest, OrderService, StoredOrder};
use stockroom_orders::HeaderUpdate;

use crate::app::dto;
use crate::app::routes::common::blocking;
use crate::app::services::{AppServices, Backend};

/// An order kind exposed over HTTP.
pub trait OrderEndpoints: StoredOrder {
    /// Confirmation route relative to the kind's prefix, e.g.
    /// `/headers/:id/receive`.
    const CONFIRM_PATH: &'static str;

    fn orders<S: Backend>(services: &AppServices<S>) -> &OrderService<Self, S>;

    fn workflow<S: Backend>(services: &AppServices<S>) -> &ConfirmationWorkflow<Self, S>;
}

pub fn router<K: OrderEndpoints, S: Backend>() -> Router {
    Router::new()
        .route("/headers", post(create_header::<K, S>).get(list_headers::<K, S>))
        .route("/headers/search", get(search_headers::<K, S>))
        .route("/headers/by-item/:item_code", get(headers_by_item::<K, S>))
        .route("/headers/code/:code", get(get_header_by_code::<K, S>))
        .route(
            "/headers/:id",
            get(get_header::<K, S>)
                .put(update_header::<K, S>)
                .delete(delete_header::<K, S>),
        )
        .route("/headers/:id/details", get(list_details::<K, S>))
        .route(K::CONFIRM_PATH, post(confirm::<K, S>))
        .route("/details", post(create_detail::<K, S>))
        .route(
            "/details/:id",
            get(get_detail::<K, S>)
                .put(update_detail::<K, S>)
                .delete(delete_detail::<K, S>),
        )
}

pub async fn create_header<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(counterparty): Json<K::Counterparty>,
) -> axum::response::Response {
    match blocking(&services, move |s| K::orders(s).create_header(counterparty)).await {
        Ok(header) => (StatusCode::CREATED, Json(header)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_headers<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match blocking(&services, |s| K::orders(s).headers()).await {
        Ok(headers) => Json(headers).into_response(),
        Err(resp) => resp,
    }
}

/// Header plus its lines joined with item code and description.
pub async fn get_header<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "header") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let found = blocking(&services, move |s| {
        let orders = K::orders(s);
        let header = orders.header(id)?;
        let details = orders.detail_views(id)?;
        Ok(dto::HeaderWithDetails { header, details })
    })
    .await;

    match found {
        Ok(view) => Json(view).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_header_by_code<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match blocking(&services, move |s| K::orders(s).header_by_code(&code)).await {
        Ok(header) => Json(header).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_header<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateHeaderRequest<K::Counterparty>>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "header") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let update = HeaderUpdate {
        code: body.code,
        counterparty: body.counterparty,
    };

    match blocking(&services, move |s| K::orders(s).update_header(id, update)).await {
        Ok(header) => Json(header).into_response(),
        Err(resp) => resp,
    }
}

pub async fn delete_header<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "header") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| K::orders(s).delete_header(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

pub async fn search_headers<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::SearchQuery>,
) -> axum::response::Response {
    match blocking(&services, move |s| K::orders(s).search_by_counterparty(&query.name)).await {
        Ok(headers) => Json(headers).into_response(),
        Err(resp) => resp,
    }
}

pub async fn headers_by_item<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(item_code): Path<String>,
) -> axum::response::Response {
    match blocking(&services, move |s| K::orders(s).headers_by_item_code(&item_code)).await {
        Ok(headers) => Json(headers).into_response(),
        Err(resp) => resp,
    }
}

/// Confirm a draft: receive a purchase or send a sale.
pub async fn confirm<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "header") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| K::workflow(s).confirm(id)).await {
        Ok(header) => Json(header).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_details<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match dto::parse_id(&id, "header") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| K::orders(s).detail_views(id)).await {
        Ok(views) => Json(views).into_response(),
        Err(resp) => resp,
    }
}

pub async fn create_detail<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::CreateDetailRequest>,
) -> axum::response::Response {
    let header_id: OrderId = match dto::parse_id(&body.header_id, "header") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let line: LineRequest = body.line.into();

    match blocking(&services, move |s| K::orders(s).add_detail(header_id, line)).await {
        Ok(detail) => (StatusCode::CREATED, Json(detail)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_detail<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DetailId = match dto::parse_id(&id, "detail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| K::orders(s).detail(id)).await {
        Ok(detail) => Json(detail).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_detail<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Json(body): Json<dto::LineBody>,
) -> axum::response::Response {
    let id: DetailId = match dto::parse_id(&id, "detail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let line: LineRequest = body.into();

    match blocking(&services, move |s| K::orders(s).update_detail(id, line)).await {
        Ok(detail) => Json(detail).into_response(),
        Err(resp) => resp,
    }
}

pub async fn delete_detail<K: OrderEndpoints, S: Backend>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DetailId = match dto::parse_id(&id, "detail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match blocking(&services, move |s| K::orders(s).delete_detail(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}
