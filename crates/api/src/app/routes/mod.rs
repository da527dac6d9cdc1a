use axum::Router;

use crate::app::services::Backend;

pub mod common;
pub mod items;
pub mod orders;
pub mod purchases;
pub mod sales;
pub mod stock;
pub mod system;

/// Router for every resource endpoint.
pub fn router<S: Backend>() -> Router {
    Router::new()
        .nest("/items", items::router::<S>())
        .nest("/purchases", purchases::router::<S>())
        .nest("/sales", sales::router::<S>())
        .nest("/stock", stock::router::<S>())
}
