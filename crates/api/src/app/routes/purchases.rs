use axum::Router;

use stockroom_infra::{ConfirmationWorkflow, OrderService};
use stockroom_purchasing::Purchase;

use crate::app::routes::orders::{self, OrderEndpoints};
use crate::app::services::{AppServices, Backend};

impl OrderEndpoints for Purchase {
    const CONFIRM_PATH: &'static str = "/headers/:id/receive";

    fn orders<S: Backend>(services: &AppServices<S>) -> &OrderService<Self, S> {
        &services.purchases
    }

    fn workflow<S: Backend>(services: &AppServices<S>) -> &ConfirmationWorkflow<Self, S> {
        &services.receiving
    }
}

pub fn router<S: Backend>() -> Router {
    orders::router::<Purchase, S>()
}
