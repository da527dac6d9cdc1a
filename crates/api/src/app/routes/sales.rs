use axum::Router;

use stockroom_infra::{ConfirmationWorkflow, OrderService};
use stockroom_sales::Sale;

use crate::app::routes::orders::{self, OrderEndpoints};
use crate::app::services::{AppServices, Backend};

impl OrderEndpoints for Sale {
    const CONFIRM_PATH: &'static str = "/headers/:id/send";

    fn orders<S: Backend>(services: &AppServices<S>) -> &OrderService<Self, S> {
        &services.sales
    }

    fn workflow<S: Backend>(services: &AppServices<S>) -> &ConfirmationWorkflow<Self, S> {
        &services.sending
    }
}

pub fn router<S: Backend>() -> Router {
    orders::router::<Sale, S>()
}
