use stockroom_infra::{
    CatalogService, ConfirmationWorkflow, ItemCatalog, OrderReader, OrderService, StockLedger,
    StockService, TransactionalStore,
};
use stockroom_purchasing::Purchase;
use stockroom_sales::Sale;

/// Everything a store must provide for the API to run on it.
pub trait Backend:
    TransactionalStore + OrderReader + ItemCatalog + StockLedger + Clone + 'static
{
}

impl<S> Backend for S where
    S: TransactionalStore + OrderReader + ItemCatalog + StockLedger + Clone + 'static
{
}

/// Service set shared by every handler.
pub struct AppServices<S> {
    pub catalog: CatalogService<S>,
    pub stock: StockService<S>,
    pub purchases: OrderService<Purchase, S>,
    pub sales: OrderService<Sale, S>,
    pub receiving: ConfirmationWorkflow<Purchase, S>,
    pub sending: ConfirmationWorkflow<Sale, S>,
}

impl<S: Backend> AppServices<S> {
    pub fn new(store: S) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            stock: StockService::new(store.clone()),
            purchases: OrderService::new(store.clone()),
            sales: OrderService::new(store.clone()),
            receiving: ConfirmationWorkflow::new(store.clone()),
            sending: ConfirmationWorkflow::new(store),
        }
    }
}
