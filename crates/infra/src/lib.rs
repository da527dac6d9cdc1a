//! Infrastructure layer: storage backends, sequence and stock ledger
//! implementations, order services and the confirmation workflow.

pub mod error;
pub mod services;
pub mod store;


pub use error::StoreError;
pub use services::{
    CatalogService, ConfirmationWorkflow, LineRequest, OrderService, ServiceError, ServiceResult,
    StockService,
};
pub use store::{
    InMemoryStore, ItemCatalog, OrderReader, PgStore, SequenceGenerator, StockLedger, StoredOrder,
    TransactionalStore, UnitOfWork,
};
