//! Application services over the storage boundary.
//!
//! Services own the business sequencing (which checks run, in which unit of
//! work) and turn domain and storage failures into [`ServiceError`]. They
//! contain no IO themselves; everything goes through the store traits.

pub mod catalog;
pub mod error;
pub mod orders;
pub mod stock;
pub mod workflow;

pub use catalog::CatalogService;
pub use error::ServiceError;
pub use orders::{LineRequest, OrderService};
pub use stock::StockService;
pub use workflow::ConfirmationWorkflow;

/// Result type of every service operation.
pub type ServiceResult<T> = Result<T, ServiceError>;
