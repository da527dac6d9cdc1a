//! Draft → confirmed transition with its stock movements.
//!
//! ```text
//! confirm(header_id)
//!   ↓
//! 1. Begin a unit of work, lock the header row
//!   ↓
//! 2. Reject unknown (NotFound) and already confirmed (AlreadyConfirmed) headers
//!   ↓
//! 3. Mark confirmed (conditional: only while still a draft)
//!   ↓
//! 4. Load every line, apply one stock delta per line (K::STOCK_SIGN × quantity)
//!   ↓
//! 5. Commit
//! ```
//!
//! Any failure before the commit drops the unit of work, so the header stays
//! a draft and no delta survives. Retrying a failed confirmation is safe.

use core::marker::PhantomData;

use tracing::{error, info, instrument, warn};

use stockroom_core::{DetailId, OrderId};
use stockroom_orders::OrderHeader;

use super::orders::header_not_found;
use super::{ServiceError, ServiceResult};
use crate::store::{StoredOrder, TransactionalStore, UnitOfWork};

/// Confirms orders of one kind: purchases are received, sales are sent.
pub struct ConfirmationWorkflow<K, S> {
    store: S,
    kind: PhantomData<fn() -> K>,
}

impl<K, S: Clone> Clone for ConfirmationWorkflow<K, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            kind: PhantomData,
        }
    }
}

impl<K, S> ConfirmationWorkflow<K, S>
where
    K: StoredOrder,
    S: TransactionalStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            kind: PhantomData,
        }
    }

    /// Confirm a draft and move stock for each of its lines.
    ///
    /// Returns the confirmed header. A stock failure on any line aborts the
    /// whole confirmation with [`ServiceError::PartialConfirmation`] listing
    /// the lines that had not been applied yet.
    #[instrument(skip(self), fields(kind = K::LABEL), err)]
    pub fn confirm(&self, header_id: OrderId) -> ServiceResult<OrderHeader<K>> {
        let mut tx = self.store.begin()?;

        let mut header = tx
            .lock_header::<K>(header_id)?
            .ok_or_else(|| header_not_found::<K>(header_id))?;

        if let Err(err) = header.confirm() {
            warn!(header_id = %header_id, code = %header.code, "{} already {}", K::LABEL, K::CONFIRMED_LABEL);
            return Err(err.into());
        }
        if !tx.mark_confirmed::<K>(header_id)? {
            warn!(header_id = %header_id, "{} confirmed concurrently", K::LABEL);
            return Err(ServiceError::AlreadyConfirmed(format!("{} {}", K::LABEL, header.code)));
        }

        let lines = tx.details::<K>(header_id)?;
        for (applied, line) in lines.iter().enumerate() {
            let outcome = line
                .stock_delta()
                .map_err(ServiceError::from)
                .and_then(|delta| tx.apply_delta(line.item_id, delta).map_err(ServiceError::from));

            if let Err(cause) = outcome {
                let pending: Vec<DetailId> = lines[applied..].iter().map(|l| l.id).collect();
                drop(tx);
                error!(
                    header_id = %header_id,
                    code = %header.code,
                    detail_id = %line.id,
                    pending = pending.len(),
                    error = %cause,
                    "{} confirmation aborted; rolled back",
                    K::LABEL
                );
                return Err(ServiceError::PartialConfirmation {
                    header_id,
                    pending,
                    reason: cause.to_string(),
                });
            }
        }

        tx.commit()?;

        info!(
            header_id = %header_id,
            code = %header.code,
            lines = lines.len(),
            "{} {}",
            K::LABEL,
            K::CONFIRMED_LABEL
        );
        Ok(header)
    }
}
