//! Order kinds: what distinguishes a purchase from a sale.

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockroom_core::{DomainError, DomainResult};

/// Independent code series. Each series numbers its orders from
/// `0000000001` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Series {
    Purchases,
    Sales,
}

impl Series {
    pub fn as_str(&self) -> &'static str {
        match self {
            Series::Purchases => "purchases",
            Series::Sales => "sales",
        }
    }
}

impl core::fmt::Display for Series {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The other party of an order (supplier for purchases, customer for sales).
pub trait Counterparty:
    Clone + core::fmt::Debug + PartialEq + Eq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Display/search name. Must not be blank.
    fn name(&self) -> &str;

    /// Contact phone, for kinds that record one.
    fn phone(&self) -> Option<&str> {
        None
    }

    /// Rebuild from the stored columns.
    fn from_parts(name: String, phone: Option<String>) -> Self;

    fn validate(&self) -> DomainResult<()> {
        if self.name().trim().is_empty() {
            return Err(DomainError::validation("counterparty name cannot be empty"));
        }
        Ok(())
    }

    /// Copy with surrounding whitespace removed.
    fn normalized(&self) -> Self {
        let phone = self
            .phone()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self::from_parts(self.name().trim().to_string(), phone)
    }
}

/// Capability set that instantiates the generic order aggregate.
pub trait OrderKind:
    Clone + Copy + core::fmt::Debug + PartialEq + Eq + Send + Sync + 'static
{
    type Counterparty: Counterparty;

    /// Code series this kind draws from.
    const SERIES: Series;

    /// Direction confirmation moves stock: +1 receives, -1 ships.
    const STOCK_SIGN: i64;

    /// Human name of the kind, used in messages ("purchase", "sale").
    const LABEL: &'static str;

    /// Name of the confirmed state ("received", "sent").
    const CONFIRMED_LABEL: &'static str;
}
