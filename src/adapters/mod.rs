//! Price source adapters.
//!
//! One capability interface per exchange: a [`PriceSource`] answers a single
//! question, "what does this pair trade at for my size". New exchanges are
//! added by implementing the trait, never by branching on an exchange name.
//! A failed or non-positive quote means "no quote", which the aggregator
//! treats as a normal miss, not a fatal error.

pub mod router;
pub mod synthetic;

pub use router::RouterPriceSource;
pub use synthetic::SyntheticPriceSource;

use crate::errors::Result;
use crate::models::{PairSpec, Quote};
use async_trait::async_trait;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Exchange name, used for cache keys and opportunity records.
    fn name(&self) -> &str;

    async fn quote(&self, pair: &PairSpec) -> Result<Quote>;
}
