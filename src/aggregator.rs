//! Price aggregator: fans out to every configured adapter concurrently and
//! keeps the valid quotes. Adapter failures and non-positive prices are
//! normal misses; fewer than two surviving quotes just skips the pair for
//! this cycle.

use crate::adapters::PriceSource;
use crate::models::{PairSpec, Quote};
use crate::resilience::Resilience;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Quotes from at least this many venues are needed to compare prices.
pub const MIN_QUOTES: usize = 2;

pub struct PriceAggregator {
    adapters: Vec<Arc<dyn PriceSource>>,
    resilience: Arc<Resilience>,
    price_ttl: Duration,
}

impl PriceAggregator {
    pub fn new(
        adapters: Vec<Arc<dyn PriceSource>>,
        resilience: Arc<Resilience>,
        price_ttl: Duration,
    ) -> Self {
        Self {
            adapters,
            resilience,
            price_ttl,
        }
    }

    /// All valid quotes for the pair, in no particular order.
    pub async fn collect_quotes(&self, pair: &PairSpec) -> Vec<Quote> {
        let fetches = self.adapters.iter().map(|adapter| {
            let adapter = adapter.clone();
            let pair = pair.clone();
            let key = format!("price:{}:{}", adapter.name(), pair.key());
            let resilience = self.resilience.clone();
            let ttl = self.price_ttl;
            async move {
                let name = adapter.name().to_string();
                let result = resilience
                    .call(&key, ttl, move || {
                        let adapter = adapter.clone();
                        let pair = pair.clone();
                        async move { adapter.quote(&pair).await }
                    })
                    .await;
                (name, result)
            }
        });

        let mut quotes = Vec::new();
        for (dex, result) in join_all(fetches).await {
            match result {
                Ok(quote) if quote.is_valid() => quotes.push(quote),
                Ok(quote) => debug!(dex, price = quote.price, "dropping non-positive quote"),
                Err(err) => debug!(dex, error = %err, "no quote this cycle"),
            }
        }
        quotes
    }

    /// Whether the cycle has enough venues to compare.
    pub fn sufficient(quotes: &[Quote]) -> bool {
        quotes.len() >= MIN_QUOTES
    }
}
