//! Shared data structures used throughout the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored token pair, identified by symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairSpec {
    pub token_a: String,
    pub token_b: String,
}

impl PairSpec {
    pub fn new(token_a: impl Into<String>, token_b: impl Into<String>) -> Self {
        Self {
            token_a: token_a.into(),
            token_b: token_b.into(),
        }
    }

    /// Stable key used for cool-downs, caches and memo tables.
    pub fn key(&self) -> String {
        format!("{}-{}", self.token_a, self.token_b)
    }
}

impl fmt::Display for PairSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token_a, self.token_b)
    }
}

/// One venue's answer to "what does this pair trade at right now".
///
/// Produced fresh each scan cycle and discarded after evaluation. Serializable
/// so it can pass through the resilience cache unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub dex: String,
    pub token_in: String,
    pub token_out: String,
    /// Units of `token_out` per unit of `token_in` at the quoted size.
    pub price: f64,
    /// Trade size the quote was priced for, in `token_in` units.
    pub amount: f64,
    /// Fractional adverse-move estimate for that size (0.003 = 0.3%).
    pub slippage: f64,
    pub observed_at: DateTime<Utc>,
}

impl Quote {
    /// A quote with a non-positive price carries no information and is
    /// excluded by the aggregator.
    pub fn is_valid(&self) -> bool {
        self.price > 0.0
    }
}
