//! Opportunity evaluation: pick the best buy/sell leg combination from a
//! set of quotes and decide whether it clears the profitability bar.

pub mod evaluator;
pub mod types;

pub use evaluator::{Evaluator, SlippageModel, gas_cost_usd};
pub use types::{EvaluatorConfig, Opportunity, Verdict};
