use crate::models::PairSpec;
use serde::{Deserialize, Serialize};

/// Off-chain judgement on an opportunity. The on-chain simulation still has
/// the final word before anything is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Profitable,
    Unprofitable,
}

/// Best candidate trade found in one scan cycle for one pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub pair: PairSpec,
    /// Venue quoting the cheaper leg, where the borrowed funds buy.
    pub buy_from: String,
    /// Venue quoting the richer leg, where the position unwinds.
    pub sell_to: String,
    pub price_buy: f64,
    pub price_sell: f64,
    /// Trade size in `token_a` units.
    pub amount: f64,
    pub spread_bps: u64,
    /// Revenue before gas, in quote currency.
    pub gross_profit: f64,
    pub gas_cost_estimate: f64,
    pub net_profit_estimate: f64,
    /// Combined slippage of both legs (fractional).
    pub slippage_budget: f64,
    pub verdict: Verdict,
}

impl Opportunity {
    pub fn is_profitable(&self) -> bool {
        self.verdict == Verdict::Profitable
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Net profit floor, in quote currency.
    pub min_profit_usd: f64,
    pub min_spread_bps: u64,
    pub gas_units: f64,
    pub gas_multiplier: f64,
    pub eth_price_usd: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            min_profit_usd: 50.0,
            min_spread_bps: 50,
            gas_units: 350_000.0,
            gas_multiplier: 1.2,
            eth_price_usd: 3_500.0,
        }
    }
}
