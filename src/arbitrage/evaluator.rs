//! Core evaluation maths. All off-chain figures are estimates in `f64`;
//! on-chain integer arithmetic lives with the settlement contract.

use super::types::{EvaluatorConfig, Opportunity, Verdict};
use crate::models::{PairSpec, Quote};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Gas in quote currency = gwei * 1e-9 ETH/gas * units * multiplier * (USD/ETH).
pub fn gas_cost_usd(gas_gwei: f64, gas_units: f64, gas_multiplier: f64, eth_price_usd: f64) -> f64 {
    gas_gwei * 1e-9 * gas_units * gas_multiplier * eth_price_usd
}

/// Per-pair slippage tolerance with a short memo.
///
/// Stable-stable pairs move in a narrow band, so their tolerance is halved;
/// a spread that needs loose slippage on a stable pair is usually stale data.
pub struct SlippageModel {
    base_tolerance: f64,
    memo_ttl: Duration,
    memo: Mutex<HashMap<String, (f64, Instant)>>,
}

const STABLE_SYMBOLS: &[&str] = &["USDC", "USDT", "DAI", "EURS"];

impl SlippageModel {
    pub fn new(base_tolerance: f64, memo_ttl: Duration) -> Self {
        Self {
            base_tolerance,
            memo_ttl,
            memo: Mutex::new(HashMap::new()),
        }
    }

    fn is_stable(symbol: &str) -> bool {
        STABLE_SYMBOLS.contains(&symbol)
    }

    pub fn tolerance_for(&self, pair: &PairSpec) -> f64 {
        let mut memo = self.memo.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((tolerance, at)) = memo.get(&pair.key()) {
            if at.elapsed() < self.memo_ttl {
                return *tolerance;
            }
        }
        let tolerance = if Self::is_stable(&pair.token_a) && Self::is_stable(&pair.token_b) {
            self.base_tolerance / 2.0
        } else {
            self.base_tolerance
        };
        memo.insert(pair.key(), (tolerance, Instant::now()));
        tolerance
    }
}

pub struct Evaluator {
    config: EvaluatorConfig,
    slippage: SlippageModel,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig, slippage: SlippageModel) -> Self {
        Self { config, slippage }
    }

    /// Best buy/sell combination across the quotes, or `None` when fewer
    /// than two venues answered. The returned opportunity always carries a
    /// verdict; callers act only on [`Verdict::Profitable`].
    pub fn evaluate(&self, pair: &PairSpec, quotes: &[Quote], gas_gwei: f64) -> Option<Opportunity> {
        if quotes.len() < 2 {
            return None;
        }

        // Ordered pair search: buy the cheap leg, unwind on the rich one.
        // Strict `>` keeps the first best found on ties.
        let mut best: Option<(usize, usize, f64)> = None;
        for (j, buy) in quotes.iter().enumerate() {
            for (i, sell) in quotes.iter().enumerate() {
                if i == j {
                    continue;
                }
                let spread = sell.price / buy.price - 1.0;
                if spread <= 0.0 {
                    continue;
                }
                let gross = spread * buy.amount * buy.price;
                if best.map(|(_, _, g)| gross > g).unwrap_or(true) {
                    best = Some((j, i, gross));
                }
            }
        }
        let (j, i, gross_profit) = best?;
        let buy = &quotes[j];
        let sell = &quotes[i];

        let spread = sell.price / buy.price - 1.0;
        let spread_bps = (spread * 10_000.0).floor().max(0.0) as u64;
        let slippage_budget = buy.slippage.abs() + sell.slippage.abs();
        let gas_cost_estimate = gas_cost_usd(
            gas_gwei,
            self.config.gas_units,
            self.config.gas_multiplier,
            self.config.eth_price_usd,
        );
        let net_profit_estimate = gross_profit - gas_cost_estimate;

        let tolerance = self.slippage.tolerance_for(pair);
        let verdict = if net_profit_estimate >= self.config.min_profit_usd
            && spread_bps >= self.config.min_spread_bps
            && slippage_budget < tolerance
        {
            Verdict::Profitable
        } else {
            Verdict::Unprofitable
        };
        debug!(
            pair = %pair,
            buy = buy.dex,
            sell = sell.dex,
            spread_bps,
            net_profit_estimate,
            ?verdict,
            "evaluated"
        );

        Some(Opportunity {
            pair: pair.clone(),
            buy_from: buy.dex.clone(),
            sell_to: sell.dex.clone(),
            price_buy: buy.price,
            price_sell: sell.price,
            amount: buy.amount,
            spread_bps,
            gross_profit,
            gas_cost_estimate,
            net_profit_estimate,
            slippage_budget,
            verdict,
        })
    }
}
