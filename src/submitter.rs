//! Execution submitter: turns a profitable opportunity into a settlement
//! call, re-checks it against the authoritative on-chain simulation, and
//! submits at most once. A failed attempt is never blindly retried; the next
//! scan cycle re-evaluates from fresh quotes.

use crate::arbitrage::Opportunity;
use crate::chain::{ArbitrageCall, ChainClient, SubmissionRoute, TxOutcome};
use crate::config::TokenDesc;
use crate::errors::{AppError, Result};
use crate::utils::to_units;
use ethers::types::U256;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one execution attempt, ready for the trade log.
#[derive(Debug, Clone, Serialize)]
pub struct TradeResult {
    pub opportunity: Opportunity,
    pub executed: bool,
    pub tx_hash: Option<String>,
    pub realized_profit: Option<U256>,
    pub route: Option<SubmissionRoute>,
    pub failure_reason: Option<String>,
}

impl TradeResult {
    fn aborted(opportunity: Opportunity, reason: impl Into<String>) -> Self {
        Self {
            opportunity,
            executed: false,
            tx_hash: None,
            realized_profit: None,
            route: None,
            failure_reason: Some(reason.into()),
        }
    }
}

pub struct ExecutionSubmitter {
    chain: Arc<dyn ChainClient>,
    tokens: HashMap<String, TokenDesc>,
    relay_configured: bool,
}

impl ExecutionSubmitter {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        tokens: HashMap<String, TokenDesc>,
        relay_configured: bool,
    ) -> Self {
        Self {
            chain,
            tokens,
            relay_configured,
        }
    }

    fn build_call(&self, opportunity: &Opportunity) -> Result<ArbitrageCall> {
        let token_a = self.token(&opportunity.pair.token_a)?;
        let token_b = self.token(&opportunity.pair.token_b)?;
        Ok(ArbitrageCall {
            token: token_a.address,
            amount: to_units(opportunity.amount, token_a.decimals),
            source_dex: opportunity.buy_from.clone(),
            target_dex: opportunity.sell_to.clone(),
            path: vec![token_a.address, token_b.address],
            min_return: U256::zero(),
        })
    }

    fn token(&self, symbol: &str) -> Result<&TokenDesc> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| AppError::Config(format!("no address for token {symbol}")))
    }

    fn route(&self) -> SubmissionRoute {
        if self.relay_configured && self.chain.private_relay_available() {
            SubmissionRoute::PrivateRelay
        } else {
            SubmissionRoute::PublicBroadcast
        }
    }

    /// Simulate, then submit once. The on-chain simulation has the final
    /// word: a disagreement with the off-chain estimate aborts the attempt.
    pub async fn submit(&self, opportunity: Opportunity) -> Result<TradeResult> {
        let mut call = self.build_call(&opportunity)?;

        let simulation = self.chain.simulate(&call).await?;
        if !simulation.profitable {
            warn!(
                pair = %opportunity.pair,
                spread_bps = simulation.spread_bps,
                "on-chain simulation disagreed with the off-chain estimate, aborting"
            );
            return Ok(TradeResult::aborted(
                opportunity,
                "on-chain simulation disagreed with the off-chain estimate",
            ));
        }
        call.min_return = min_return(
            call.amount,
            simulation.potential_profit,
            opportunity.slippage_budget,
        );

        let route = self.route();
        let outcome = self.chain.submit(&call, route).await?;
        Ok(self.record(opportunity, outcome))
    }

    fn record(&self, opportunity: Opportunity, outcome: TxOutcome) -> TradeResult {
        if outcome.success {
            info!(
                pair = %opportunity.pair,
                tx = %outcome.hash,
                route = ?outcome.route,
                "arbitrage executed"
            );
        } else {
            warn!(
                pair = %opportunity.pair,
                tx = %outcome.hash,
                reason = outcome.revert_reason.as_deref().unwrap_or("unknown"),
                "arbitrage reverted"
            );
        }
        TradeResult {
            opportunity,
            executed: outcome.success,
            tx_hash: Some(format!("{:#x}", outcome.hash)),
            realized_profit: outcome.realized_profit,
            route: Some(outcome.route),
            failure_reason: outcome.revert_reason,
        }
    }
}

/// Floor on the settlement's final balance: the simulated outcome shaved by
/// the opportunity's slippage budget, in whole basis points.
fn min_return(amount: U256, potential_profit: U256, slippage_budget: f64) -> U256 {
    let expected = amount + potential_profit;
    let slip_bps = (slippage_budget * 10_000.0).round().clamp(0.0, 10_000.0) as u64;
    expected - expected * U256::from(slip_bps) / U256::from(10_000u64)
}
