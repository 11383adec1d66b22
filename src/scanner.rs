//! Scan loop: sweeps the monitored pairs on a fixed interval and runs each
//! one through cool-down check, pause check, aggregation, evaluation and,
//! when everything lines up, a single execution attempt.

use crate::aggregator::PriceAggregator;
use crate::arbitrage::{Evaluator, Opportunity};
use crate::chain::ChainClient;
use crate::errors::Result;
use crate::models::PairSpec;
use crate::resilience::Resilience;
use crate::submitter::{ExecutionSubmitter, TradeResult};
use crate::tradelog::TradeLog;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Broadcast to observers after every execution attempt.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    pub opportunity: Opportunity,
    pub executed: bool,
}

/// Why a single pair scan stopped where it did.
#[derive(Debug)]
pub enum ScanOutcome {
    OnCooldown,
    Offline,
    ContractPaused,
    InsufficientQuotes,
    NoOpportunity,
    Unprofitable,
    Attempted(TradeResult),
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub scan_interval: Duration,
    pub pair_cooldown: Duration,
    pub pause_state_ttl: Duration,
    /// Gas price assumed while the watcher has not reported yet, in gwei.
    pub default_gas_gwei: f64,
}

pub struct ScanLoop {
    pairs: Vec<PairSpec>,
    aggregator: PriceAggregator,
    evaluator: Evaluator,
    chain: Arc<dyn ChainClient>,
    submitter: ExecutionSubmitter,
    resilience: Arc<Resilience>,
    trade_log: TradeLog,
    settings: ScanSettings,
    gas_rx: watch::Receiver<f64>,
    events: broadcast::Sender<TradeEvent>,
    cooldowns: Mutex<HashMap<String, Instant>>,
}

impl ScanLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pairs: Vec<PairSpec>,
        aggregator: PriceAggregator,
        evaluator: Evaluator,
        chain: Arc<dyn ChainClient>,
        submitter: ExecutionSubmitter,
        resilience: Arc<Resilience>,
        trade_log: TradeLog,
        settings: ScanSettings,
        gas_rx: watch::Receiver<f64>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            pairs,
            aggregator,
            evaluator,
            chain,
            submitter,
            resilience,
            trade_log,
            settings,
            gas_rx,
            events,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.events.subscribe()
    }

    /// Marks the pair as scanned when it is off cool-down. The mark happens
    /// at scan start, so even failed attempts respect the cool-down.
    fn claim_cooldown(&self, pair: &PairSpec) -> bool {
        let mut cooldowns = self.cooldowns.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        if let Some(last) = cooldowns.get(&pair.key()) {
            if now.duration_since(*last) < self.settings.pair_cooldown {
                return false;
            }
        }
        cooldowns.insert(pair.key(), now);
        true
    }

    fn gas_gwei(&self) -> f64 {
        let reported = *self.gas_rx.borrow();
        if reported > 0.0 {
            reported
        } else {
            self.settings.default_gas_gwei
        }
    }

    pub async fn scan_pair(&self, pair: &PairSpec) -> Result<ScanOutcome> {
        if !self.claim_cooldown(pair) {
            return Ok(ScanOutcome::OnCooldown);
        }

        // While offline, one direct probe per scan decides whether
        // connectivity is back. Anything else stays buffered.
        if !self.resilience.is_online() {
            match self.chain.is_paused().await {
                Ok(_) => self.resilience.set_online(true),
                Err(_) => return Ok(ScanOutcome::Offline),
            }
        }

        let chain = self.chain.clone();
        let paused = match self
            .resilience
            .call("contract:paused", self.settings.pause_state_ttl, move || {
                let chain = chain.clone();
                async move { chain.is_paused().await }
            })
            .await
        {
            Ok(paused) => paused,
            // Connectivity loss aborts the cycle cleanly; the next sweep
            // probes for reconnection.
            Err(err) if err.is_connectivity() => {
                debug!(pair = %pair, error = %err, "connectivity lost, rescheduling");
                return Ok(ScanOutcome::Offline);
            }
            Err(err) => return Err(err),
        };
        if paused {
            debug!(pair = %pair, "settlement contract is paused, skipping");
            return Ok(ScanOutcome::ContractPaused);
        }

        let quotes = self.aggregator.collect_quotes(pair).await;
        if !PriceAggregator::sufficient(&quotes) {
            debug!(pair = %pair, quotes = quotes.len(), "not enough quotes to compare");
            return Ok(ScanOutcome::InsufficientQuotes);
        }

        let Some(opportunity) = self.evaluator.evaluate(pair, &quotes, self.gas_gwei()) else {
            return Ok(ScanOutcome::NoOpportunity);
        };
        if !opportunity.is_profitable() {
            return Ok(ScanOutcome::Unprofitable);
        }

        info!(
            pair = %pair,
            buy = opportunity.buy_from,
            sell = opportunity.sell_to,
            spread_bps = opportunity.spread_bps,
            net = opportunity.net_profit_estimate,
            "profitable opportunity, attempting execution"
        );
        let result = self.submitter.submit(opportunity).await?;
        if let Err(err) = self.trade_log.append(&result) {
            warn!(error = %err, "failed to append trade record");
        }
        let _ = self.events.send(TradeEvent {
            opportunity: result.opportunity.clone(),
            executed: result.executed,
        });
        Ok(ScanOutcome::Attempted(result))
    }

    /// Runs forever, sweeping every monitored pair once per interval.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.settings.scan_interval);
        info!(
            pairs = self.pairs.len(),
            interval_secs = self.settings.scan_interval.as_secs(),
            "scan loop started"
        );
        loop {
            ticker.tick().await;
            for pair in &self.pairs {
                match self.scan_pair(pair).await {
                    Ok(ScanOutcome::Attempted(result)) => {
                        info!(pair = %pair, executed = result.executed, "attempt recorded");
                    }
                    Ok(outcome) => debug!(pair = %pair, ?outcome, "scan finished"),
                    Err(err) => warn!(pair = %pair, error = %err, "scan failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PriceSource;
    use crate::arbitrage::{EvaluatorConfig, SlippageModel};
    use crate::config::TokenDesc;
    use crate::contract::Simulation;
    use crate::models::Quote;
    use crate::resilience::{ResilienceConfig, RetryPolicy};
    use async_trait::async_trait;
    use chrono::Utc;
    use ethers::types::{Address, H256, U256};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        dex: String,
        price: f64,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        fn name(&self) -> &str {
            &self.dex
        }

        async fn quote(&self, pair: &PairSpec) -> Result<Quote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Quote {
                dex: self.dex.clone(),
                token_in: pair.token_a.clone(),
                token_out: pair.token_b.clone(),
                price: self.price,
                amount: 1_000.0,
                slippage: 0.001,
                observed_at: Utc::now(),
            })
        }
    }

    struct FixedChain {
        paused: bool,
    }

    #[async_trait]
    impl ChainClient for FixedChain {
        async fn quote_route(
            &self,
            _dex: &str,
            _amount_in: U256,
            _path: &[Address],
        ) -> Result<U256> {
            Ok(U256::zero())
        }

        async fn is_paused(&self) -> Result<bool> {
            Ok(self.paused)
        }

        async fn simulate(&self, _call: &crate::chain::ArbitrageCall) -> Result<Simulation> {
            Ok(Simulation {
                profitable: true,
                potential_profit: U256::from(1u64),
                spread_bps: 200,
            })
        }

        async fn submit(
            &self,
            _call: &crate::chain::ArbitrageCall,
            route: crate::chain::SubmissionRoute,
        ) -> Result<crate::chain::TxOutcome> {
            Ok(crate::chain::TxOutcome {
                hash: H256::from_low_u64_be(1),
                success: true,
                realized_profit: Some(U256::from(1u64)),
                revert_reason: None,
                route,
            })
        }

        async fn token_balance(&self, _token: Address, _holder: Address) -> Result<U256> {
            Ok(U256::zero())
        }

        fn private_relay_available(&self) -> bool {
            false
        }
    }

    struct UnreachableChain;

    #[async_trait]
    impl ChainClient for UnreachableChain {
        async fn quote_route(
            &self,
            _dex: &str,
            _amount_in: U256,
            _path: &[Address],
        ) -> Result<U256> {
            Err(crate::errors::AppError::Network("rpc unreachable".into()))
        }

        async fn is_paused(&self) -> Result<bool> {
            Err(crate::errors::AppError::Network("rpc unreachable".into()))
        }

        async fn simulate(&self, _call: &crate::chain::ArbitrageCall) -> Result<Simulation> {
            Err(crate::errors::AppError::Network("rpc unreachable".into()))
        }

        async fn submit(
            &self,
            _call: &crate::chain::ArbitrageCall,
            _route: crate::chain::SubmissionRoute,
        ) -> Result<crate::chain::TxOutcome> {
            Err(crate::errors::AppError::Network("rpc unreachable".into()))
        }

        async fn token_balance(&self, _token: Address, _holder: Address) -> Result<U256> {
            Err(crate::errors::AppError::Network("rpc unreachable".into()))
        }

        fn private_relay_available(&self) -> bool {
            false
        }
    }

    fn scan_loop(paused: bool, calls: Arc<AtomicUsize>) -> ScanLoop {
        scan_loop_with(Arc::new(FixedChain { paused }), calls)
    }

    fn scan_loop_with(chain: Arc<dyn ChainClient>, calls: Arc<AtomicUsize>) -> ScanLoop {
        let resilience = Arc::new(Resilience::new(ResilienceConfig {
            rate_interval: Duration::from_millis(1),
            call_timeout: Duration::from_millis(500),
            retry: RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        }));
        let adapters: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(CountingSource {
                dex: "Uniswap".into(),
                price: 2_000.0,
                calls: calls.clone(),
            }),
            Arc::new(CountingSource {
                dex: "SushiSwap".into(),
                price: 2_001.0,
                calls,
            }),
        ];
        let aggregator =
            PriceAggregator::new(adapters, resilience.clone(), Duration::from_secs(60));
        let evaluator = Evaluator::new(
            EvaluatorConfig::default(),
            SlippageModel::new(0.005, Duration::from_secs(300)),
        );
        let tokens = HashMap::from([(
            "WETH".to_string(),
            TokenDesc {
                symbol: "WETH".into(),
                address: Address::from_low_u64_be(1),
                decimals: 18,
            },
        )]);
        let submitter = ExecutionSubmitter::new(chain.clone(), tokens, false);
        let (_, gas_rx) = watch::channel(0.0);
        ScanLoop::new(
            vec![PairSpec::new("WETH", "USDC")],
            aggregator,
            evaluator,
            chain,
            submitter,
            resilience,
            TradeLog::new(std::env::temp_dir().join("scan-test.jsonl")),
            ScanSettings {
                scan_interval: Duration::from_secs(5),
                pair_cooldown: Duration::from_secs(10),
                pause_state_ttl: Duration::from_secs(30),
                default_gas_gwei: 20.0,
            },
            gas_rx,
        )
    }

    #[tokio::test]
    async fn cooldown_blocks_an_immediate_rescan() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = scan_loop(false, calls.clone());
        let pair = PairSpec::new("WETH", "USDC");

        let first = scanner.scan_pair(&pair).await.expect("first scan");
        assert!(matches!(first, ScanOutcome::Unprofitable));
        let after_first = calls.load(Ordering::SeqCst);
        assert_eq!(after_first, 2);

        let second = scanner.scan_pair(&pair).await.expect("second scan");
        assert!(matches!(second, ScanOutcome::OnCooldown));
        assert_eq!(calls.load(Ordering::SeqCst), after_first);
    }

    #[tokio::test]
    async fn paused_contract_skips_before_any_quote_is_fetched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = scan_loop(true, calls.clone());
        let pair = PairSpec::new("WETH", "USDC");

        let outcome = scanner.scan_pair(&pair).await.expect("scan");
        assert!(matches!(outcome, ScanOutcome::ContractPaused));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connectivity_loss_aborts_the_cycle_instead_of_blocking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = scan_loop_with(Arc::new(UnreachableChain), calls.clone());

        // The cycle must come back promptly with an offline outcome, never
        // park awaiting a reconnect that only a later cycle can trigger.
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            scanner.scan_pair(&PairSpec::new("WETH", "USDC")),
        )
        .await
        .expect("scan must return")
        .expect("scan outcome");
        assert!(matches!(outcome, ScanOutcome::Offline));
        assert!(!scanner.resilience.is_online());

        // Subsequent cycles short-circuit on the reconnect check.
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            scanner.scan_pair(&PairSpec::new("DAI", "USDT")),
        )
        .await
        .expect("scan must return")
        .expect("scan outcome");
        assert!(matches!(outcome, ScanOutcome::Offline));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no adapter calls while offline");
    }

    #[tokio::test]
    async fn gas_fallback_applies_until_the_watcher_reports() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = scan_loop(false, calls);
        assert_eq!(scanner.gas_gwei(), 20.0);
    }
}
