use anyhow::Result;
use ethers::types::Address;
use flashloan_arbitrage::{
    adapters::{PriceSource, SyntheticPriceSource},
    aggregator::PriceAggregator,
    arbitrage::{Evaluator, EvaluatorConfig, SlippageModel},
    chain::{ChainClient, InProcessChain},
    config::{EngineConfig, NetworkProfile},
    contract::{ChainEnv, LendingPool, SettlementContract, SwapVenue},
    resilience::{Resilience, ResilienceConfig, RetryPolicy},
    scanner::{ScanLoop, ScanSettings},
    submitter::ExecutionSubmitter,
    tradelog::TradeLog,
    utils,
};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = EngineConfig::load()?;
    let profile = NetworkProfile::builtin(&config.network)?;
    tracing::info!(
        network = profile.name,
        tokens = profile.tokens.len(),
        dexes = profile.dexes.len(),
        min_profit_usd = config.min_profit_usd,
        min_spread_bps = config.min_spread_bps,
        "[INIT] flashloan-arbitrage starting"
    );

    let contract_addr = Address::from_low_u64_be(0xC0DE);
    let chain: Arc<dyn ChainClient> = Arc::new(bootstrap_chain(&config, &profile, contract_addr)?);

    // Gas watcher feeds the evaluator's cost estimate; without an RPC
    // endpoint the default gwei from config applies.
    let (gas_tx, gas_rx) = watch::channel(0.0f64);
    if let Some(rpc_url) = &profile.rpc_url {
        let _gas_handle = utils::spawn_gas_price_watcher(rpc_url.as_str(), gas_tx, 10).await?;
        tracing::info!("[INIT] gas watcher started (10s interval)");
    }

    let resilience = Arc::new(Resilience::new(ResilienceConfig {
        rate_interval: config.rate_interval,
        call_timeout: config.call_timeout,
        retry: RetryPolicy::default(),
    }));

    let adapters = price_sources(&profile, &config);
    let aggregator = PriceAggregator::new(adapters, resilience.clone(), config.price_ttl);

    let evaluator = Evaluator::new(
        EvaluatorConfig {
            min_profit_usd: config.min_profit_usd,
            min_spread_bps: config.min_spread_bps,
            gas_units: config.gas_units,
            gas_multiplier: config.gas_multiplier,
            eth_price_usd: config.eth_price_usd,
        },
        SlippageModel::new(config.slippage_tolerance, config.slippage_memo_ttl),
    );

    let submitter = ExecutionSubmitter::new(
        chain.clone(),
        profile.token_table(),
        profile.private_relay.is_some(),
    );
    let trade_log = TradeLog::new(&config.trade_log_path);

    let scanner = Arc::new(ScanLoop::new(
        profile.monitored_pairs(),
        aggregator,
        evaluator,
        chain.clone(),
        submitter,
        resilience.clone(),
        trade_log,
        ScanSettings {
            scan_interval: config.scan_interval,
            pair_cooldown: config.pair_cooldown,
            pause_state_ttl: config.pause_state_ttl,
            default_gas_gwei: config.default_gas_gwei,
        },
        gas_rx,
    ));

    let mut events = scanner.subscribe();
    {
        let chain = chain.clone();
        let resilience = resilience.clone();
        let tokens = profile.token_table();
        let balance_ttl = config.balance_ttl;
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                tracing::info!(
                    pair = %event.opportunity.pair,
                    executed = event.executed,
                    net = event.opportunity.net_profit_estimate,
                    "[TRADE] attempt recorded"
                );
                // Retained-profit snapshot after an executed trade.
                if !event.executed {
                    continue;
                }
                let Some(token) = tokens.get(&event.opportunity.pair.token_a) else {
                    continue;
                };
                let key = format!("balance:{}:{:#x}", token.symbol, contract_addr);
                let token_addr = token.address;
                let chain = chain.clone();
                match resilience
                    .call(&key, balance_ttl, move || {
                        let chain = chain.clone();
                        async move { chain.token_balance(token_addr, contract_addr).await }
                    })
                    .await
                {
                    Ok(balance) => tracing::info!(
                        token = token.symbol,
                        balance = utils::u256_to_f64(balance, token.decimals),
                        "[TRADE] contract balance"
                    ),
                    Err(err) => tracing::warn!(error = %err, "balance snapshot failed"),
                }
            }
        });
    }

    let loop_task = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.run().await })
    };

    tokio::select! {
        _ = loop_task => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

/// One quote source per configured venue. The in-process settlement chain
/// fills swaps at a fixed size with no decimals-aware pricing, so every
/// profile quotes through the synthetic source; a live RPC-backed
/// `ChainClient` would bind `adapters::RouterPriceSource` at this seam.
fn price_sources(profile: &NetworkProfile, config: &EngineConfig) -> Vec<Arc<dyn PriceSource>> {
    profile
        .dexes
        .iter()
        .map(|dex| {
            Arc::new(SyntheticPriceSource::new(dex.name.clone(), config.trade_size))
                as Arc<dyn PriceSource>
        })
        .collect()
}

/// Builds the in-process settlement environment: lending pool at the
/// profile's premium, one venue per configured router, funded deep enough
/// that a round trip never fails on liquidity.
fn bootstrap_chain(
    config: &EngineConfig,
    profile: &NetworkProfile,
    contract_addr: Address,
) -> Result<InProcessChain> {
    let owner = Address::from_low_u64_be(0xBEEF);

    let mut env = ChainEnv::new(LendingPool::new(
        profile.lending_pool,
        profile.loan_premium_bps,
    ));
    for (i, dex) in profile.dexes.iter().enumerate() {
        let mut venue = SwapVenue::new(dex.router);
        venue.set_amount_out(utils::to_units(
            config.trade_size * (1.01 + 0.01 * i as f64),
            18,
        ));
        env.add_venue(venue);
    }
    for token in &profile.tokens {
        let depth = utils::to_units(1_000_000.0, token.decimals);
        env.ledger.mint(token.address, profile.lending_pool, depth);
        for dex in &profile.dexes {
            env.ledger.mint(token.address, dex.router, depth);
        }
    }

    // The contract enforces the spread floor and loan repayment on chain;
    // the dollar-denominated profit floor stays with the off-chain evaluator.
    let mut contract = SettlementContract::deploy(
        contract_addr,
        owner,
        ethers::types::U256::one(),
        config.min_spread_bps,
    );
    for dex in &profile.dexes {
        contract
            .configure_dex(owner, &dex.name, dex.router)
            .map_err(|e| anyhow::anyhow!("bootstrap: {e}"))?;
    }

    Ok(InProcessChain::new(
        contract,
        env,
        owner,
        profile.private_relay.is_some(),
    ))
}
