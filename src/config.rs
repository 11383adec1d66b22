//! Network profiles and engine settings.
//!
//! A profile carries everything that differs between chains: RPC endpoint,
//! chain id, token address table, lending pool, router table and the
//! optional private relay. Switching profiles is a reconfiguration
//! (`NETWORK` env var), never a code change. Engine knobs load from the
//! environment with sane defaults.

use crate::errors::{AppError, Result};
use crate::models::PairSpec;
use ethers::types::Address;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct TokenDesc {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone)]
pub struct DexDesc {
    pub name: String,
    pub router: Address,
    pub fee_bps: u64,
}

#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub name: String,
    pub rpc_url: Option<Url>,
    pub chain_id: u64,
    pub lending_pool: Address,
    /// Flash-loan premium the profile's pool charges, in basis points.
    pub loan_premium_bps: u64,
    pub tokens: Vec<TokenDesc>,
    pub dexes: Vec<DexDesc>,
    pub private_relay: Option<Url>,
}

impl NetworkProfile {
    /// Built-in profiles. `local` runs entirely in process with synthetic
    /// venues; the others carry real address tables.
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "ethereum" => Ok(Self {
                name: "ethereum".into(),
                rpc_url: rpc_from_env()?,
                chain_id: 1,
                lending_pool: addr("0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
                loan_premium_bps: 9,
                tokens: vec![
                    token("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
                    token("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
                    token("DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18),
                    token("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
                    token("WBTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8),
                    token("AAVE", "0x7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9", 18),
                    token("LINK", "0x514910771AF9Ca656af840dff83E8264EcF986CA", 18),
                ],
                dexes: vec![
                    dex("Uniswap", "0xE592427A0AEce92De3Edee1F18E0157C05861564", 30),
                    dex("SushiSwap", "0x1b02dA8Cb0d097eB8D57A175b88c7D8b47997506", 30),
                ],
                private_relay: Some(parse_url("https://relay.flashbots.net")?),
            }),
            "sepolia" => Ok(Self {
                name: "sepolia".into(),
                rpc_url: rpc_from_env()?,
                chain_id: 11_155_111,
                lending_pool: addr("0x012bAC54348C0E635dCAc9D5FB99f06F24136C9A"),
                loan_premium_bps: 9,
                tokens: vec![
                    token("USDC", "0xda9d4f9b69ac6C22e444eD9aF0CfC043b7a7f53f", 6),
                    token("DAI", "0xFF34B3d4Aee8ddCd6F9AFFFB6Fe49bD371b8a357", 18),
                    token("USDT", "0x7169D38820dfd117C3FA1f22a697dBA58d90BA06", 6),
                    token("WBTC", "0x29f2D40B0605204364af54EC677bD022dA425d03", 8),
                    token("AAVE", "0x88541670E55cC00bEEFD87eB59EDd1b7C511AC9a", 18),
                    token("LINK", "0x779877A7B0D9E8603169DdbD7836e478b4624789", 18),
                ],
                dexes: vec![
                    dex("Uniswap", "0xE592427A0AEce92De3Edee1F18E0157C05861564", 30),
                    dex("SushiSwap", "0x1b02dA8Cb0d097eB8D57A175b88c7D8b47997506", 30),
                ],
                private_relay: Some(parse_url("https://relay.flashbots.net")?),
            }),
            "local" => Ok(Self {
                name: "local".into(),
                rpc_url: None,
                chain_id: 31_337,
                lending_pool: Address::from_low_u64_be(0x99),
                loan_premium_bps: 9,
                tokens: vec![
                    local_token("WETH", 0x01, 18),
                    local_token("USDC", 0x02, 6),
                    local_token("DAI", 0x03, 18),
                    local_token("USDT", 0x04, 6),
                ],
                dexes: vec![
                    local_dex("Uniswap", 0x11),
                    local_dex("SushiSwap", 0x12),
                    local_dex("Curve", 0x13),
                    local_dex("Balancer", 0x14),
                ],
                private_relay: None,
            }),
            other => Err(AppError::Config(format!("unknown network profile: {other}"))),
        }
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenDesc> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    pub fn token_table(&self) -> HashMap<String, TokenDesc> {
        self.tokens
            .iter()
            .map(|t| (t.symbol.clone(), t.clone()))
            .collect()
    }

    /// Every ordered pair of profile tokens is monitored.
    pub fn monitored_pairs(&self) -> Vec<PairSpec> {
        let mut pairs = Vec::new();
        for a in &self.tokens {
            for b in &self.tokens {
                if a.symbol != b.symbol {
                    pairs.push(PairSpec::new(a.symbol.clone(), b.symbol.clone()));
                }
            }
        }
        pairs
    }
}

fn addr(s: &str) -> Address {
    s.parse().expect("static address table entry")
}

fn token(symbol: &str, address: &str, decimals: u8) -> TokenDesc {
    TokenDesc {
        symbol: symbol.into(),
        address: addr(address),
        decimals,
    }
}

fn local_token(symbol: &str, low: u64, decimals: u8) -> TokenDesc {
    TokenDesc {
        symbol: symbol.into(),
        address: Address::from_low_u64_be(low),
        decimals,
    }
}

fn dex(name: &str, router: &str, fee_bps: u64) -> DexDesc {
    DexDesc {
        name: name.into(),
        router: addr(router),
        fee_bps,
    }
}

fn local_dex(name: &str, low: u64) -> DexDesc {
    DexDesc {
        name: name.into(),
        router: Address::from_low_u64_be(low),
        fee_bps: 30,
    }
}

fn parse_url(s: &str) -> Result<Url> {
    Ok(Url::parse(s)?)
}

fn rpc_from_env() -> Result<Option<Url>> {
    match std::env::var("RPC_URL") {
        Ok(raw) => Ok(Some(Url::parse(&raw)?)),
        Err(_) => Ok(None),
    }
}

/// Engine-wide settings, loadable from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub network: String,
    /// Off-chain profitability bar, in quote currency.
    pub min_profit_usd: f64,
    pub min_spread_bps: u64,
    pub scan_interval: Duration,
    /// A pair is never re-scanned more often than once per cool-down.
    pub pair_cooldown: Duration,
    pub price_ttl: Duration,
    pub pause_state_ttl: Duration,
    pub balance_ttl: Duration,
    pub rate_interval: Duration,
    pub call_timeout: Duration,
    pub gas_units: f64,
    pub gas_multiplier: f64,
    /// Baseline slippage tolerance (fractional).
    pub slippage_tolerance: f64,
    pub slippage_memo_ttl: Duration,
    /// Reference quote-currency price for gas conversion.
    pub eth_price_usd: f64,
    /// Gas price assumed when no live feed is attached, in gwei.
    pub default_gas_gwei: f64,
    /// Trade size quotes are priced for, in token units.
    pub trade_size: f64,
    pub trade_log_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: "local".into(),
            min_profit_usd: 50.0,
            min_spread_bps: 50,
            scan_interval: Duration::from_secs(5),
            pair_cooldown: Duration::from_secs(10),
            price_ttl: Duration::from_secs(300),
            pause_state_ttl: Duration::from_secs(30),
            balance_ttl: Duration::from_secs(180),
            rate_interval: Duration::from_secs(1),
            call_timeout: Duration::from_secs(10),
            gas_units: 350_000.0,
            gas_multiplier: 1.2,
            slippage_tolerance: 0.005,
            slippage_memo_ttl: Duration::from_secs(300),
            eth_price_usd: 3_500.0,
            default_gas_gwei: 20.0,
            trade_size: 1_000.0,
            trade_log_path: "trade-logs.jsonl".into(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables where set.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            network: env_or("NETWORK", defaults.network)?,
            min_profit_usd: env_or("MIN_PROFIT_USD", defaults.min_profit_usd)?,
            min_spread_bps: env_or("MIN_SPREAD_BPS", defaults.min_spread_bps)?,
            scan_interval: secs_or("SCAN_INTERVAL_SECS", defaults.scan_interval)?,
            pair_cooldown: secs_or("PAIR_COOLDOWN_SECS", defaults.pair_cooldown)?,
            price_ttl: secs_or("PRICE_TTL_SECS", defaults.price_ttl)?,
            pause_state_ttl: secs_or("PAUSE_TTL_SECS", defaults.pause_state_ttl)?,
            balance_ttl: secs_or("BALANCE_TTL_SECS", defaults.balance_ttl)?,
            rate_interval: secs_or("RATE_INTERVAL_SECS", defaults.rate_interval)?,
            call_timeout: secs_or("CALL_TIMEOUT_SECS", defaults.call_timeout)?,
            gas_units: env_or("GAS_UNITS", defaults.gas_units)?,
            gas_multiplier: env_or("GAS_MULTIPLIER", defaults.gas_multiplier)?,
            slippage_tolerance: env_or("SLIPPAGE_TOLERANCE", defaults.slippage_tolerance)?,
            slippage_memo_ttl: secs_or("SLIPPAGE_MEMO_TTL_SECS", defaults.slippage_memo_ttl)?,
            eth_price_usd: env_or("ETH_PRICE_USD", defaults.eth_price_usd)?,
            default_gas_gwei: env_or("DEFAULT_GAS_GWEI", defaults.default_gas_gwei)?,
            trade_size: env_or("TRADE_SIZE", defaults.trade_size)?,
            trade_log_path: env_or("TRADE_LOG_PATH", defaults.trade_log_path)?,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn secs_or(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_secs(env_or(key, default.as_secs())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_resolve() {
        for name in ["ethereum", "sepolia", "local"] {
            let profile = NetworkProfile::builtin(name).expect("builtin profile");
            assert!(!profile.tokens.is_empty());
            assert!(profile.dexes.len() >= 2);
            assert_ne!(profile.lending_pool, Address::zero());
        }
        assert!(NetworkProfile::builtin("hardhat-fork").is_err());
    }

    #[test]
    fn monitored_pairs_are_every_ordered_combination() {
        let profile = NetworkProfile::builtin("local").expect("local profile");
        let n = profile.tokens.len();
        let pairs = profile.monitored_pairs();
        assert_eq!(pairs.len(), n * (n - 1));
        assert!(pairs.iter().all(|p| p.token_a != p.token_b));
    }
}
