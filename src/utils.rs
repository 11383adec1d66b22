//! Miscellaneous helper utilities.

use crate::errors::Result;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::U256;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Spawns a background task that periodically fetches the EIP-1559 base fee
/// and updates a `tokio::sync::watch::Sender<f64>` with a gas price estimate
/// in gwei. Caller decides the interval.
pub async fn spawn_gas_price_watcher(
    rpc_url: &str,
    tx: tokio::sync::watch::Sender<f64>,
    interval_secs: u64,
) -> Result<tokio::task::JoinHandle<()>> {
    let provider = Arc::new(
        Provider::<Http>::try_from(rpc_url)
            .map_err(|e| crate::errors::AppError::Other(e.to_string()))?,
    );
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match fetch_base_fee_gwei(&provider).await {
                Ok(gwei) => {
                    let _ = tx.send(gwei);
                }
                // Keep the last good estimate until the next tick.
                Err(err) => warn!(error = %err, "base fee fetch failed"),
            }
        }
    });
    Ok(handle)
}

/// Latest block's EIP-1559 base fee in gwei, zero for pre-1559 chains.
async fn fetch_base_fee_gwei(provider: &Provider<Http>) -> Result<f64> {
    let block = provider.get_block(ethers::types::BlockNumber::Latest).await?;
    let base_fee = block.and_then(|b| b.base_fee_per_gas).unwrap_or_default();
    Ok(base_fee.as_u128() as f64 / 1_000_000_000.0)
}

/// Scale a human-readable token amount into on-chain integer units.
pub fn to_units(amount: f64, decimals: u8) -> U256 {
    // Split into a millionths mantissa so common sizes survive the f64 trip.
    let micro = (amount * 1e6).round();
    if micro <= 0.0 {
        return U256::zero();
    }
    let micro = U256::from(micro as u128);
    if decimals >= 6 {
        micro * U256::exp10((decimals - 6) as usize)
    } else {
        micro / U256::exp10((6 - decimals) as usize)
    }
}

/// Convert on-chain integer units back to a human-readable amount.
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    let raw: f64 = value.to_string().parse().unwrap_or(f64::MAX);
    raw / 10f64.powi(decimals as i32)
}
