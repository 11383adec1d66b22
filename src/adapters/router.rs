//! Router-backed price source: prices a pair by quoting the DEX router
//! through the chain seam, the same `getAmountsOut` surface the settlement
//! contract trades against.

use super::PriceSource;
use crate::chain::ChainClient;
use crate::config::TokenDesc;
use crate::errors::{AppError, Result};
use crate::models::{PairSpec, Quote};
use crate::utils::{to_units, u256_to_f64};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RouterPriceSource {
    dex: String,
    chain: Arc<dyn ChainClient>,
    tokens: HashMap<String, TokenDesc>,
    /// Trade size quotes are priced for, in `token_in` units.
    trade_size: f64,
}

impl RouterPriceSource {
    pub fn new(
        dex: impl Into<String>,
        chain: Arc<dyn ChainClient>,
        tokens: HashMap<String, TokenDesc>,
        trade_size: f64,
    ) -> Self {
        Self {
            dex: dex.into(),
            chain,
            tokens,
            trade_size,
        }
    }

    fn token(&self, symbol: &str) -> Result<&TokenDesc> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| AppError::NoQuote(format!("{}: unknown token {symbol}", self.dex)))
    }
}

#[async_trait]
impl PriceSource for RouterPriceSource {
    fn name(&self) -> &str {
        &self.dex
    }

    async fn quote(&self, pair: &PairSpec) -> Result<Quote> {
        let token_in = self.token(&pair.token_a)?;
        let token_out = self.token(&pair.token_b)?;
        let path = [token_in.address, token_out.address];

        // Unit probe sets the marginal price; the full-size quote sets the
        // executable price. Their gap is the slippage estimate.
        let probe_in = to_units(1.0, token_in.decimals);
        let probe_out = self.chain.quote_route(&self.dex, probe_in, &path).await?;
        let marginal = u256_to_f64(probe_out, token_out.decimals);

        let size_in = to_units(self.trade_size, token_in.decimals);
        let size_out = self.chain.quote_route(&self.dex, size_in, &path).await?;
        let executable = u256_to_f64(size_out, token_out.decimals) / self.trade_size;

        if executable <= 0.0 || marginal <= 0.0 {
            return Err(AppError::NoQuote(format!(
                "{}: empty quote for {pair}",
                self.dex
            )));
        }
        let slippage = ((marginal - executable) / marginal).max(0.0);

        Ok(Quote {
            dex: self.dex.clone(),
            token_in: pair.token_a.clone(),
            token_out: pair.token_b.clone(),
            price: executable,
            amount: self.trade_size,
            slippage,
            observed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ArbitrageCall, SubmissionRoute, TxOutcome};
    use crate::contract::Simulation;
    use ethers::types::{Address, U256};

    /// Router stub returning a fixed out-per-in rate with a haircut at size.
    struct StubChain {
        rate_marginal: f64,
        rate_at_size: f64,
    }

    #[async_trait]
    impl ChainClient for StubChain {
        async fn quote_route(
            &self,
            _dex: &str,
            amount_in: U256,
            _path: &[Address],
        ) -> Result<U256> {
            // token_in 18 decimals, token_out 6 decimals in the fixture.
            let units_in = u256_to_f64(amount_in, 18);
            let rate = if units_in > 1.0 {
                self.rate_at_size
            } else {
                self.rate_marginal
            };
            Ok(to_units(units_in * rate, 6))
        }

        async fn is_paused(&self) -> Result<bool> {
            Ok(false)
        }

        async fn simulate(&self, _call: &ArbitrageCall) -> Result<Simulation> {
            unreachable!("not exercised")
        }

        async fn submit(&self, _call: &ArbitrageCall, _route: SubmissionRoute) -> Result<TxOutcome> {
            unreachable!("not exercised")
        }

        async fn token_balance(&self, _token: Address, _holder: Address) -> Result<U256> {
            Ok(U256::zero())
        }

        fn private_relay_available(&self) -> bool {
            false
        }
    }

    fn tokens() -> HashMap<String, TokenDesc> {
        HashMap::from([
            (
                "WETH".to_string(),
                TokenDesc {
                    symbol: "WETH".into(),
                    address: Address::from_low_u64_be(1),
                    decimals: 18,
                },
            ),
            (
                "USDC".to_string(),
                TokenDesc {
                    symbol: "USDC".into(),
                    address: Address::from_low_u64_be(2),
                    decimals: 6,
                },
            ),
        ])
    }

    #[tokio::test]
    async fn derives_price_and_slippage_from_two_probes() {
        let chain = Arc::new(StubChain {
            rate_marginal: 2_000.0,
            rate_at_size: 1_990.0,
        });
        let source = RouterPriceSource::new("Uniswap", chain, tokens(), 100.0);

        let quote = source
            .quote(&PairSpec::new("WETH", "USDC"))
            .await
            .expect("quote");
        assert_eq!(quote.dex, "Uniswap");
        assert!((quote.price - 1_990.0).abs() < 0.5);
        assert!(quote.slippage > 0.004 && quote.slippage < 0.006);
        assert_eq!(quote.amount, 100.0);
    }

    #[tokio::test]
    async fn unknown_token_is_no_quote() {
        let chain = Arc::new(StubChain {
            rate_marginal: 1.0,
            rate_at_size: 1.0,
        });
        let source = RouterPriceSource::new("Uniswap", chain, tokens(), 100.0);
        let err = source
            .quote(&PairSpec::new("WETH", "PEPE"))
            .await
            .expect_err("unknown token");
        assert!(matches!(err, AppError::NoQuote(_)));
    }
}
