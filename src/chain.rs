//! Chain access seam.
//!
//! Every on-chain read and write the engine performs goes through
//! [`ChainClient`], so the scan loop, aggregator and submitter never care
//! whether they are talking to a live RPC endpoint or the in-process
//! settlement environment used by the `local` profile and the test suite.

use crate::contract::{ChainEnv, SettlementContract, Simulation};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// How a signed transaction reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionRoute {
    /// Withheld from the public mempool to avoid being front-run.
    PrivateRelay,
    PublicBroadcast,
}

/// Fully-resolved `executeArbitrage` call, addresses and native units.
#[derive(Debug, Clone)]
pub struct ArbitrageCall {
    pub token: Address,
    pub amount: U256,
    pub source_dex: String,
    pub target_dex: String,
    pub path: Vec<Address>,
    pub min_return: U256,
}

/// What came back from a submitted transaction. A revert is an outcome,
/// not a transport error: balances are untouched and the reason string is
/// preserved for the trade log.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub hash: H256,
    pub success: bool,
    pub realized_profit: Option<U256>,
    pub revert_reason: Option<String>,
    pub route: SubmissionRoute,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Router quote for `amount_in` along `path` ("getAmountsOut" semantics).
    async fn quote_route(&self, dex: &str, amount_in: U256, path: &[Address]) -> Result<U256>;

    async fn is_paused(&self) -> Result<bool>;

    /// Authoritative read-only projection of the full round trip.
    async fn simulate(&self, call: &ArbitrageCall) -> Result<Simulation>;

    /// Sign and submit. Transport failures are `Err`; an on-chain revert is
    /// a successful submission with `success == false`.
    async fn submit(&self, call: &ArbitrageCall, route: SubmissionRoute) -> Result<TxOutcome>;

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256>;

    fn private_relay_available(&self) -> bool;
}

/// Chain client over the in-process settlement environment. The owner wallet
/// is fixed at construction, mirroring the signer a live binding would hold.
pub struct InProcessChain {
    state: Mutex<(SettlementContract, ChainEnv)>,
    signer: Address,
    relay: bool,
    nonce: AtomicU64,
}

impl InProcessChain {
    pub fn new(contract: SettlementContract, env: ChainEnv, signer: Address, relay: bool) -> Self {
        Self {
            state: Mutex::new((contract, env)),
            signer,
            relay,
            nonce: AtomicU64::new(0),
        }
    }

    /// Direct access for bootstrap and tests (funding venues, toggling pause).
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SettlementContract, &mut ChainEnv) -> R) -> R {
        let mut guard = self.state.lock().expect("chain state lock poisoned");
        let (contract, env) = &mut *guard;
        f(contract, env)
    }

    fn next_hash(&self) -> H256 {
        let n = self.nonce.fetch_add(1, Ordering::SeqCst);
        H256::from(keccak256(n.to_be_bytes()))
    }
}

#[async_trait]
impl ChainClient for InProcessChain {
    async fn quote_route(&self, dex: &str, amount_in: U256, path: &[Address]) -> Result<U256> {
        let guard = self.state.lock().expect("chain state lock poisoned");
        let (contract, env) = &*guard;
        let router = contract
            .dex_router(dex)
            .ok_or_else(|| AppError::NoQuote(format!("DEX {dex} has no configured router")))?;
        Ok(env.quote(router, amount_in, path)?)
    }

    async fn is_paused(&self) -> Result<bool> {
        let guard = self.state.lock().expect("chain state lock poisoned");
        Ok(guard.0.is_paused())
    }

    async fn simulate(&self, call: &ArbitrageCall) -> Result<Simulation> {
        let guard = self.state.lock().expect("chain state lock poisoned");
        let (contract, env) = &*guard;
        Ok(contract.simulate_arbitrage(
            env,
            call.token,
            call.amount,
            &call.source_dex,
            &call.target_dex,
            &call.path,
        )?)
    }

    async fn submit(&self, call: &ArbitrageCall, route: SubmissionRoute) -> Result<TxOutcome> {
        let mut guard = self.state.lock().expect("chain state lock poisoned");
        let (contract, env) = &mut *guard;
        let hash = self.next_hash();
        match contract.execute_arbitrage(
            env,
            self.signer,
            call.token,
            call.amount,
            &call.source_dex,
            &call.target_dex,
            &call.path,
            call.min_return,
        ) {
            Ok(profit) => Ok(TxOutcome {
                hash,
                success: true,
                realized_profit: Some(profit),
                revert_reason: None,
                route,
            }),
            Err(reason) => Ok(TxOutcome {
                hash,
                success: false,
                realized_profit: None,
                revert_reason: Some(reason.to_string()),
                route,
            }),
        }
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256> {
        let guard = self.state.lock().expect("chain state lock poisoned");
        Ok(guard.1.ledger.balance_of(token, holder))
    }

    fn private_relay_available(&self) -> bool {
        self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{LendingPool, SwapVenue};

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn one() -> U256 {
        U256::exp10(18)
    }

    fn chain() -> InProcessChain {
        let owner = addr(0xA1);
        let pool = addr(0x99);
        let router = addr(0x11);
        let (token_a, token_b) = (addr(1), addr(2));

        let mut env = ChainEnv::new(LendingPool::new(pool, 9));
        let mut venue = SwapVenue::new(router);
        venue.set_amount_out(one() * U256::from(2u64));
        env.add_venue(venue);
        env.ledger.mint(token_a, pool, one() * U256::from(1000u64));
        env.ledger.mint(token_a, router, one() * U256::from(1000u64));
        env.ledger.mint(token_b, router, one() * U256::from(1000u64));

        let mut contract =
            SettlementContract::deploy(addr(0xC0), owner, one() / 10, 50);
        contract
            .configure_dex(owner, "Uniswap", router)
            .expect("configure");
        contract
            .configure_dex(owner, "SushiSwap", router)
            .expect("configure");
        InProcessChain::new(contract, env, owner, true)
    }

    #[tokio::test]
    async fn quote_route_reads_the_configured_router() {
        let chain = chain();
        let out = chain
            .quote_route("Uniswap", one(), &[addr(1), addr(2)])
            .await
            .expect("quote");
        assert_eq!(out, one() * U256::from(2u64));
    }

    #[tokio::test]
    async fn submit_surfaces_reverts_as_failed_outcomes() {
        let chain = chain();
        chain.with_state(|contract, _| {
            let owner = contract.owner();
            contract.toggle_pause(owner).expect("pause");
        });
        let call = ArbitrageCall {
            token: addr(1),
            amount: one(),
            source_dex: "Uniswap".into(),
            target_dex: "SushiSwap".into(),
            path: vec![addr(1), addr(2)],
            min_return: U256::zero(),
        };
        let outcome = chain
            .submit(&call, SubmissionRoute::PublicBroadcast)
            .await
            .expect("submission itself succeeds");
        assert!(!outcome.success);
        assert_eq!(outcome.revert_reason.as_deref(), Some("Contract paused"));
    }
}
