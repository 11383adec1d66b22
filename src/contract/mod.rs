//! Settlement contract state machine.
//!
//! Models the on-chain contract that borrows from the lending pool, runs the
//! two swap legs, repays principal plus premium and keeps the residual as
//! accumulated profit — all-or-nothing. Every mutator except the loan
//! callback is owner-gated, and each violated precondition reverts with its
//! own stable reason string so operator tooling can disambiguate failures.

pub mod env;

pub use env::{ChainEnv, LendingPool, SwapVenue, TokenLedger};

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Stable revert reasons. `Display` output is the wire-visible string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Revert {
    #[error("Caller is not the owner")]
    NotOwner,
    #[error("Contract paused")]
    Paused,
    #[error("Invalid router address")]
    InvalidRouter,
    #[error("Source DEX not configured")]
    SourceDexNotConfigured,
    #[error("Target DEX not configured")]
    TargetDexNotConfigured,
    #[error("Simple arbitrage path only")]
    PathTooLong,
    #[error("Swap path too short")]
    PathTooShort,
    #[error("Unsolicited flash loan callback")]
    UnsolicitedCallback,
    #[error("Insufficient funds to repay loan")]
    RepaymentShortfall,
    #[error("Insufficient output amount")]
    BelowMinReturn,
    #[error("Insufficient pool liquidity")]
    PoolLiquidity,
    #[error("Transfer amount exceeds balance")]
    InsufficientBalance,
    #[error("Router swap failed")]
    SwapFailed,
    #[error("Unknown venue for router")]
    UnknownVenue,
}

/// Auditable event log entries, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    DexConfigured { name: String, router: Address },
    ThresholdsUpdated { min_profit: U256, min_spread_bps: u64 },
    PauseToggled { paused: bool },
    ArbitrageExecuted { token: Address, amount: U256, profit: U256 },
    TokensRescued { token: Address, amount: U256 },
}

/// Result of the read-only arbitrage projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulation {
    pub profitable: bool,
    pub potential_profit: U256,
    pub spread_bps: u64,
}

/// Typed state tag for the flash-loan protocol: fund-moving logic only runs
/// while a loan this contract initiated is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoanPhase {
    Idle,
    Active,
}

#[derive(Debug, Clone)]
pub struct SettlementContract {
    address: Address,
    owner: Address,
    paused: bool,
    min_profit: U256,
    min_spread_bps: u64,
    dex_routers: HashMap<String, Address>,
    loan: LoanPhase,
    events: Vec<ContractEvent>,
}

impl SettlementContract {
    /// Deployment: unpaused, owner = deployer, empty router map.
    pub fn deploy(address: Address, owner: Address, min_profit: U256, min_spread_bps: u64) -> Self {
        Self {
            address,
            owner,
            paused: false,
            min_profit,
            min_spread_bps,
            dex_routers: HashMap::new(),
            loan: LoanPhase::Idle,
            events: Vec::new(),
        }
    }

    // ---- read accessors ---------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn min_profit_threshold(&self) -> U256 {
        self.min_profit
    }

    pub fn min_spread_threshold(&self) -> u64 {
        self.min_spread_bps
    }

    pub fn dex_router(&self, name: &str) -> Option<Address> {
        self.dex_routers.get(name).copied()
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    fn only_owner(&self, caller: Address) -> Result<(), Revert> {
        if caller != self.owner {
            return Err(Revert::NotOwner);
        }
        Ok(())
    }

    // ---- owner-gated configuration ----------------------------------------

    /// Registers (or overwrites) a router under a DEX name.
    pub fn configure_dex(
        &mut self,
        caller: Address,
        name: &str,
        router: Address,
    ) -> Result<(), Revert> {
        self.only_owner(caller)?;
        if router == Address::zero() {
            return Err(Revert::InvalidRouter);
        }
        self.dex_routers.insert(name.to_string(), router);
        self.events.push(ContractEvent::DexConfigured {
            name: name.to_string(),
            router,
        });
        Ok(())
    }

    /// Replaces both profitability thresholds atomically.
    pub fn set_profit_thresholds(
        &mut self,
        caller: Address,
        min_profit: U256,
        min_spread_bps: u64,
    ) -> Result<(), Revert> {
        self.only_owner(caller)?;
        self.min_profit = min_profit;
        self.min_spread_bps = min_spread_bps;
        self.events.push(ContractEvent::ThresholdsUpdated {
            min_profit,
            min_spread_bps,
        });
        Ok(())
    }

    /// Circuit breaker. Its own inverse: two calls restore the prior state.
    pub fn toggle_pause(&mut self, caller: Address) -> Result<bool, Revert> {
        self.only_owner(caller)?;
        self.paused = !self.paused;
        self.events.push(ContractEvent::PauseToggled {
            paused: self.paused,
        });
        Ok(self.paused)
    }

    // ---- arbitrage --------------------------------------------------------

    /// Read-only projection of the round trip: quotes both legs via the
    /// configured routers, nets out the loan premium, and checks the result
    /// against both thresholds. Callable by anyone; mutates nothing.
    pub fn simulate_arbitrage(
        &self,
        env: &ChainEnv,
        _token: Address,
        amount: U256,
        source_dex: &str,
        target_dex: &str,
        path: &[Address],
    ) -> Result<Simulation, Revert> {
        let source = self
            .dex_router(source_dex)
            .ok_or(Revert::SourceDexNotConfigured)?;
        let target = self
            .dex_router(target_dex)
            .ok_or(Revert::TargetDexNotConfigured)?;
        if path.len() != 2 {
            return Err(Revert::PathTooLong);
        }

        let leg_out = env.quote(source, amount, path)?;
        let back = [path[1], path[0]];
        let final_out = env.quote(target, leg_out, &back)?;

        let premium = env.pool.premium(amount);
        let owed = amount + premium;
        let potential_profit = final_out.saturating_sub(owed);
        let spread_bps = spread_bps(amount, final_out);
        let profitable =
            potential_profit >= self.min_profit && spread_bps >= self.min_spread_bps;
        Ok(Simulation {
            profitable,
            potential_profit,
            spread_bps,
        })
    }

    /// Owner-only atomic execution: borrow, swap out, swap back, repay
    /// principal plus premium. Residual `token` stays on the contract
    /// balance; any failure restores every balance to its pre-call value.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_arbitrage(
        &mut self,
        env: &mut ChainEnv,
        caller: Address,
        token: Address,
        amount: U256,
        source_dex: &str,
        target_dex: &str,
        path: &[Address],
        min_return: U256,
    ) -> Result<U256, Revert> {
        self.only_owner(caller)?;
        if self.paused {
            return Err(Revert::Paused);
        }
        let source = self
            .dex_router(source_dex)
            .ok_or(Revert::SourceDexNotConfigured)?;
        let target = self
            .dex_router(target_dex)
            .ok_or(Revert::TargetDexNotConfigured)?;
        if path.len() != 2 {
            return Err(Revert::PathTooLong);
        }

        // All preconditions hold; funds move only past this point.
        let snapshot = env.ledger.clone();
        self.loan = LoanPhase::Active;
        let result = self.run_loan(env, source, target, token, amount, path, min_return);
        self.loan = LoanPhase::Idle;
        match result {
            Ok(profit) => {
                self.events.push(ContractEvent::ArbitrageExecuted {
                    token,
                    amount,
                    profit,
                });
                Ok(profit)
            }
            Err(reason) => {
                env.ledger = snapshot;
                Err(reason)
            }
        }
    }

    /// Borrow-intent phase: the pool disburses, the callback runs the legs,
    /// then the pool pulls back `amount + premium` or the whole call unwinds.
    #[allow(clippy::too_many_arguments)]
    fn run_loan(
        &mut self,
        env: &mut ChainEnv,
        source: Address,
        target: Address,
        token: Address,
        amount: U256,
        path: &[Address],
        min_return: U256,
    ) -> Result<U256, Revert> {
        // Pool parameter, read at execution time.
        let premium = env.pool.premium(amount);
        let owed = amount + premium;

        env.pool.disburse(&mut env.ledger, token, self.address, amount)?;
        let received = self.on_flash_loan(env, source, target, amount, path, min_return)?;
        env.pool.settle(&mut env.ledger, token, self.address, owed)?;
        Ok(received.saturating_sub(owed))
    }

    /// Loan callback — the only place fund-moving swap logic executes.
    /// Rejects invocations that do not correspond to a loan this contract
    /// just initiated.
    pub fn on_flash_loan(
        &self,
        env: &mut ChainEnv,
        source: Address,
        target: Address,
        amount: U256,
        path: &[Address],
        min_return: U256,
    ) -> Result<U256, Revert> {
        if self.loan != LoanPhase::Active {
            return Err(Revert::UnsolicitedCallback);
        }
        let intermediate = env.swap(source, self.address, amount, path, U256::zero())?;
        let back = [path[1], path[0]];
        env.swap(target, self.address, intermediate, &back, min_return)
    }

    // ---- emergency --------------------------------------------------------

    /// Moves up to `amount` of `token` (capped at the actual balance) to the
    /// owner and records the amount actually transferred.
    pub fn rescue_tokens(
        &mut self,
        env: &mut ChainEnv,
        caller: Address,
        token: Address,
        amount: U256,
    ) -> Result<U256, Revert> {
        self.only_owner(caller)?;
        let balance = env.ledger.balance_of(token, self.address);
        let actual = amount.min(balance);
        if !actual.is_zero() {
            env.ledger.transfer(token, self.address, self.owner, actual)?;
        }
        self.events.push(ContractEvent::TokensRescued {
            token,
            amount: actual,
        });
        Ok(actual)
    }
}

/// Round-trip spread in integer basis points, floored at zero.
fn spread_bps(amount_in: U256, amount_out: U256) -> u64 {
    if amount_in.is_zero() {
        return 0;
    }
    let gain = amount_out.saturating_sub(amount_in);
    let bps = gain * U256::from(10_000u64) / amount_in;
    bps.min(U256::from(u64::MAX)).as_u64()
}
