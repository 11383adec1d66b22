//! In-process chain environment the settlement contract runs against:
//! token balances, the flash-loan pool and the swap venues.

use super::Revert;
use ethers::types::{Address, U256};
use std::collections::HashMap;

/// Per-token, per-holder balance book with ERC-20 transfer semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLedger {
    balances: HashMap<(Address, Address), U256>,
}

impl TokenLedger {
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, token: Address, holder: Address, amount: U256) {
        let entry = self.balances.entry((token, holder)).or_default();
        *entry += amount;
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), Revert> {
        let src = self.balance_of(token, from);
        if src < amount {
            return Err(Revert::InsufficientBalance);
        }
        self.balances.insert((token, from), src - amount);
        let dst = self.balance_of(token, to);
        self.balances.insert((token, to), dst + amount);
        Ok(())
    }
}

/// Flash-loan pool: disburses principal and pulls back principal plus a
/// fixed basis-point premium. The premium is a pool parameter, read fresh
/// on every loan rather than baked into the contract.
#[derive(Debug, Clone)]
pub struct LendingPool {
    address: Address,
    premium_bps: u64,
}

impl LendingPool {
    pub fn new(address: Address, premium_bps: u64) -> Self {
        Self {
            address,
            premium_bps,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn premium_bps(&self) -> u64 {
        self.premium_bps
    }

    /// Premium charged on `amount` of principal.
    pub fn premium(&self, amount: U256) -> U256 {
        amount * U256::from(self.premium_bps) / U256::from(10_000u64)
    }

    pub fn disburse(
        &self,
        ledger: &mut TokenLedger,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), Revert> {
        ledger
            .transfer(token, self.address, to, amount)
            .map_err(|_| Revert::PoolLiquidity)
    }

    pub fn settle(
        &self,
        ledger: &mut TokenLedger,
        token: Address,
        from: Address,
        owed: U256,
    ) -> Result<(), Revert> {
        ledger
            .transfer(token, from, self.address, owed)
            .map_err(|_| Revert::RepaymentShortfall)
    }
}

/// A swap venue standing in for a DEX router. Fills at a configured output
/// amount, which is how the reference router mocks behave; live deployments
/// bind a real router behind the same quote/swap surface.
#[derive(Debug, Clone)]
pub struct SwapVenue {
    address: Address,
    amount_out: U256,
    fail_swaps: bool,
}

impl SwapVenue {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            amount_out: U256::zero(),
            fail_swaps: false,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_amount_out(&mut self, amount_out: U256) {
        self.amount_out = amount_out;
    }

    /// Fault injection: makes every swap revert mid-flight.
    pub fn set_fail_swaps(&mut self, fail: bool) {
        self.fail_swaps = fail;
    }

    /// Read-only projection of the swap output. Does not touch balances.
    pub fn quote(&self, _amount_in: U256, path: &[Address]) -> Result<U256, Revert> {
        if path.len() < 2 {
            return Err(Revert::PathTooShort);
        }
        Ok(self.amount_out)
    }

    fn swap(
        &self,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_in: U256,
        path: &[Address],
        min_out: U256,
    ) -> Result<U256, Revert> {
        if path.len() < 2 {
            return Err(Revert::PathTooShort);
        }
        if self.fail_swaps {
            return Err(Revert::SwapFailed);
        }
        let out = self.amount_out;
        if out < min_out {
            return Err(Revert::BelowMinReturn);
        }
        ledger.transfer(path[0], caller, self.address, amount_in)?;
        ledger.transfer(path[path.len() - 1], self.address, caller, out)?;
        Ok(out)
    }
}

/// Everything the settlement contract touches on chain.
#[derive(Debug, Clone)]
pub struct ChainEnv {
    pub ledger: TokenLedger,
    pub pool: LendingPool,
    venues: HashMap<Address, SwapVenue>,
}

impl ChainEnv {
    pub fn new(pool: LendingPool) -> Self {
        Self {
            ledger: TokenLedger::default(),
            pool,
            venues: HashMap::new(),
        }
    }

    pub fn add_venue(&mut self, venue: SwapVenue) {
        self.venues.insert(venue.address(), venue);
    }

    pub fn venue_mut(&mut self, router: Address) -> Option<&mut SwapVenue> {
        self.venues.get_mut(&router)
    }

    /// Quote `amount_in` along `path` at the given router without moving funds.
    pub fn quote(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256, Revert> {
        let venue = self.venues.get(&router).ok_or(Revert::UnknownVenue)?;
        venue.quote(amount_in, path)
    }

    /// Execute a swap at the given router on behalf of `caller`.
    pub fn swap(
        &mut self,
        router: Address,
        caller: Address,
        amount_in: U256,
        path: &[Address],
        min_out: U256,
    ) -> Result<U256, Revert> {
        let venue = self.venues.get(&router).ok_or(Revert::UnknownVenue)?;
        venue.swap(&mut self.ledger, caller, amount_in, path, min_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn ledger_transfer_moves_exact_amounts() {
        let mut ledger = TokenLedger::default();
        let (token, a, b) = (addr(1), addr(2), addr(3));
        ledger.mint(token, a, U256::from(100u64));

        ledger
            .transfer(token, a, b, U256::from(40u64))
            .expect("funded transfer");
        assert_eq!(ledger.balance_of(token, a), U256::from(60u64));
        assert_eq!(ledger.balance_of(token, b), U256::from(40u64));
    }

    #[test]
    fn ledger_rejects_overdraft() {
        let mut ledger = TokenLedger::default();
        let (token, a, b) = (addr(1), addr(2), addr(3));
        ledger.mint(token, a, U256::from(10u64));

        let err = ledger
            .transfer(token, a, b, U256::from(11u64))
            .expect_err("overdraft");
        assert_eq!(err, Revert::InsufficientBalance);
        assert_eq!(ledger.balance_of(token, a), U256::from(10u64));
        assert_eq!(ledger.balance_of(token, b), U256::zero());
    }

    #[test]
    fn premium_is_basis_points_on_principal() {
        let pool = LendingPool::new(addr(9), 9);
        let one = U256::exp10(18);
        // 9 bps on 1e18 = 9e14
        assert_eq!(pool.premium(one), U256::exp10(14) * U256::from(9u64));
    }

    #[test]
    fn venue_swap_respects_min_out() {
        let pool = LendingPool::new(addr(9), 9);
        let mut env = ChainEnv::new(pool);
        let (token_a, token_b, trader, router) = (addr(1), addr(2), addr(3), addr(4));
        let mut venue = SwapVenue::new(router);
        venue.set_amount_out(U256::from(50u64));
        env.add_venue(venue);
        env.ledger.mint(token_a, trader, U256::from(100u64));
        env.ledger.mint(token_b, router, U256::from(100u64));

        let err = env
            .swap(
                router,
                trader,
                U256::from(100u64),
                &[token_a, token_b],
                U256::from(51u64),
            )
            .expect_err("below min out");
        assert_eq!(err, Revert::BelowMinReturn);

        let out = env
            .swap(
                router,
                trader,
                U256::from(100u64),
                &[token_a, token_b],
                U256::from(50u64),
            )
            .expect("fill");
        assert_eq!(out, U256::from(50u64));
        assert_eq!(env.ledger.balance_of(token_b, trader), U256::from(50u64));
        assert_eq!(env.ledger.balance_of(token_a, router), U256::from(100u64));
    }
}
