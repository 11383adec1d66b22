//! Flash-loan arbitrage engine.
//!
//! Watches token pairs across DEX venues, evaluates cross-venue spreads
//! against profit and slippage floors, and settles profitable ones through
//! an atomic flash-loan round trip. The settlement contract and its chain
//! environment run in process for the `local` profile and the test suite;
//! live profiles reach real routers through the same [`chain::ChainClient`]
//! seam.

pub mod adapters;
pub mod aggregator;
pub mod arbitrage;
pub mod chain;
pub mod config;
pub mod contract;
pub mod errors;
pub mod models;
pub mod resilience;
pub mod scanner;
pub mod submitter;
pub mod tradelog;
pub mod utils;
