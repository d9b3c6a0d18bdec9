//! fundbook: fund holdings, cost basis and profit bookkeeping.
//!
//! Hexagonal architecture: the fund aggregate and its document mapping live in
//! [`domain`], storage and configuration traits in [`ports`], concrete implementations
//! in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
