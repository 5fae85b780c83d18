//! Tradier 브로커 커넥터.

pub mod client;

pub use client::{TradierClient, TradierConfig, TradierProvider};
