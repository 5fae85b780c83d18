//! 도메인 타입 및 순수 로직.

pub mod broker;
pub mod connection;
pub mod execution;
pub mod instrument;
pub mod pairing;
pub mod pnl;
pub mod store;
pub mod trade;

pub use broker::{BrokerProvider, BrokerProviderFactory, ProviderError};
pub use connection::{
    BrokerConnection, BrokerCredentials, ConnectionStatus, StoredCredentials, SyncRun,
    SyncRunStatus, SyncTrigger,
};
pub use execution::{ExecutionStatus, RawExecution, Side};
pub use instrument::{InstrumentCategory, InstrumentProfile, InstrumentRegistry};
pub use pairing::pair_executions;
pub use pnl::{compute_pnl, PnlBreakdown};
pub use store::{ExecutionLink, StoreError, TradeStore};
pub use trade::{CanonicalTrade, TradeDirection, TradeOutcome};
