//! 트레이드 저널 코어 도메인.
//!
//! 브로커 체결 내역을 라운드트립 트레이드로 재구성하고,
//! 상품별 계약 단위로 손익을 정규화하며, 중복 없이 증분 동기화합니다.
//!
//! 크레이트 구성:
//! - [`domain`]: 상품 프로파일, 손익 정규화, 체결 페어링, 커넥션/동기화 타입
//! - [`sync`]: 커넥션 단위 동기화 엔진 (fetch → dedup → pair → persist)
//! - [`crypto`]: 자격증명 암호화 (AES-256-GCM)

pub mod crypto;
pub mod domain;
pub mod sync;

pub use crypto::{CredentialEncryptor, CryptoError};
pub use domain::broker::{BrokerProvider, BrokerProviderFactory, ProviderError};
pub use domain::connection::{
    BrokerConnection, BrokerCredentials, ConnectionStatus, StoredCredentials, SyncRun,
    SyncRunStatus, SyncTrigger,
};
pub use domain::execution::{ExecutionStatus, RawExecution, Side};
pub use domain::instrument::{InstrumentCategory, InstrumentProfile, InstrumentRegistry};
pub use domain::pairing::pair_executions;
pub use domain::pnl::{compute_pnl, PnlBreakdown};
pub use domain::store::{ExecutionLink, StoreError, TradeStore};
pub use domain::trade::{CanonicalTrade, TradeDirection, TradeOutcome};
pub use sync::{SyncConfig, SyncEngine, SyncError, SyncReport};
