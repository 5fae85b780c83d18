//! 브로커 커넥터 크레이트.
//!
//! 브로커별 HTTP/인증 세부 사항을 캡슐화하고 코어의 [`BrokerProvider`]
//! 인터페이스로 노출합니다. 새 브로커 추가는 커넥터 모듈 하나와
//! 팩토리의 `broker_id` 분기 하나로 끝납니다.
//!
//! [`BrokerProvider`]: journal_core::BrokerProvider

pub mod connector;
pub mod provider;
pub mod retry;

pub use connector::tradier::{TradierClient, TradierConfig, TradierProvider};
pub use provider::mock::MockBrokerProvider;
pub use provider::StandardBrokerFactory;
pub use retry::{with_retry, RetryConfig};
