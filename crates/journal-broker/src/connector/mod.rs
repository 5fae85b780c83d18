//! 브로커별 HTTP 커넥터.

pub mod tradier;
