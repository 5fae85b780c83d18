//! 트레이드 저널 REST API 크레이트.
//!
//! axum 기반 HTTP 서비스: 커넥션 등록/조회, 동기화 트리거,
//! 동기화 이력 조회를 제공합니다. 영속성은 sqlx/Postgres 저장소가
//! 담당하며 코어의 `TradeStore` trait을 구현합니다.

pub mod auth;
pub mod error;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;
