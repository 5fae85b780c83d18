//! sqlx/Postgres 저장소.
//!
//! 정적 async 메서드를 가진 Repository 구조체로 구성되며,
//! [`PgTradeStore`]가 이를 묶어 코어의 `TradeStore` trait을 구현합니다.

pub mod connections;
pub mod execution_links;
pub mod store;
pub mod sync_runs;
pub mod trades;

pub use connections::ConnectionRepository;
pub use execution_links::ExecutionLinkRepository;
pub use store::PgTradeStore;
pub use sync_runs::SyncRunRepository;
pub use trades::TradeRepository;
