//! 애플리케이션 공유 상태.

use std::sync::Arc;

use sqlx::PgPool;

use journal_core::{CredentialEncryptor, InstrumentRegistry, SyncEngine};

/// 핸들러 간 공유 상태.
///
/// `Arc<AppState>`로 라우터에 주입됩니다. 동기화 자체는 `engine`이
/// 수행하고, 핸들러의 직접 조회(커넥션 목록, 이력)는 `db_pool`을
/// 사용합니다.
pub struct AppState {
    /// Postgres 커넥션 풀
    pub db_pool: PgPool,
    /// 동기화 엔진
    pub engine: Arc<SyncEngine>,
    /// 자격증명 암호화 관리자 (없으면 레거시 평문 저장)
    pub encryptor: Option<Arc<CredentialEncryptor>>,
    /// 상품 프로파일 레지스트리
    pub registry: Arc<InstrumentRegistry>,
    /// JWT 서명 시크릿
    pub jwt_secret: String,
    /// 서버 버전 (health 응답용)
    pub version: String,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        engine: Arc<SyncEngine>,
        registry: Arc<InstrumentRegistry>,
        jwt_secret: String,
    ) -> Self {
        Self {
            db_pool,
            engine,
            encryptor: None,
            registry,
            jwt_secret,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 암호화 관리자 설정 (빌더 패턴).
    pub fn with_encryptor(mut self, encryptor: Arc<CredentialEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }
}
