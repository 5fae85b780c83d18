//! 트레이드 저널 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 헬스 체크, 커넥션 관리, 동기화 트리거 엔드포인트를 제공합니다.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use journal_api::{openapi::swagger_ui_router, repository::PgTradeStore, routes::create_api_router, state::AppState};
use journal_broker::StandardBrokerFactory;
use journal_core::{CredentialEncryptor, InstrumentRegistry, SyncConfig, SyncEngine};

/// 서버 설정 구조체.
struct ServerConfig {
    /// 바인딩할 호스트 주소
    host: String,
    /// 바인딩할 포트
    port: u16,
    /// Postgres 연결 문자열
    database_url: String,
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드.
    ///
    /// # Errors
    /// `DATABASE_URL`이 설정되지 않으면 실패합니다. 이 서비스는
    /// 저장소 없이 동작할 수 없습니다.
    fn from_env() -> Result<Self, String> {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            host,
            port,
            database_url,
        })
    }

    /// 소켓 주소 반환.
    fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 암호화 관리자 초기화 (ENCRYPTION_MASTER_KEY 환경변수에서).
fn create_encryptor() -> Option<Arc<CredentialEncryptor>> {
    match std::env::var("ENCRYPTION_MASTER_KEY") {
        Ok(master_key) => match CredentialEncryptor::new(&master_key) {
            Ok(encryptor) => {
                info!("Credential encryptor initialized");
                Some(Arc::new(encryptor))
            }
            Err(e) => {
                error!("Failed to initialize credential encryptor: {}", e);
                None
            }
        },
        Err(_) => {
            warn!("ENCRYPTION_MASTER_KEY not set, credentials will be stored unencrypted");
            None
        }
    }
}

/// CORS 미들웨어 구성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .with_state(state)
        .merge(swagger_ui_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // tracing 초기화
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "journal_api=info,journal_core=info,tower_http=debug".into()),
        )
        .init();

    info!("Starting Trade Journal API server...");

    // 설정 로드
    let config = ServerConfig::from_env().map_err(|e| {
        error!("{}", e);
        e
    })?;
    let addr = config.socket_addr().map_err(|e| {
        error!(
            host = %config.host,
            port = config.port,
            error = %e,
            "Invalid socket address, check API_HOST and API_PORT"
        );
        e
    })?;

    // JWT 시크릿 로드
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set, using default (INSECURE for development only)");
        "dev-secret-key-change-in-production".to_string()
    });

    // DB 연결
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    sqlx::query("SELECT 1").fetch_one(&db_pool).await?;
    info!("Connected to PostgreSQL successfully");

    // 암호화 관리자 설정
    let encryptor = create_encryptor();

    // 동기화 엔진 조립
    let registry = Arc::new(InstrumentRegistry::builtin());
    let store = Arc::new(PgTradeStore::new(db_pool.clone()));
    let factory = Arc::new(StandardBrokerFactory::new());
    let mut engine = SyncEngine::new(store, factory, registry.clone())
        .with_config(SyncConfig::from_env());
    if let Some(encryptor) = &encryptor {
        engine = engine.with_encryptor(encryptor.clone());
    }

    // AppState 생성
    let mut state = AppState::new(db_pool, Arc::new(engine), registry, jwt_secret);
    if let Some(encryptor) = encryptor {
        state = state.with_encryptor(encryptor);
    }
    let state = Arc::new(state);

    info!(
        version = %state.version,
        has_encryptor = state.encryptor.is_some(),
        instruments = state.registry.len(),
        "Application state initialized"
    );

    // 라우터 생성 및 서버 시작
    let app = create_router(state);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/docs", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기 (Ctrl+C 또는 SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
