//! OpenAPI 문서화 설정.
//!
//! utoipa로 OpenAPI 3.0 스펙을 생성합니다. Swagger UI는 `/docs`
//! 경로에서 사용 가능합니다.
//!
//! 새 엔드포인트 추가 시:
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `paths(...)` / `components(schemas(...))`에 추가

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    connections::{
        ConnectionDto, ConnectionsResponse, CreateConnectionRequest, CreateConnectionResponse,
        SyncRunDto, SyncRunsResponse,
    },
    sync::SyncResponse,
    HealthResponse,
};

/// 트레이드 저널 API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trade Journal API",
        description = r#"
브로커 커넥션 관리 및 트레이드 동기화 REST API.

## 주요 기능

- **커넥션 관리**: 브로커 자격증명 등록 (저장 시 AES-256-GCM 암호화)
- **동기화**: 브로커 체결 내역을 라운드트립 트레이드로 재구성 (중복 없는 증분 동기화)
- **이력 조회**: 동기화 실행 기록

인증은 `Authorization: Bearer <JWT>` 헤더를 사용합니다.
"#
    ),
    paths(
        crate::routes::health,
        crate::routes::connections::create_connection,
        crate::routes::connections::list_connections,
        crate::routes::connections::list_sync_runs,
        crate::routes::sync::trigger_sync,
    ),
    components(schemas(
        HealthResponse,
        CreateConnectionRequest,
        CreateConnectionResponse,
        ConnectionDto,
        ConnectionsResponse,
        SyncRunDto,
        SyncRunsResponse,
        SyncResponse,
        ApiErrorResponse,
    )),
    tags(
        (name = "health", description = "서버 상태"),
        (name = "connections", description = "브로커 커넥션 관리"),
        (name = "sync", description = "트레이드 동기화")
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터.
pub fn swagger_ui_router() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
