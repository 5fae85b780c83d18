//! JWT 호출자 인증.
//!
//! `Authorization: Bearer <token>` 헤더의 HS256 JWT에서 호출자 ID를
//! 추출하는 extractor입니다. 토큰 발급(로그인)은 이 서비스의 범위
//! 밖이며, `sub` 클레임의 UUID만 소비합니다.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// JWT 클레임.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 ID (UUID 문자열)
    pub sub: String,
    /// 만료 시각 (unix epoch)
    pub exp: usize,
}

/// 인증된 호출자.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

fn unauthorized(message: &str) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorResponse::with_code(message, "UNAUTHORIZED")),
    )
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = (StatusCode, Json<ApiErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Authorization header must be a Bearer token"))?;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| unauthorized("Invalid or expired token"))?;

        let user_id = Uuid::parse_str(&token_data.claims.sub)
            .map_err(|_| unauthorized("Token subject is not a valid user id"))?;

        Ok(AuthUser { user_id })
    }
}
