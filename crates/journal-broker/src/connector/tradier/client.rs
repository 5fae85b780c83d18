//! Tradier REST API 클라이언트.
//!
//! 계좌 주문 이력 조회만 사용합니다. Tradier는 주문 단위로 체결을
//! 보고하며(부분 체결은 평균가로 집계), 단건/다건 응답 형태가 다른
//! XML 유래 JSON을 반환하므로 파싱 시 양쪽을 모두 처리합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use journal_core::{BrokerProvider, ExecutionStatus, ProviderError, RawExecution, Side};

use crate::retry::{with_retry, RetryConfig};

// ============================================================================
// 설정
// ============================================================================

#[derive(Clone)]
pub struct TradierConfig {
    pub access_token: String,
    pub account_id: String,
    /// 모의투자 계좌 여부 (sandbox 엔드포인트 사용)
    pub sandbox: bool,
}

impl std::fmt::Debug for TradierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradierConfig")
            .field("access_token", &"***")
            .field("account_id", &self.account_id)
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

impl TradierConfig {
    pub fn new(access_token: String, account_id: String, sandbox: bool) -> Self {
        Self {
            access_token,
            account_id,
            sandbox,
        }
    }

    fn base_url(&self) -> &'static str {
        if self.sandbox {
            "https://sandbox.tradier.com"
        } else {
            "https://api.tradier.com"
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

/// Tradier 주문 한 건.
///
/// 옵션 주문은 `option_symbol`에 OCC 심볼을 담습니다.
#[derive(Debug, Deserialize)]
struct TradierOrder {
    pub id: u64,
    pub symbol: String,
    pub side: String,
    pub status: String,
    pub quantity: Decimal,
    pub exec_quantity: Option<Decimal>,
    pub avg_fill_price: Option<Decimal>,
    pub transaction_date: DateTime<Utc>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub option_symbol: Option<String>,
}

impl TradierOrder {
    /// 트레이드에 기록할 심볼 (옵션 주문은 OCC 심볼 우선).
    fn effective_symbol(&self) -> &str {
        if self.class.as_deref() == Some("option") {
            self.option_symbol.as_deref().unwrap_or(&self.symbol)
        } else {
            &self.symbol
        }
    }
}

/// Tradier 상태 문자열 매핑.
fn parse_status(status: &str) -> Option<ExecutionStatus> {
    match status.to_lowercase().as_str() {
        "filled" => Some(ExecutionStatus::Filled),
        "partially_filled" => Some(ExecutionStatus::PartiallyFilled),
        "open" | "pending" | "submitted" => Some(ExecutionStatus::Open),
        "canceled" | "cancelled" => Some(ExecutionStatus::Canceled),
        "rejected" | "error" => Some(ExecutionStatus::Rejected),
        "expired" => Some(ExecutionStatus::Expired),
        _ => None,
    }
}

// ============================================================================
// Tradier 클라이언트
// ============================================================================

pub struct TradierClient {
    client: Client,
    config: TradierConfig,
    base_url: String,
    timeout_secs: u64,
}

impl TradierClient {
    pub fn new(config: TradierConfig) -> Self {
        let base_url = config.base_url().to_string();
        Self::with_base_url(config, base_url)
    }

    /// base URL 교체 (테스트용 mock 서버 주입).
    pub fn with_base_url(config: TradierConfig, base_url: String) -> Self {
        let timeout_secs = 30;
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            config,
            base_url,
            timeout_secs,
        }
    }

    /// 계좌 주문 이력 조회.
    ///
    /// 상태 필터링 없이 브로커가 보고하는 모든 주문을 반환합니다.
    /// 원본 페이로드는 감사용으로 각 체결에 보존됩니다.
    pub async fn fetch_orders(&self) -> Result<Vec<RawExecution>, ProviderError> {
        let url = format!(
            "{}/v1/accounts/{}/orders",
            self.base_url, self.config.account_id
        );

        let response = self
            .client
            .get(&url)
            .query(&[("includeTags", "true")])
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Authentication(
                "Tradier rejected the access token".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        self.parse_orders(&body)
    }

    /// 주문 envelope 파싱.
    ///
    /// - `{"orders": "null"}` 또는 `{"orders": null}`: 주문 없음
    /// - `{"orders": {"order": {...}}}`: 단건
    /// - `{"orders": {"order": [...]}}`: 다건
    fn parse_orders(&self, body: &JsonValue) -> Result<Vec<RawExecution>, ProviderError> {
        let orders_field = body
            .get("orders")
            .ok_or_else(|| ProviderError::Parse("missing 'orders' field".to_string()))?;

        let raw_orders: Vec<JsonValue> = match orders_field.get("order") {
            None => Vec::new(),
            Some(JsonValue::Array(items)) => items.clone(),
            Some(single @ JsonValue::Object(_)) => vec![single.clone()],
            Some(other) => {
                return Err(ProviderError::Parse(format!(
                    "unexpected 'order' shape: {}",
                    other
                )))
            }
        };

        let mut executions = Vec::with_capacity(raw_orders.len());
        for raw in raw_orders {
            let order: TradierOrder = serde_json::from_value(raw.clone())
                .map_err(|e| ProviderError::Parse(format!("invalid order payload: {}", e)))?;

            let Some(status) = parse_status(&order.status) else {
                debug!(order_id = order.id, status = %order.status, "Skipping order with unknown status");
                continue;
            };
            let side = match Side::from_str(&order.side) {
                Ok(side) => side,
                Err(_) => {
                    warn!(order_id = order.id, side = %order.side, "Skipping order with unknown side");
                    continue;
                }
            };

            let mut execution = RawExecution::new(
                order.id.to_string(),
                order.id.to_string(),
                order.effective_symbol(),
                side,
                order.exec_quantity.unwrap_or(order.quantity),
                order.avg_fill_price.unwrap_or(Decimal::ZERO),
                order.transaction_date,
            )
            .with_raw_data(raw);
            execution.status = status;
            executions.push(execution);
        }

        Ok(executions)
    }
}

// ============================================================================
// BrokerProvider 구현
// ============================================================================

/// Tradier [`BrokerProvider`] 구현.
///
/// Tradier 주문 API는 커서 파라미터가 없으므로 `since` 필터는 클라이언트
/// 측에서 적용합니다. 경계 타임스탬프는 포함하며(재조회 허용), 중복
/// 가져오기는 엔진의 dedup 패스가 막습니다.
pub struct TradierProvider {
    client: TradierClient,
    retry: RetryConfig,
}

impl TradierProvider {
    pub fn new(config: TradierConfig) -> Self {
        Self {
            client: TradierClient::new(config),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_client(client: TradierClient) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl BrokerProvider for TradierProvider {
    async fn fetch_executions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawExecution>, ProviderError> {
        let orders = with_retry(&self.retry, || self.client.fetch_orders()).await?;

        let executions: Vec<RawExecution> = match since {
            Some(cursor) => orders
                .into_iter()
                .filter(|e| e.executed_at >= cursor)
                .collect(),
            None => orders,
        };

        debug!(count = executions.len(), "Fetched Tradier executions");
        Ok(executions)
    }

    fn broker_name(&self) -> &str {
        "tradier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_client(base_url: String) -> TradierClient {
        TradierClient::with_base_url(
            TradierConfig::new("test-token".to_string(), "ACC-1".to_string(), true),
            base_url,
        )
    }

    const ORDER_LIST_BODY: &str = r#"{
        "orders": {
            "order": [
                {
                    "id": 228175,
                    "symbol": "AAPL",
                    "side": "buy",
                    "status": "filled",
                    "quantity": 10.0,
                    "exec_quantity": 10.0,
                    "avg_fill_price": 150.25,
                    "transaction_date": "2026-03-10T14:05:00.000Z",
                    "class": "equity"
                },
                {
                    "id": 228176,
                    "symbol": "AAPL",
                    "side": "sell",
                    "status": "canceled",
                    "quantity": 10.0,
                    "exec_quantity": 0.0,
                    "avg_fill_price": 0.0,
                    "transaction_date": "2026-03-10T14:10:00.000Z",
                    "class": "equity"
                }
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_fetch_orders_parses_list_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/accounts/ACC-1/orders?includeTags=true")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ORDER_LIST_BODY)
            .create_async()
            .await;

        let client = test_client(server.url());
        let executions = client.fetch_orders().await.unwrap();
        mock.assert_async().await;

        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].execution_id, "228175");
        assert_eq!(executions[0].symbol, "AAPL");
        assert_eq!(executions[0].side, Side::Buy);
        assert_eq!(executions[0].status, ExecutionStatus::Filled);
        assert_eq!(executions[0].filled_qty, dec!(10));
        assert_eq!(executions[0].avg_price, dec!(150.25));
        assert!(executions[0].raw_data.is_some());

        assert_eq!(executions[1].status, ExecutionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_fetch_orders_parses_single_object_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts/ACC-1/orders?includeTags=true")
            .with_status(200)
            .with_body(
                r#"{
                    "orders": {
                        "order": {
                            "id": 1,
                            "symbol": "SPY",
                            "side": "sell_short",
                            "status": "filled",
                            "quantity": 5.0,
                            "exec_quantity": 5.0,
                            "avg_fill_price": 500.10,
                            "transaction_date": "2026-03-10T15:00:00.000Z"
                        }
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = test_client(server.url());
        let executions = client.fetch_orders().await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].side, Side::Sell);
    }

    #[tokio::test]
    async fn test_fetch_orders_handles_empty_account() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts/ACC-1/orders?includeTags=true")
            .with_status(200)
            .with_body(r#"{"orders": "null"}"#)
            .create_async()
            .await;

        let client = test_client(server.url());
        let executions = client.fetch_orders().await.unwrap();
        assert!(executions.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts/ACC-1/orders?includeTags=true")
            .with_status(401)
            .with_body("Invalid Access Token")
            .create_async()
            .await;

        let client = test_client(server.url());
        let result = client.fetch_orders().await;
        assert!(matches!(result, Err(ProviderError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_broker_4xx_status_is_preserved() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts/ACC-1/orders?includeTags=true")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = test_client(server.url());
        let result = client.fetch_orders().await;
        match result {
            Err(e) => assert_eq!(e.client_status(), Some(429)),
            Ok(_) => panic!("expected rate limit error"),
        }
    }

    #[tokio::test]
    async fn test_provider_filters_by_cursor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts/ACC-1/orders?includeTags=true")
            .with_status(200)
            .with_body(ORDER_LIST_BODY)
            .expect_at_least(1)
            .create_async()
            .await;

        let provider = TradierProvider::with_client(test_client(server.url()))
            .with_retry_config(RetryConfig::no_retry());

        // 커서를 두 주문 사이에 두면 경계 이후 건만 남습니다
        let cursor = "2026-03-10T14:08:00Z".parse().unwrap();
        let executions = provider.fetch_executions(Some(cursor)).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].execution_id, "228176");

        let all = provider.fetch_executions(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_option_orders_use_occ_symbol() {
        let order = TradierOrder {
            id: 7,
            symbol: "SPXW".to_string(),
            side: "buy_to_open".to_string(),
            status: "filled".to_string(),
            quantity: dec!(1),
            exec_quantity: Some(dec!(1)),
            avg_fill_price: Some(dec!(2.35)),
            transaction_date: Utc::now(),
            class: Some("option".to_string()),
            option_symbol: Some("SPXW260320C05100000".to_string()),
        };
        assert_eq!(order.effective_symbol(), "SPXW260320C05100000");
    }
}
