//! 브로커 제공자 팩토리.

pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use journal_core::{
    BrokerConnection, BrokerCredentials, BrokerProvider, BrokerProviderFactory, ProviderError,
};

use crate::connector::tradier::{TradierConfig, TradierProvider};
use crate::provider::mock::MockBrokerProvider;

/// 표준 브로커 팩토리.
///
/// `broker_id`로 커넥터를 선택합니다. 새 브로커는 여기에 분기를
/// 추가하는 것으로 등록됩니다.
#[derive(Debug, Default)]
pub struct StandardBrokerFactory;

impl StandardBrokerFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrokerProviderFactory for StandardBrokerFactory {
    async fn create(
        &self,
        connection: &BrokerConnection,
        credentials: &BrokerCredentials,
    ) -> Result<Arc<dyn BrokerProvider>, ProviderError> {
        debug!(
            broker_id = %connection.broker_id,
            is_paper = connection.is_paper,
            "Creating broker provider"
        );

        match connection.broker_id.as_str() {
            "tradier" => {
                let account_id = credentials.account_id().ok_or_else(|| {
                    ProviderError::Authentication(
                        "Tradier connection requires an account_id".to_string(),
                    )
                })?;
                let config = TradierConfig::new(
                    credentials.api_key.clone(),
                    account_id.to_string(),
                    connection.is_paper,
                );
                Ok(Arc::new(TradierProvider::new(config)))
            }
            "mock" => Ok(Arc::new(MockBrokerProvider::with_sample_history())),
            other => Err(ProviderError::Unsupported(other.to_string())),
        }
    }
}
