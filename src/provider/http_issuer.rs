use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::catalog::Credential;
use crate::config::types::IssuerConfig;
use crate::error::IssuerError;
use crate::provider::parser::parse_token;
use crate::provider::values::prepare_generic_source_value;
use crate::provider::TokenProvider;
use crate::store::Token;

/// Issues tokens through a configurable HTTP exchange.
///
/// Every request is a POST to `issuer.url` authenticated with basic auth
/// (`credential.id`, `credential.secret`) and tagged with the service app id in
/// `issuer.app_id_header`.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    client: Client,
    config: Arc<IssuerConfig>,
}

impl HttpTokenProvider {
    pub fn new(client: Client, config: IssuerConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    async fn exchange(&self, credential: &Credential) -> Result<Token, IssuerError> {
        let config = &self.config;
        let mut request = self
            .client
            .post(&config.url)
            .basic_auth(&credential.id, Some(&credential.secret))
            .header(config.app_id_header.as_str(), credential.service.app_id());

        if let Some(headers) = &config.headers {
            for (key, v) in headers {
                let value = prepare_generic_source_value(v)?;
                request = request.header(key.as_str(), value);
            }
        }
        let body = config
            .body
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        request = request.json(&body);

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(IssuerError::Status { status, body: text });
        }
        debug!("issuer answered {} for {}", status, credential);
        parse_token(&text, &config.response, credential, Utc::now())
    }
}

impl TokenProvider for HttpTokenProvider {
    async fn fetch(&self, credential: &Credential, cancel: CancellationToken) -> Result<Token, IssuerError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IssuerError::Cancelled),
            result = self.exchange(credential) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Service;
    use crate::config::types::{GenericSourceValue, ResponseConfig};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn issuer(url: String) -> IssuerConfig {
        let mut headers = HashMap::new();
        headers.insert(
            "x-locale".to_string(),
            GenericSourceValue::Literal { value: "en-US".into() },
        );
        IssuerConfig {
            url,
            app_id_header: "x-app-id".into(),
            headers: Some(headers),
            body: None,
            response: ResponseConfig::default(),
        }
    }

    fn credential() -> Credential {
        Credential::new("alice", "s3cret", Service::new("pc", "app-pc"))
    }

    #[tokio::test]
    async fn exchanges_credential_for_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/sessions")
                    // alice:s3cret
                    .header("authorization", "Basic YWxpY2U6czNjcmV0")
                    .header("x-app-id", "app-pc")
                    .header("x-locale", "en-US");
                then.status(200).json_body(json!({
                    "sessionId": "sess-1",
                    "ticket": "ticket-value",
                    "expiration": "2030-01-01T00:00:00Z"
                }));
            })
            .await;

        let provider = HttpTokenProvider::new(Client::new(), issuer(server.url("/sessions")));
        let token = provider
            .fetch(&credential(), CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token.session_id, "sess-1");
        assert_eq!(token.value, "ticket-value");
        assert_eq!(token.owner_id, "alice");
        assert_eq!(token.app_id, "app-pc");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sessions");
                then.status(429).body("slow down");
            })
            .await;

        let provider = HttpTokenProvider::new(Client::new(), issuer(server.url("/sessions")));
        let err = provider
            .fetch(&credential(), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            IssuerError::Status { status, body } => {
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn cancelled_fetch_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        // unroutable address, never reached
        let provider = HttpTokenProvider::new(Client::new(), issuer("http://10.255.255.1/sessions".into()));
        let err = provider.fetch(&credential(), cancel).await.unwrap_err();
        assert!(matches!(err, IssuerError::Cancelled));
    }
}
