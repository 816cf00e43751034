//! Carrier bearer-token acquisition and caching.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::CarrierConfig;
use crate::metrics::TOKEN_REFRESHES;

use super::format::parse_carrier_datetime;
use super::wire::de_opt_string;
use super::{CarrierError, TokenStatus};

/// Tokens are refreshed this long before the carrier expires them.
pub const REFRESH_MARGIN_MINUTES: i64 = 5;

const TOKEN_ENDPOINT: &str = "/token/v1/autentica/cartaopostagem";

/// A bearer token bound to a postage card.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub postage_card: String,
    pub contract: Option<String>,
}

impl ShippingToken {
    /// Usable without refreshing at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::minutes(REFRESH_MARGIN_MINUTES)
    }

    pub fn status(&self) -> TokenStatus {
        TokenStatus {
            expires_at: self.expires_at,
            postage_card: self.postage_card.clone(),
            contract: self.contract.clone(),
        }
    }
}

/// Something that can mint a new token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<ShippingToken, CarrierError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    expira_em: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    contrato: Option<String>,
}

/// Postage-card token endpoint with HTTP Basic credentials.
pub struct CorreiosTokenSource {
    client: Client,
    base_url: String,
    user: String,
    access_code: String,
    postage_card: String,
}

impl CorreiosTokenSource {
    pub fn new(config: &CarrierConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            access_code: config.access_code.clone(),
            postage_card: config.postage_card.clone(),
        }
    }
}

#[async_trait]
impl TokenSource for CorreiosTokenSource {
    async fn fetch_token(&self) -> Result<ShippingToken, CarrierError> {
        let url = format!("{}{}", self.base_url, TOKEN_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.access_code))
            .json(&json!({ "numero": self.postage_card }))
            .send()
            .await
            .map_err(|e| CarrierError::Authentication(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(CarrierError::Authentication(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CarrierError::Authentication(format!("invalid token response: {}", e)))?;

        let expires_at = parsed
            .expira_em
            .as_deref()
            .and_then(parse_carrier_datetime)
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(ShippingToken {
            token: parsed.token,
            expires_at,
            postage_card: self.postage_card.clone(),
            contract: parsed.contrato,
        })
    }
}

/// Holds the current token. Only [`CarrierAuthenticator`] writes to it.
#[derive(Default)]
pub struct TokenCache {
    current: RwLock<Option<ShippingToken>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    async fn fresh(&self) -> Option<ShippingToken> {
        let now = Utc::now();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_fresh(now))
            .cloned()
    }
}

/// Hands out bearer tokens, refreshing at most once at a time.
pub struct CarrierAuthenticator {
    source: Arc<dyn TokenSource>,
    cache: TokenCache,
}

impl CarrierAuthenticator {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cache: TokenCache::default(),
        }
    }

    /// A token valid for at least the refresh margin.
    pub async fn token(&self) -> Result<ShippingToken, CarrierError> {
        if let Some(token) = self.cache.fresh().await {
            return Ok(token);
        }

        let _guard = self.cache.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cache.fresh().await {
            debug!("Token refreshed by a concurrent caller");
            return Ok(token);
        }

        match self.source.fetch_token().await {
            Ok(token) => {
                info!(expires_at = %token.expires_at, "Carrier token refreshed");
                TOKEN_REFRESHES.with_label_values(&["success"]).inc();
                *self.cache.current.write().await = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "Carrier token refresh failed");
                TOKEN_REFRESHES.with_label_values(&["failure"]).inc();
                Err(e)
            }
        }
    }

    /// Drop the cached token so the next call refreshes it.
    pub async fn invalidate(&self) {
        let _guard = self.cache.refresh.lock().await;
        *self.cache.current.write().await = None;
    }

    /// Cached token, if any, without refreshing.
    pub async fn peek(&self) -> Option<ShippingToken> {
        self.cache.current.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTokenSource;

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc::now();
        let token = ShippingToken {
            token: "t".to_string(),
            expires_at: now + Duration::minutes(6),
            postage_card: "card".to_string(),
            contract: None,
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::minutes(1) + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let source = Arc::new(MockTokenSource::new());
        let auth = CarrierAuthenticator::new(source.clone());

        let first = auth.token().await.unwrap();
        let second = auth.token().await.unwrap();

        assert_eq!(first.token, second.token);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_token_is_refreshed() {
        let source = Arc::new(MockTokenSource::with_lifetime(Duration::minutes(4)));
        let auth = CarrierAuthenticator::new(source.clone());

        let first = auth.token().await.unwrap();
        let second = auth.token().await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_caches_nothing() {
        let source = Arc::new(MockTokenSource::new());
        source.fail_next(CarrierError::Authentication("bad credentials".to_string()));
        let auth = CarrierAuthenticator::new(source.clone());

        let result = auth.token().await;
        assert!(matches!(result, Err(CarrierError::Authentication(_))));
        assert!(auth.peek().await.is_none());

        assert!(auth.token().await.is_ok());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let source = Arc::new(MockTokenSource::new());
        let auth = CarrierAuthenticator::new(source.clone());

        auth.token().await.unwrap();
        auth.invalidate().await;
        auth.token().await.unwrap();

        assert_eq!(source.fetch_count(), 2);
    }
}
