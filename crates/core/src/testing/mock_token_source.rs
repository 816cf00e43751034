//! Mock token source for testing.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::carrier::{CarrierError, ShippingToken, TokenSource};

/// Hands out a new token on every fetch and counts the fetches.
///
/// ```rust,ignore
/// let source = Arc::new(MockTokenSource::with_lifetime(Duration::minutes(4)));
/// let auth = CarrierAuthenticator::new(source.clone());
/// auth.token().await?;
/// assert_eq!(source.fetch_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockTokenSource {
    lifetime: Duration,
    fetches: AtomicUsize,
    next_error: Mutex<Option<CarrierError>>,
}

impl Default for MockTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenSource {
    /// Tokens valid for one hour.
    pub fn new() -> Self {
        Self::with_lifetime(Duration::hours(1))
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            lifetime,
            fetches: AtomicUsize::new(0),
            next_error: Mutex::new(None),
        }
    }

    /// Make the next fetch fail with `error`.
    pub fn fail_next(&self, error: CarrierError) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = Some(error);
        }
    }

    /// Number of fetch attempts so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn fetch_token(&self) -> Result<ShippingToken, CarrierError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = self.next_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(error);
        }
        Ok(ShippingToken {
            token: format!("mock-token-{}", n),
            expires_at: Utc::now() + self.lifetime,
            postage_card: "0076543210".to_string(),
            contract: Some("9912345678".to_string()),
        })
    }
}
