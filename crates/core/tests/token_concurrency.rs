//! Concurrent callers share one token refresh.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;

use postagem_core::testing::MockTokenSource;
use postagem_core::{CarrierAuthenticator, CarrierError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_trigger_one_fetch() {
    let source = Arc::new(MockTokenSource::new());
    let auth = Arc::new(CarrierAuthenticator::new(source.clone()));

    let tasks = (0..32).map(|_| {
        let auth = Arc::clone(&auth);
        tokio::spawn(async move { auth.token().await })
    });
    let tokens: Vec<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().token)
        .collect();

    assert_eq!(source.fetch_count(), 1);
    assert!(tokens.iter().all(|t| t == "mock-token-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_token_inside_margin_is_refreshed_once() {
    // Four minutes is inside the five-minute refresh margin
    let source = Arc::new(MockTokenSource::with_lifetime(Duration::minutes(4)));
    let auth = Arc::new(CarrierAuthenticator::new(source.clone()));

    auth.token().await.unwrap();
    auth.token().await.unwrap();
    assert_eq!(source.fetch_count(), 2);

    let long_lived = Arc::new(MockTokenSource::new());
    let auth = Arc::new(CarrierAuthenticator::new(long_lived.clone()));
    let tasks = (0..8).map(|_| {
        let auth = Arc::clone(&auth);
        tokio::spawn(async move { auth.token().await.map(|t| t.token) })
    });
    for joined in join_all(tasks).await {
        assert_eq!(joined.unwrap().unwrap(), "mock-token-1");
    }
    assert_eq!(long_lived.fetch_count(), 1);
}

#[tokio::test]
async fn test_failed_refresh_is_retried_by_next_caller() {
    let source = Arc::new(MockTokenSource::new());
    source.fail_next(CarrierError::Authentication("HTTP 401: credenciais invalidas".to_string()));
    let auth = CarrierAuthenticator::new(source.clone());

    let err = auth.token().await.unwrap_err();
    assert!(matches!(err, CarrierError::Authentication(_)));
    assert!(auth.peek().await.is_none());

    let token = auth.token().await.unwrap();
    assert_eq!(token.token, "mock-token-2");
    assert_eq!(source.fetch_count(), 2);

    auth.invalidate().await;
    assert!(auth.peek().await.is_none());
    assert_eq!(auth.token().await.unwrap().token, "mock-token-3");
}
