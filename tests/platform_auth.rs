mod support;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Extension, Router};
use kpay_orchestrator::domain::platform::Platform;
use kpay_orchestrator::error::PaymentError;
use kpay_orchestrator::http::middleware::platform_auth::require_platform;
use kpay_orchestrator::service::memory_store::MemoryStore;
use kpay_orchestrator::service::platform_cache::PlatformCache;
use std::sync::Arc;
use std::time::Duration;
use support::platform;

async fn cache() -> (Arc<MemoryStore>, PlatformCache) {
    let store = Arc::new(MemoryStore::new());
    store.add_platform(platform()).await;
    let mut inactive = platform();
    inactive.id = 2;
    inactive.api_key = "pk_off".to_string();
    inactive.is_active = false;
    store.add_platform(inactive).await;
    let cache = PlatformCache::new(store.clone(), Duration::from_secs(60));
    (store, cache)
}

#[tokio::test]
async fn valid_keys_resolve_the_platform() {
    let (_, cache) = cache().await;
    let p = cache.authenticate("pk_test", "sk_test").await.unwrap();
    assert_eq!(p.id, 1);
}

#[tokio::test]
async fn missing_keys_are_unauthorized() {
    let (_, cache) = cache().await;
    let err = cache.authenticate("", "sk_test").await.unwrap_err();
    assert!(matches!(err, PaymentError::Auth(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_secret_unknown_key_and_inactive_platform_are_forbidden() {
    let (_, cache) = cache().await;
    for (key, secret) in [("pk_test", "nope"), ("pk_missing", "sk_test"), ("pk_off", "sk_test")] {
        let err = cache.authenticate(key, secret).await.unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden(_)), "{key}");
    }
}

async fn serve(cache: PlatformCache) -> String {
    let app = Router::new()
        .route("/whoami", get(|Extension(p): Extension<Platform>| async move { p.code }))
        .layer(from_fn_with_state(cache, require_platform));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{addr}/whoami")
}

#[tokio::test]
async fn middleware_attaches_platform_to_routed_requests() {
    let (_, cache) = cache().await;
    let url = serve(cache).await;
    let client = reqwest::Client::new();

    let ok = client
        .get(&url)
        .header("X-API-KEY", "pk_test")
        .header("X-SECRET-KEY", "sk_test")
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert_eq!(ok.text().await.unwrap(), "KLIK");

    let missing = client.get(&url).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 401);

    let inactive = client
        .get(&url)
        .header("X-API-KEY", "pk_off")
        .header("X-SECRET-KEY", "sk_test")
        .send()
        .await
        .unwrap();
    assert_eq!(inactive.status().as_u16(), 403);
}
