mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BrokenStorage, MockFetcher, init_tracing, url};
use offline_cache::{
    CacheError, CacheKey, CacheStorage, FetchError, ManualClock, MemoryStorage, Request,
    Response, ResponseSource, ServiceWorker, WorkerConfig,
};
use reqwest::Method;

const API: &str = "https://api.example.com/bookings?day=2024-06-01";
const IMAGE: &str = "http://localhost:5173/img/barber-chair.png";
const PAGE: &str = "http://localhost:5173/services";

struct Harness {
    worker: ServiceWorker,
    storage: MemoryStorage,
    fetcher: Arc<MockFetcher>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    init_tracing();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let storage = MemoryStorage::with_clock(clock.clone());
    let fetcher = Arc::new(MockFetcher::new());
    let worker = ServiceWorker::new(
        WorkerConfig::default(),
        Arc::new(storage.clone()),
        fetcher.clone(),
    )
    .unwrap();

    Harness {
        worker,
        storage,
        fetcher,
        clock,
    }
}

fn png() -> Response {
    Response::new(200, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
        .with_header("content-type", "image/png")
}

#[tokio::test]
async fn test_cache_first_serves_cached_image_offline() {
    let h = harness();
    h.fetcher.serve(IMAGE, png());

    let first = h.worker.handle_fetch(&Request::get(url(IMAGE))).await.unwrap();
    assert_eq!(first.source, ResponseSource::Network);

    h.fetcher.set_offline(true);
    let second = h.worker.handle_fetch(&Request::get(url(IMAGE))).await.unwrap();
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.response, png());
    assert_eq!(h.fetcher.calls().len(), 1);
}

#[tokio::test]
async fn test_cache_first_does_not_touch_network_on_hit() {
    let h = harness();
    h.storage
        .put(
            "image-cache-v1",
            CacheKey::get(url(IMAGE)),
            png(),
        )
        .await
        .unwrap();

    let outcome = h.worker.handle_fetch(&Request::get(url(IMAGE))).await.unwrap();
    assert_eq!(outcome.source, ResponseSource::Cache);
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_cache_first_miss_offline_fails() {
    let h = harness();
    h.fetcher.set_offline(true);

    let err = h
        .worker
        .handle_fetch(&Request::get(url(IMAGE)))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Fetch(FetchError::Offline)));
}

#[tokio::test]
async fn test_network_first_refreshes_stale_entry() {
    let h = harness();
    let key = CacheKey::get(url(API));
    h.storage
        .put("api-cache-v1", key.clone(), Response::new(200, r#"{"slots": []}"#))
        .await
        .unwrap();
    h.fetcher.serve(API, Response::new(200, r#"{"slots": ["10:00"]}"#));

    let outcome = h.worker.handle_fetch(&Request::get(url(API))).await.unwrap();
    assert_eq!(outcome.source, ResponseSource::Network);
    assert_eq!(outcome.response.body, r#"{"slots": ["10:00"]}"#);

    let cached = h.storage.lookup("api-cache-v1", &key).await.unwrap().unwrap();
    assert_eq!(cached.response, outcome.response);
}

#[tokio::test]
async fn test_network_first_falls_back_to_stale_entry_offline() {
    let h = harness();
    h.fetcher.serve(API, Response::new(200, r#"{"slots": ["09:30"]}"#));
    h.worker.handle_fetch(&Request::get(url(API))).await.unwrap();

    h.fetcher.set_offline(true);
    let outcome = h.worker.handle_fetch(&Request::get(url(API))).await.unwrap();
    assert_eq!(outcome.source, ResponseSource::Cache);
    assert_eq!(outcome.response.body, r#"{"slots": ["09:30"]}"#);
}

#[tokio::test]
async fn test_network_first_offline_without_cache_propagates() {
    let h = harness();
    h.fetcher.set_offline(true);

    let err = h
        .worker
        .handle_fetch(&Request::get(url(API)))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Fetch(FetchError::Offline)));
}

#[tokio::test]
async fn test_network_first_ignores_expired_entry() {
    let h = harness();
    h.fetcher.serve(API, Response::new(200, "fresh"));
    h.worker.handle_fetch(&Request::get(url(API))).await.unwrap();

    h.clock.advance(Duration::from_secs(5 * 60));
    h.fetcher.set_offline(true);
    assert!(h.worker.handle_fetch(&Request::get(url(API))).await.is_err());
}

#[tokio::test]
async fn test_api_cache_is_bounded() {
    let h = harness();
    for page in 0..60 {
        let api = format!("https://api.example.com/barbers?page={page}");
        h.fetcher.serve(&api, Response::new(200, page.to_string()));
        h.worker.handle_fetch(&Request::get(url(&api))).await.unwrap();
    }

    let keys = h.storage.keys("api-cache-v1").await.unwrap();
    assert_eq!(keys.len(), 50);
    assert_eq!(
        keys[0],
        CacheKey::get(url("https://api.example.com/barbers?page=10"))
    );
}

#[tokio::test]
async fn test_error_responses_are_returned_but_not_cached() {
    let h = harness();
    h.fetcher.serve(API, Response::new(500, "boom"));

    let outcome = h.worker.handle_fetch(&Request::get(url(API))).await.unwrap();
    assert_eq!(outcome.response.status, 500);
    assert!(h.storage.keys("api-cache-v1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_default_route_uses_any_cache_then_network_without_storing() {
    let h = harness();
    h.fetcher.serve(PAGE, Response::new(200, "<main>services</main>"));

    let outcome = h.worker.handle_fetch(&Request::get(url(PAGE))).await.unwrap();
    assert_eq!(outcome.source, ResponseSource::Network);
    assert!(h.storage.names().await.unwrap().is_empty());

    h.storage
        .put("anything", CacheKey::get(url(PAGE)), Response::new(200, "cached"))
        .await
        .unwrap();
    h.fetcher.set_offline(true);
    let outcome = h.worker.handle_fetch(&Request::get(url(PAGE))).await.unwrap();
    assert_eq!(outcome.source, ResponseSource::Cache);
    assert_eq!(outcome.response.body, "cached");
}

#[tokio::test]
async fn test_non_get_requests_bypass_cache() {
    let h = harness();
    let booking = "https://api.example.com/bookings";
    h.fetcher.serve(booking, Response::new(200, r#"{"id": 1}"#));

    let request = Request::new(Method::POST, url(booking))
        .with_header("content-type", "application/json");
    let outcome = h.worker.handle_fetch(&request).await.unwrap();
    assert_eq!(outcome.source, ResponseSource::Network);
    assert!(h.storage.names().await.unwrap().is_empty());

    h.fetcher.set_offline(true);
    assert!(h.worker.handle_fetch(&request).await.is_err());
}

#[tokio::test]
async fn test_broken_storage_degrades_to_network() {
    init_tracing();
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve(IMAGE, png());
    fetcher.serve(API, Response::new(200, "[]"));
    fetcher.serve(PAGE, Response::new(200, "page"));
    let worker =
        ServiceWorker::new(WorkerConfig::default(), Arc::new(BrokenStorage), fetcher.clone())
            .unwrap();

    for target in [IMAGE, API, PAGE] {
        let outcome = worker.handle_fetch(&Request::get(url(target))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network, "{target}");
    }

    fetcher.set_offline(true);
    let err = worker.handle_fetch(&Request::get(url(API))).await.unwrap_err();
    assert!(matches!(err, CacheError::Fetch(FetchError::Offline)));
}
