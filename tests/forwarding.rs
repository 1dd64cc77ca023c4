//! End-to-end forwarding tests against mock backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use param_proxy::config::ProxyConfig;

mod common;

fn counting_backend(hits: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/{*path}",
        any(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "unexpected"
            }
        }),
    )
}

#[tokio::test]
async fn test_get_is_relayed() {
    let backend = common::start_backend(Router::new().route(
        "/path",
        get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "hello") }),
    ))
    .await;
    let proxy = common::start_proxy(ProxyConfig::default()).await;

    let target = common::encode(&format!("http://{}/path", backend));
    let res = common::client()
        .get(proxy.url(&format!("targetUrl={}", target)))
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(res.headers()[header::CONTENT_LENGTH], "5");
    assert_eq!(res.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn test_post_body_is_echoed_unchanged() {
    let backend = common::start_backend(Router::new().route(
        "/echo",
        post(|headers: HeaderMap, body: Bytes| async move {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| header::HeaderValue::from_static("none"));
            ([(header::CONTENT_TYPE, content_type)], body)
        }),
    ))
    .await;
    let proxy = common::start_proxy(ProxyConfig::default()).await;
    let url = proxy.url(&format!(
        "targetUrl={}",
        common::encode(&format!("http://{}/echo", backend))
    ));

    let res = common::client()
        .post(&url)
        .header(header::CONTENT_TYPE, "application/json")
        .body("payload-data")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(res.text().await.unwrap(), "payload-data");

    // Larger than the transfer buffer in both directions.
    let large: Vec<u8> = (0..100 * 1024).map(|i| (i % 253) as u8).collect();
    let res = common::client()
        .post(&url)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(large.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.bytes().await.unwrap().to_vec(), large);
}

#[tokio::test]
async fn test_missing_target_never_reaches_backend() {
    let hits = Arc::new(AtomicUsize::new(0));
    let _backend = common::start_backend(counting_backend(hits.clone())).await;
    let proxy = common::start_proxy(ProxyConfig::default()).await;

    let res = common::client().get(proxy.url("other=1")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST.as_u16());
    assert!(res.text().await.unwrap().contains("targetUrl"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_delete_is_rejected_without_dispatch() {
    let hits = Arc::new(AtomicUsize::new(0));
    let backend = common::start_backend(counting_backend(hits.clone())).await;
    let proxy = common::start_proxy(ProxyConfig::default()).await;

    let target = common::encode(&format!("http://{}/resource", backend));
    let res = common::client()
        .delete(proxy.url(&format!("targetUrl={}", target)))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED.as_u16());
    assert_eq!(res.headers()[header::ALLOW], "GET, POST");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_target_is_bad_request() {
    let proxy = common::start_proxy(ProxyConfig::default()).await;

    let res = common::client()
        .get(proxy.url("targetUrl=http%3A%2F%2Fexample.test%zz"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST.as_u16());
}

#[tokio::test]
async fn test_unreachable_target_is_bad_gateway() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let proxy = common::start_proxy(ProxyConfig::default()).await;

    let target = common::encode(&format!("http://127.0.0.1:{}/", port));
    let res = common::client()
        .get(proxy.url(&format!("targetUrl={}", target)))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY.as_u16());
}

#[tokio::test]
async fn test_upstream_dying_mid_body_truncates_response() {
    let backend = common::start_truncating_backend(100_000, 4 * 1024).await;
    let proxy = common::start_proxy(ProxyConfig::default()).await;
    let target = format!("http://{}/big", backend);

    let res = common::client()
        .get(proxy.url(&format!("targetUrl={}", common::encode(&target))))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.content_length(), Some(100_000));
    assert!(res.bytes().await.is_err());
}

#[tokio::test]
async fn test_upstream_status_and_custom_parameter_key() {
    let backend = common::start_backend(Router::new().route(
        "/missing",
        get(|| async { (StatusCode::NOT_FOUND, "nothing here").into_response() }),
    ))
    .await;
    let mut config = ProxyConfig::default();
    config.forwarder.parameter_key = "dest".into();
    config.forwarder.buffer_size = 3;
    let proxy = common::start_proxy(config).await;

    let target = common::encode(&format!("http://{}/missing", backend));
    let res = common::client()
        .get(proxy.url(&format!("dest={}", target)))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND.as_u16());
    assert_eq!(res.text().await.unwrap(), "nothing here");
}
