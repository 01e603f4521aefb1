//! End-to-end exchanges through a running proxy.

use std::time::Duration;

use rewrite_proxy::config::{ProxyConfig, RewriteRuleConfig};

mod common;

const PAGE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nLast-Modified: Fri, 15 Jan 2021 11:35:43 GMT\r\n\r\nSay Smiley";

fn rule(pattern: &str, replacement: &str) -> RewriteRuleConfig {
    RewriteRuleConfig {
        pattern: pattern.into(),
        replacement: replacement.into(),
    }
}

fn get(path: &str, extra: &str) -> Vec<u8> {
    format!("GET http://127.0.0.1{path} HTTP/1.1\r\nHost: 127.0.0.1\r\n{extra}\r\n").into_bytes()
}

#[tokio::test]
async fn test_rewrites_request_and_response() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;

    let mut config = ProxyConfig::default();
    config.rewrite.request.push(rule("cat", "dog"));
    config.rewrite.response.push(rule("Smiley", "Trolly"));
    let proxy = common::start_proxy(config, origin.port()).await;

    let reply = common::send(proxy.addr, &get("/cat.html", "")).await;

    assert_eq!(
        reply,
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nLast-Modified: Fri, 15 Jan 2021 11:35:43 GMT\r\n\r\nSay Trolly"
    );
    let requests = seen.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET http://127.0.0.1/dog.html HTTP/1.1\r\n"));
    assert!(requests[0].contains("\r\nConnection: keep-alive\r\n"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_connection_header_follows_toggle() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;

    let mut config = ProxyConfig::default();
    config.proxy.keep_alive = false;
    let proxy = common::start_proxy(config, origin.port()).await;

    common::send(proxy.addr, &get("/", "Connection: keep-alive\r\n")).await;

    let requests = seen.requests();
    assert!(requests[0].contains("\r\nConnection: close\r\n"));
    assert!(!requests[0].contains("keep-alive"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_request_gets_400() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;
    let proxy = common::start_proxy(ProxyConfig::default(), origin.port()).await;

    let reply = common::send(proxy.addr, b"incorrectdata").await;

    assert_eq!(reply, b"HTTP/1.1 400 Bad Request\r\n\r\n");
    assert_eq!(seen.count(), 0);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_request_without_head_terminator_is_forwarded() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;
    let proxy = common::start_proxy(ProxyConfig::default(), origin.port()).await;

    let reply = common::send(proxy.addr, b"GET http://127.0.0.1/bare HTTP/1.0").await;

    assert!(reply.starts_with(b"HTTP/1.1 200 OK"));
    assert!(seen.requests()[0].starts_with("GET http://127.0.0.1/bare HTTP/1.0\r\n"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_conditional_get_served_from_cache() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;

    let mut config = ProxyConfig::default();
    config.proxy.use_cache = true;
    config.rewrite.response.push(rule("Smiley", "Trolly"));
    let proxy = common::start_proxy(config, origin.port()).await;

    // First fetch populates the cache.
    let first = common::send(proxy.addr, &get("/page", "")).await;
    assert!(first.ends_with(b"Say Trolly"));
    assert_eq!(seen.count(), 1);

    // Client copy older than the cached page: hit.
    let hit = common::send(
        proxy.addr,
        &get("/page", "If-Modified-Since: Thu, 14 Jan 2021 11:35:43 GMT\r\n"),
    )
    .await;
    assert_eq!(hit, first);
    assert_eq!(seen.count(), 1);

    // Client copy newer than the cached page: miss.
    common::send(
        proxy.addr,
        &get("/page", "If-Modified-Since: Sat, 16 Jan 2021 11:35:43 GMT\r\n"),
    )
    .await;
    assert_eq!(seen.count(), 2);

    // No conditional header: always forwarded.
    common::send(proxy.addr, &get("/page", "")).await;
    assert_eq!(seen.count(), 3);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_cache_disabled_always_forwards() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;
    let proxy = common::start_proxy(ProxyConfig::default(), origin.port()).await;

    for _ in 0..2 {
        common::send(
            proxy.addr,
            &get("/page", "If-Modified-Since: Thu, 14 Jan 2021 11:35:43 GMT\r\n"),
        )
        .await;
    }

    assert_eq!(seen.count(), 2);
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_post_is_not_rewritten() {
    let (origin, seen) = common::start_mock_origin(PAGE).await;

    let mut config = ProxyConfig::default();
    config.rewrite.request.push(rule("form", "other"));
    let proxy = common::start_proxy(config, origin.port()).await;

    common::send(
        proxy.addr,
        b"POST http://127.0.0.1/form HTTP/1.1\r\nContent-Length: 3\r\n\r\na=1",
    )
    .await;

    let requests = seen.requests();
    assert!(requests[0].starts_with("POST http://127.0.0.1/form HTTP/1.1\r\n"));
    assert!(!requests[0].contains("Connection:"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_reloaded_rules_take_effect() {
    let (origin, _seen) = common::start_mock_origin(PAGE).await;
    let proxy = common::start_proxy(ProxyConfig::default(), origin.port()).await;

    let before = common::send(proxy.addr, &get("/", "")).await;
    assert!(before.ends_with(b"Say Smiley"));

    let mut reloaded = ProxyConfig::default();
    reloaded.proxy.origin_port = origin.port();
    reloaded.rewrite.response.push(rule("Smiley", "Trolly"));
    proxy.config_updates.send(reloaded).unwrap();

    let mut applied = false;
    for _ in 0..50 {
        if proxy.controller.rules().response().len() == 1 {
            applied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(applied, "reloaded configuration was never applied");

    let after = common::send(proxy.addr, &get("/", "")).await;
    assert!(after.ends_with(b"Say Trolly"));

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (origin, _seen) = common::start_mock_origin(PAGE).await;
    let proxy = common::start_proxy(ProxyConfig::default(), origin.port()).await;
    let addr = proxy.addr;

    proxy.shutdown.trigger();

    let mut refused = false;
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refused, "listener still accepting after shutdown");
}
