//! End-to-end tests: a real gateway listener in front of a real loopback
//! upstream, driven over HTTP. The shared store is the in-memory fake.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{Json, Router, extract::Request, http::HeaderMap};
use gatekeeper::{Config, server};
use gatekeeper_auth::mocks::MemoryStore;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Upstream that echoes what it received as JSON.
async fn start_upstream() -> SocketAddr {
    async fn echo(headers: HeaderMap, request: Request) -> Json<Value> {
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .unwrap();

        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

        Json(json!({
            "method": method,
            "path": path,
            "query": query,
            "host": header("host"),
            "forwarded_for": header("x-forwarded-for"),
            "authorization": header("authorization"),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(echo)).await.unwrap();
    });
    addr
}

/// Address nothing listens on.
async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn start_gateway(target: SocketAddr, overrides: &[(&str, &str)]) -> String {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), "e2e-secret".to_string()),
        ("PROXY_TARGET_URL".to_string(), format!("http://{target}/api")),
    ]);
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let app = server::build_router(&config, MemoryStore::new()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, app, std::future::pending()));

    format!("http://{addr}")
}

async fn login(client: &reqwest::Client, base: &str) -> reqwest::Response {
    client
        .post(format!("{base}/public/login"))
        .header("content-type", "application/json")
        .body(json!({"user_id": "u-42", "username": "dana", "roles": ["reader"]}).to_string())
        .send()
        .await
        .unwrap()
}

async fn json_body(response: reqwest::Response) -> Value {
    serde_json::from_str(&response.text().await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_login_proxy_logout() {
    let upstream = start_upstream().await;
    let base = start_gateway(upstream, &[]).await;
    let client = reqwest::Client::new();

    let response = login(&client, &base).await;
    assert_eq!(response.status(), 200);
    let grant = json_body(response).await;
    let token = grant["token"].as_str().unwrap().to_string();

    let response = client
        .post(format!("{base}/protected/items/9?expand=owner&page=2"))
        .bearer_auth(&token)
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    let echoed = json_body(response).await;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/api/items/9");
    assert_eq!(echoed["query"], "expand=owner&page=2");
    assert_eq!(echoed["host"], upstream.to_string());
    assert_eq!(echoed["forwarded_for"], "127.0.0.1");
    assert_eq!(echoed["authorization"], format!("Bearer {token}"));
    assert_eq!(echoed["body"], "payload");

    let response = client
        .post(format!("{base}/protected/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(json_body(response).await["message"], "Logged out successfully");

    let response = client
        .get(format!("{base}/protected/items/9"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_second_login_supersedes_first_session() {
    let upstream = start_upstream().await;
    let base = start_gateway(upstream, &[]).await;
    let client = reqwest::Client::new();

    let first = json_body(login(&client, &base).await).await;
    let second = json_body(login(&client, &base).await).await;
    assert_ne!(first["session_id"], second["session_id"]);

    let response = client
        .get(format!("{base}/protected/me"))
        .bearer_auth(first["token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{base}/protected/me"))
        .bearer_auth(second["token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_rate_limit_then_block() {
    let upstream = start_upstream().await;
    let base = start_gateway(
        upstream,
        &[("MAX_REQUESTS_PER_MINUTE", "5"), ("BLOCK_DURATION_MINUTES", "2")],
    )
    .await;
    let client = reqwest::Client::new();

    for _ in 0..5 {
        let response = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(response.status(), 200);
    }

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), 429);
    assert_eq!(response.headers()["retry-after"], "120");
}

#[tokio::test]
async fn test_login_outside_allow_list() {
    let upstream = start_upstream().await;
    let base = start_gateway(upstream, &[("LOGIN_ALLOWED_IPS", "10.1.2.3")]).await;
    let client = reqwest::Client::new();

    let response = login(&client, &base).await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_invalid_payload() {
    let upstream = start_upstream().await;
    let base = start_gateway(upstream, &[]).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/public/login"))
        .header("content-type", "application/json")
        .body(r#"{"user_id": "u-42"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unreachable_upstream() {
    let target = closed_port().await;
    let base = start_gateway(target, &[]).await;
    let client = reqwest::Client::new();

    let token = json_body(login(&client, &base).await).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = client
        .get(format!("{base}/protected/anything"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
}
