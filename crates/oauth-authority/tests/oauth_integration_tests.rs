//! Full end-to-end integration tests for the OAuth 2.1 flow via HTTP.
//!
//! Drives the axum `Router` with `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tower::ServiceExt;

use oauth_authority::AuthorizationServer;
use oauth_authority::authority::pkce::challenge_s256;
use oauth_authority::config::AuthorityConfig;
use oauth_authority::server::create_router;

const BASE_URL: &str = "https://example.com";
const CALLBACK: &str = "https://client.example.com/cb";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

fn build_test_router() -> axum::Router {
    let authority = Arc::new(AuthorizationServer::new(AuthorityConfig::for_testing()));
    create_router(authority, BASE_URL.to_string())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

async fn register(app: &axum::Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "client_name": "Integration Test Client",
                        "redirect_uris": [CALLBACK]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    (
        json["client_id"].as_str().unwrap().to_string(),
        json["client_secret"].as_str().unwrap().to_string(),
    )
}

async fn authorize(app: &axum::Router, client_id: &str, scope: &str) -> String {
    let uri = format!(
        "/authorize?client_id={}&redirect_uri={}&response_type=code&state=xyz123&code_challenge={}&code_challenge_method=S256&scope={}",
        client_id,
        url_encode(CALLBACK),
        challenge_s256(VERIFIER),
        url_encode(scope),
    );
    let response = app.clone().oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    assert!(location.starts_with(CALLBACK));
    let url = url::Url::parse(location).unwrap();
    let pairs: HashMap<_, _> = url.query_pairs().collect();
    assert_eq!(pairs.get("state").map(|s| s.as_ref()), Some("xyz123"));
    pairs.get("code").unwrap().to_string()
}

async fn post_form(app: &axum::Router, path: &str, params: &[(&str, &str)]) -> axum::response::Response {
    let body = serde_urlencoded::to_string(params).unwrap();
    app.clone()
        .oneshot(
            Request::post(path)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_with_bearer(app: &axum::Router, path: &str, token: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::get(path)
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

// ─── Discovery ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_auth_server_metadata() {
    let app = build_test_router();

    let response = app
        .oneshot(Request::get("/.well-known/oauth-authorization-server").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["issuer"], BASE_URL);
    assert_eq!(json["token_endpoint"], format!("{BASE_URL}/token"));
    assert_eq!(json["revocation_endpoint"], format!("{BASE_URL}/revoke"));
    assert!(json["code_challenge_methods_supported"].as_array().unwrap().contains(&json!("S256")));
}

#[tokio::test]
async fn test_protected_resource_metadata() {
    let app = build_test_router();

    let response = app
        .oneshot(Request::get("/.well-known/oauth-protected-resource").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["authorization_servers"].as_array().unwrap().contains(&json!(BASE_URL)));
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_returns_secret_and_expiry() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"client_name": "Test", "redirect_uris": [CALLBACK]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["client_secret"].as_str().unwrap().len(), 64);
    let issued = json["client_id_issued_at"].as_i64().unwrap();
    let expires = json["client_secret_expires_at"].as_i64().unwrap();
    assert!((expires - issued - 365 * 24 * 3600).abs() <= 1);
}

#[tokio::test]
async fn test_register_requires_redirect_uris() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"client_name": "Bad Client"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_client_metadata");
}

#[tokio::test]
async fn test_register_cap_returns_503() {
    let config = AuthorityConfig { max_clients: 1, ..AuthorityConfig::for_testing() };
    let app = create_router(Arc::new(AuthorizationServer::new(config)), BASE_URL.to_string());

    register(&app).await;
    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"redirect_uris": [CALLBACK]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_register_rate_limit_returns_429() {
    let config = AuthorityConfig::new(100, NonZeroU32::new(1).unwrap());
    let app = create_router(Arc::new(AuthorizationServer::new(config)), BASE_URL.to_string());

    register(&app).await;
    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"redirect_uris": [CALLBACK]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await["error"], "slow_down");
}

#[tokio::test]
async fn test_register_malformed_json_is_invalid_client_metadata() {
    let app = build_test_router();

    let response = app
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from("{\"redirect_uris\": ["))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert_eq!(json_body(response).await["error"], "invalid_client_metadata");
}

// ─── Authorization ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_rejects_unregistered_redirect_without_redirecting() {
    let app = build_test_router();
    let (client_id, _) = register(&app).await;

    let uri = format!(
        "/authorize?client_id={}&redirect_uri={}&response_type=code&code_challenge=abc&code_challenge_method=S256",
        client_id,
        url_encode("https://evil.example.com/cb"),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("Location").is_none());
}

#[tokio::test]
async fn test_authorize_requires_s256() {
    let app = build_test_router();
    let (client_id, _) = register(&app).await;

    let uri = format!(
        "/authorize?client_id={}&redirect_uri={}&response_type=code&code_challenge=abc&code_challenge_method=plain",
        client_id,
        url_encode(CALLBACK),
    );
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ─── Full flow ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_oauth_http_flow() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;
    let code = authorize(&app, &client_id, "read write").await;

    // Exchange code
    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", CALLBACK),
            ("code_verifier", VERIFIER),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    let tokens = json_body(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert_eq!(tokens["scope"], "read write");
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    // Bearer-protected route
    let response = get_with_bearer(&app, "/token/info", &access_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let info = json_body(response).await;
    assert_eq!(info["client_id"], client_id);
    assert_eq!(info["scope"], "read write");

    // Replay the code
    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("code_verifier", VERIFIER),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_grant");

    // Refresh with narrowed scope, authenticating with HTTP Basic
    let basic = STANDARD.encode(format!("{client_id}:{client_secret}"));
    let response = app
        .clone()
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .header("Authorization", format!("Basic {basic}"))
                .body(Body::from(
                    serde_urlencoded::to_string([
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                        ("scope", "read"),
                    ])
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = json_body(response).await;
    assert_eq!(rotated["scope"], "read");
    let new_access = rotated["access_token"].as_str().unwrap().to_string();
    assert_ne!(new_access, access_token);

    // Revoke the new access token
    let response = post_form(
        &app,
        "/revoke",
        &[("token", &new_access), ("client_id", &client_id), ("client_secret", &client_secret)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_with_bearer(&app, "/token/info", &new_access).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let www_auth = response.headers().get("WWW-Authenticate").unwrap().to_str().unwrap();
    assert!(www_auth.contains("oauth-protected-resource"));
    assert!(www_auth.contains("invalid_token"));

    // The original access token is still live.
    let response = get_with_bearer(&app, "/token/info", &access_token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_rejects_wrong_pkce_verifier() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;
    let code = authorize(&app, &client_id, "read").await;
    let wrong_verifier = "x".repeat(43);

    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("code_verifier", &wrong_verifier),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_redirect_uri_mismatch_keeps_code_redeemable() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;
    let code = authorize(&app, &client_id, "read").await;

    let form = |redirect_uri: &'static str| {
        [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri),
            ("code_verifier", VERIFIER),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ]
    };

    let response = post_form(&app, "/token", &form("https://client.example.com/other")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_grant");

    // The mismatch did not consume the code.
    let response = post_form(&app, "/token", &form(CALLBACK)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["scope"], "read");
}

#[tokio::test]
async fn test_token_rejects_bad_client_secret() {
    let app = build_test_router();
    let (client_id, _) = register(&app).await;
    let code = authorize(&app, &client_id, "read").await;

    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("code_verifier", VERIFIER),
            ("client_id", &client_id),
            ("client_secret", "not-the-secret"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_token_rejects_widened_scope() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;
    let code = authorize(&app, &client_id, "read").await;

    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("code_verifier", VERIFIER),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
        ],
    )
    .await;
    let tokens = json_body(response).await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    let response = post_form(
        &app,
        "/token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", &refresh_token),
            ("scope", "read admin"),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_scope");
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;

    let response = post_form(
        &app,
        "/token",
        &[("grant_type", "password"), ("client_id", &client_id), ("client_secret", &client_secret)],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_token_missing_grant_type_is_invalid_request() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;

    let response =
        post_form(&app, "/token", &[("client_id", &client_id), ("client_secret", &client_secret)]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_revoke_unknown_token_returns_200() {
    let app = build_test_router();
    let (client_id, client_secret) = register(&app).await;

    let response = post_form(
        &app,
        "/revoke",
        &[("token", "vat_unknown"), ("client_id", &client_id), ("client_secret", &client_secret)],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_route_requires_bearer() {
    let app = build_test_router();

    let response = app
        .clone()
        .oneshot(Request::get("/token/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let www_auth = response.headers().get("WWW-Authenticate").unwrap().to_str().unwrap();
    assert!(www_auth.contains("oauth-protected-resource"));

    let response = get_with_bearer(&app, "/token/info", "vat_unknown").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
