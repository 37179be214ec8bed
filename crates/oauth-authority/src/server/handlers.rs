//! OAuth 2.1 endpoint handlers.
//!
//! Implements:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code and Refresh Token grants
//! - RFC 7009: Token Revocation
//! - RFC 6750: Bearer token usage for protected routes

use std::sync::Arc;

use axum::{
    Extension, Form, Json,
    extract::rejection::{FormRejection, JsonRejection},
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use axum_extra::extract::WithRejection;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::{Basic, Bearer};
use serde::Deserialize;

use super::HttpState;
use crate::authority::types::parse_scope;
use crate::authority::{
    AuthInfo, AuthorizeParams, Client, ClientMetadata, RevocationRequest, TokenResponse,
    TokenVerifier, pkce,
};
use crate::error::{OAuthError, OAuthResult};

const GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];
const AUTH_METHODS: [&str; 2] = ["client_secret_post", "client_secret_basic"];

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status_code(),
            Json(serde_json::json!({
                "error": self.error_code(),
                "error_description": self.to_string()
            })),
        )
            .into_response();
        response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

impl From<JsonRejection> for OAuthError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_metadata(rejection.body_text())
    }
}

impl From<FormRejection> for OAuthError {
    fn from(rejection: FormRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

// ─── Health ──────────────────────────────────────────────────────────────────

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "oauth-authority",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn readiness_check(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let stats = state.authority.stats().await;
    Json(serde_json::json!({
        "status": "ready",
        "service": "oauth-authority",
        "version": env!("CARGO_PKG_VERSION"),
        "stats": stats
    }))
}

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resource": state.base_url,
        "authorization_servers": [state.base_url],
        "bearer_methods_supported": ["header"]
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.base_url,
        "authorization_endpoint": format!("{}/authorize", state.base_url),
        "token_endpoint": format!("{}/token", state.base_url),
        "registration_endpoint": format!("{}/register", state.base_url),
        "revocation_endpoint": format!("{}/revoke", state.base_url),
        "response_types_supported": ["code"],
        "grant_types_supported": GRANT_TYPES,
        "token_endpoint_auth_methods_supported": AUTH_METHODS,
        "revocation_endpoint_auth_methods_supported": AUTH_METHODS,
        "code_challenge_methods_supported": [pkce::S256]
    }))
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

/// `POST /register`
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    WithRejection(Json(metadata), _): WithRejection<Json<ClientMetadata>, OAuthError>,
) -> Response {
    let client = match state.authority.register_client(metadata).await {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    let mut body = match serde_json::to_value(&client) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize registered client");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    body["grant_types"] = serde_json::json!(GRANT_TYPES);
    body["response_types"] = serde_json::json!(["code"]);
    body["token_endpoint_auth_method"] = serde_json::json!("client_secret_post");

    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

/// `GET /authorize`
///
/// Auto-approve the authorization request. Tool-calling clients are
/// machine-to-machine, so there is no interactive consent page: any
/// registered client presenting a registered redirect target and an S256
/// challenge is approved. Errors are returned directly, never redirected.
pub async fn handle_authorize_get(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    match authorize(&state, query).await {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn authorize(state: &HttpState, query: AuthorizeQuery) -> OAuthResult<String> {
    let client_id = query.client_id.ok_or_else(|| OAuthError::invalid_request("Missing client_id"))?;
    let redirect_uri =
        query.redirect_uri.ok_or_else(|| OAuthError::invalid_request("Missing redirect_uri"))?;
    let code_challenge =
        query.code_challenge.ok_or_else(|| OAuthError::invalid_request("Missing code_challenge"))?;

    if query.response_type.as_deref() != Some("code") {
        return Err(OAuthError::invalid_request("response_type must be 'code'"));
    }
    if query.code_challenge_method.as_deref() != Some(pkce::S256) {
        return Err(OAuthError::invalid_request("code_challenge_method must be 'S256'"));
    }

    let client = state
        .authority
        .get_client(&client_id)
        .await
        .ok_or_else(|| OAuthError::invalid_request("Unknown client_id"))?;

    let params = AuthorizeParams {
        code_challenge,
        redirect_uri,
        scopes: parse_scope(query.scope.as_deref().unwrap_or_default()),
        state: query.state,
    };
    let redirect = state.authority.authorize(&client, params).await?;

    tracing::info!(client_id = %client.client_id, "Auto-approved authorization");
    Ok(redirect.location)
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// `POST /token`
///
/// Exchange an authorization code for tokens, or rotate a refresh token.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    WithRejection(Form(form), _): WithRejection<Form<TokenRequest>, OAuthError>,
) -> Response {
    let result = async {
        let client =
            authenticate(&state, basic.as_ref(), form.client_id.as_deref(), form.client_secret.as_deref())
                .await?;
        match form.grant_type.as_str() {
            "authorization_code" => authorization_code_grant(&state, &client, &form).await,
            "refresh_token" => refresh_token_grant(&state, &client, &form).await,
            other => Err(OAuthError::UnsupportedGrantType(other.to_owned())),
        }
    }
    .await;

    match result {
        Ok(pair) => token_success(&pair),
        Err(e) => e.into_response(),
    }
}

async fn authorization_code_grant(
    state: &HttpState,
    client: &Client,
    form: &TokenRequest,
) -> OAuthResult<TokenResponse> {
    let code = form.code.as_deref().ok_or_else(|| OAuthError::invalid_request("Missing code"))?;
    let code_verifier = form
        .code_verifier
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing code_verifier"))?;

    let pending = state.authority.pending_authorization(client, code).await?;

    if form.redirect_uri.as_ref().is_some_and(|uri| *uri != pending.redirect_uri) {
        return Err(OAuthError::InvalidGrant);
    }
    if !pkce::verify_s256(code_verifier, &pending.code_challenge) {
        tracing::warn!(client_id = %client.client_id, "PKCE verification failed");
        return Err(OAuthError::InvalidGrant);
    }

    state.authority.exchange_authorization_code(client, code).await
}

async fn refresh_token_grant(
    state: &HttpState,
    client: &Client,
    form: &TokenRequest,
) -> OAuthResult<TokenResponse> {
    let refresh_token = form
        .refresh_token
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing refresh_token"))?;
    let requested = form.scope.as_deref().map(parse_scope);

    state.authority.exchange_refresh_token(client, refresh_token, requested.as_deref()).await
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(pair: &TokenResponse) -> Response {
    let mut response = Json(pair).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ─── RFC 7009: Revocation Endpoint ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RevokeForm {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// `POST /revoke`
///
/// Once the client authenticates, the answer is always 200, whether or not
/// the token was recognized.
pub async fn handle_revoke(
    State(state): State<Arc<HttpState>>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    WithRejection(Form(form), _): WithRejection<Form<RevokeForm>, OAuthError>,
) -> Response {
    let client = match authenticate(
        &state,
        basic.as_ref(),
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
    )
    .await
    {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };
    let Some(token) = form.token else {
        return OAuthError::invalid_request("Missing token").into_response();
    };

    let request = RevocationRequest { token, token_type_hint: form.token_type_hint };
    state.authority.revoke_token(&client, &request).await;

    StatusCode::OK.into_response()
}

/// Authenticate the calling client from HTTP Basic, falling back to form
/// credentials.
async fn authenticate(
    state: &HttpState,
    basic: Option<&TypedHeader<Authorization<Basic>>>,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> OAuthResult<Client> {
    let (client_id, client_secret) = match basic {
        Some(TypedHeader(Authorization(basic))) => (basic.username(), Some(basic.password())),
        None => (client_id.ok_or(OAuthError::InvalidClient)?, client_secret),
    };
    state.authority.authenticate_client(client_id, client_secret).await
}

// ─── Bearer-protected routes ─────────────────────────────────────────────────

/// Middleware for routes that require a bearer access token.
///
/// On success the verified [`AuthInfo`] is attached as a request extension.
pub async fn require_bearer(
    State(state): State<Arc<HttpState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return unauthorized(&state, None);
    };

    match state.authority.verify(bearer.token()).await {
        Ok(info) => {
            request.extensions_mut().insert(info);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Bearer token rejected");
            unauthorized(&state, Some(&e))
        }
    }
}

/// 401 with a `WWW-Authenticate` challenge pointing at resource metadata.
fn unauthorized(state: &HttpState, error: Option<&OAuthError>) -> Response {
    let mut challenge = format!(
        "Bearer resource_metadata=\"{}/.well-known/oauth-protected-resource\"",
        state.base_url
    );
    if let Some(e) = error {
        challenge.push_str(&format!(", error=\"{}\", error_description=\"{}\"", e.error_code(), e));
    }

    let mut response = StatusCode::UNAUTHORIZED.into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// `GET /token/info`
///
/// Describes the grant behind the presented bearer token.
pub async fn handle_token_info(Extension(info): Extension<AuthInfo>) -> impl IntoResponse {
    Json(serde_json::json!({
        "client_id": info.client_id,
        "scope": info.scopes.join(" "),
        "exp": info.expires_at
    }))
}
