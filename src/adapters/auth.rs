//! Caller authentication: purchaser JWTs, the fridge pre-shared key and the
//! Mercado Pago webhook signature.

use {
    crate::{AppState, domain::error::SettlementError, transport::http::errors::ApiError},
    axum::{
        extract::{Request, State},
        middleware::Next,
        response::Response,
    },
    hmac::{Hmac, Mac},
    jsonwebtoken::{DecodingKey, Validation},
    serde::{Deserialize, Serialize},
    sha2::Sha256,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimedUser {
    pub id: i64,
}

/// `{"user": {"id": ..}, "exp": ..}`, as issued by the login service.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub user: ClaimedUser,
    pub exp: usize,
}

/// Authenticated purchaser, inserted into request extensions.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
}

pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| SettlementError::Unauthorized("missing bearer token".into()))?;

    let token_data = jsonwebtoken::decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        SettlementError::Unauthorized("invalid or expired token".into())
    })?;

    request.extensions_mut().insert(AuthUser {
        user_id: token_data.claims.user.id,
    });

    Ok(next.run(request).await)
}

/// Fridge controllers authenticate with a pre-shared `x-api-key`.
pub async fn fridge_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq::constant_time_eq(presented.as_bytes(), state.fridge_api_key.as_bytes()) {
        tracing::warn!("fridge request with invalid api key");
        return Err(SettlementError::Unauthorized("invalid api key".into()).into());
    }

    Ok(next.run(request).await)
}

/// Verifies `x-signature: ts=<ts>,v1=<hex>` as HMAC-SHA256 over
/// `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`.
pub fn verify_webhook_signature(
    signature_header: &str,
    request_id: Option<&str>,
    data_id: Option<&str>,
    secret: &str,
) -> Result<(), SettlementError> {
    let mut ts = "";
    let mut v1 = "";
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = value,
            Some(("v1", value)) => v1 = value,
            _ => {}
        }
    }
    if ts.is_empty() || v1.is_empty() {
        return Err(SettlementError::WebhookSignature(
            "malformed x-signature header".into(),
        ));
    }

    let mut manifest = String::new();
    if let Some(id) = data_id {
        // Mercado Pago signs alphanumeric ids in lower case.
        manifest.push_str(&format!("id:{};", id.to_ascii_lowercase()));
    }
    if let Some(request_id) = request_id {
        manifest.push_str(&format!("request-id:{request_id};"));
    }
    manifest.push_str(&format!("ts:{ts};"));

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SettlementError::WebhookSignature("HMAC key error".into()))?;
    mac.update(manifest.as_bytes());

    let expected = hex::decode(v1)
        .map_err(|_| SettlementError::WebhookSignature("invalid signature hex".into()))?;
    mac.verify_slice(&expected)
        .map_err(|_| SettlementError::WebhookSignature("signature mismatch".into()))
}
