//! Bearer JWT verification (§4.10, §1: issuance is out of scope, only
//! verification). Grounded in the user-auth service's `Claims`/`verify_token`
//! and its `jwt_auth_middleware`, stripped of registration/login/API-key
//! issuance since nothing in this crate mints tokens.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResponse, error_codes};
use crate::gateway::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct Claims {
    /// Subject: the authenticated user id, as a string per JWT convention.
    pub sub: i64,
    pub exp: usize,
    pub iat: usize,
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    Ok(decode::<Claims>(token, &decoding_key, &validation)?.claims)
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, axum::Json<ApiResponse<()>>)> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            axum::Json(ApiResponse::<()>::error(
                error_codes::MISSING_AUTH,
                "missing Authorization header",
            )),
        ))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or((
        StatusCode::UNAUTHORIZED,
        axum::Json(ApiResponse::<()>::error(
            error_codes::AUTH_FAILED,
            "invalid token format",
        )),
    ))?;

    match verify_token(token, &state.jwt_secret) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => Err((
            StatusCode::UNAUTHORIZED,
            axum::Json(ApiResponse::<()>::error(
                error_codes::AUTH_FAILED,
                "invalid or expired token",
            )),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn round_trips_a_valid_token() {
        let claims = Claims { sub: 42, exp: 9_999_999_999, iat: 0 };
        let token = sign(&claims, "secret");
        let decoded = verify_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, 42);
    }

    #[test]
    fn rejects_a_token_signed_with_the_wrong_secret() {
        let claims = Claims { sub: 42, exp: 9_999_999_999, iat: 0 };
        let token = sign(&claims, "secret");
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn rejects_an_expired_token() {
        let claims = Claims { sub: 42, exp: 1, iat: 0 };
        let token = sign(&claims, "secret");
        assert!(verify_token(&token, "secret").is_err());
    }
}
