//! Unified error taxonomy and HTTP envelope.
//!
//! - [`RushError`]: the terminal outcomes of the admission path, mapped 1:1 onto
//!   the business error codes of the external interface.
//! - [`ApiResponse`]/[`ApiResult`]/[`ApiError`]: the HTTP envelope every handler
//!   returns through, independent of which internal error produced it.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Standard API error codes.
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Business-terminal (1xxx)
    pub const STOCK_INSUFFICIENT: i32 = 1001;
    pub const LIMIT_EXCEEDED: i32 = 1002;
    pub const ACTIVITY_NOT_ACTIVE: i32 = 1003;
    pub const ORDER_NOT_FOUND: i32 = 1004;
    pub const ORDER_STATUS_INVALID: i32 = 1005;

    // Validation / auth (2xxx)
    pub const INVALID_PARAMETER: i32 = 2001;
    pub const MISSING_AUTH: i32 = 2002;
    pub const AUTH_FAILED: i32 = 2003;

    // Conflict (4xxx)
    pub const ALREADY_PURCHASED: i32 = 4001;
    pub const DUPLICATE_SUBMIT: i32 = 4002;

    // Transient infrastructure (5xxx)
    pub const SYSTEM_BUSY: i32 = 5000;
    pub const INTERNAL_ERROR: i32 = 5001;
}

/// Unified API response wrapper: `code == 0` on success, non-zero identifies
/// the error class; `data` is present only on success.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> =
    Result<(StatusCode, Json<ApiResponse<T>>), (StatusCode, Json<ApiResponse<()>>)>;

#[inline]
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

#[inline]
pub fn accepted<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(data))))
}

/// Unified error type with automatic [`IntoResponse`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::ORDER_NOT_FOUND, msg)
    }

    pub fn conflict(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SYSTEM_BUSY,
            msg,
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err((
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.message)),
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.message)),
        )
            .into_response()
    }
}

impl From<ApiError> for (StatusCode, Json<ApiResponse<()>>) {
    fn from(err: ApiError) -> Self {
        (
            err.status,
            Json(ApiResponse::<()>::error(err.code, err.message)),
        )
    }
}

/// Terminal outcomes of the admission algorithm (§4.2). Every variant maps to
/// exactly one business error code; none of them are logged as errors, since
/// they are expected steady-state outcomes of an oversubscribed sale.
#[derive(Debug, thiserror::Error)]
pub enum RushError {
    #[error("activity has not started yet")]
    NotStarted,
    #[error("activity has ended")]
    Ended,
    #[error("activity is not active")]
    NotActive,
    #[error("user already purchased in this activity, order {order_no}")]
    AlreadyPurchased { order_no: String },
    #[error("duplicate submission, please wait")]
    DuplicateSubmit,
    #[error("stock insufficient")]
    StockInsufficient,
    #[error("purchase limit exceeded")]
    LimitExceeded,
    #[error("system busy, please retry")]
    SystemBusy,
}

impl From<RushError> for ApiError {
    fn from(err: RushError) -> Self {
        use error_codes::*;
        match err {
            RushError::NotStarted | RushError::Ended | RushError::NotActive => {
                ApiError::new(StatusCode::BAD_REQUEST, ACTIVITY_NOT_ACTIVE, err.to_string())
            }
            RushError::AlreadyPurchased { .. } => {
                ApiError::conflict(ALREADY_PURCHASED, err.to_string())
            }
            RushError::DuplicateSubmit => ApiError::conflict(DUPLICATE_SUBMIT, err.to_string()),
            RushError::StockInsufficient => {
                ApiError::new(StatusCode::CONFLICT, STOCK_INSUFFICIENT, err.to_string())
            }
            RushError::LimitExceeded => {
                ApiError::new(StatusCode::CONFLICT, LIMIT_EXCEEDED, err.to_string())
            }
            RushError::SystemBusy => ApiError::service_unavailable(err.to_string()),
        }
    }
}
