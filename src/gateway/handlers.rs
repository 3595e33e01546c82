//! HTTP handlers for the rush path (§6). Request/response shapes and the
//! `ApiResult`/`ApiResponse` envelope are grounded in the source gateway's
//! handler conventions (extract `State<Arc<AppState>>`, return `ApiResult<T>`).

use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult, ok};

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RushRequest {
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Serialize)]
pub struct RushResponseData {
    pub success: bool,
    pub ticket: String,
}

/// `POST /api/v1/flash-sales/{id}/rush`
pub async fn rush(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(activity_id): Path<i64>,
    body: Option<Json<RushRequest>>,
) -> ApiResult<RushResponseData> {
    let quantity = body.map(|Json(r)| r.quantity).unwrap_or(1).max(1);

    let admitted = state
        .admission
        .rush(activity_id, claims.sub, quantity)
        .await
        .map_err(ApiError::from)?;

    ok(RushResponseData {
        success: true,
        ticket: admitted.ticket,
    })
}

#[derive(Debug, Serialize)]
pub struct ActivityResponseData {
    pub flash_sale: ActivitySummary,
    pub current_stock: i32,
    pub server_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ActivitySummary {
    pub id: i64,
    pub product_id: i64,
    pub flash_price: rust_decimal::Decimal,
    pub total_stock: i32,
    pub per_user_limit: i32,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub status: &'static str,
}

fn status_label(status: crate::domain::ActivityStatus) -> &'static str {
    use crate::domain::ActivityStatus::*;
    match status {
        Pending => "pending",
        Active => "active",
        Finished => "finished",
    }
}

/// `GET /api/v1/flash-sales/{id}`
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> ApiResult<ActivityResponseData> {
    let activity = state
        .store
        .get_activity(activity_id, crate::admission::DS_DEADLINE)
        .await
        .map_err(|_| ApiError::not_found("activity not found"))?;

    let current_stock = state
        .rs
        .live_stock(activity_id)
        .await
        .unwrap_or(activity.available_stock);

    ok(ActivityResponseData {
        current_stock,
        server_time: chrono::Utc::now(),
        flash_sale: ActivitySummary {
            id: activity.id,
            product_id: activity.product_id,
            flash_price: activity.flash_price,
            total_stock: activity.total_stock,
            per_user_limit: activity.per_user_limit,
            start_time: activity.start_time,
            end_time: activity.end_time,
            status: status_label(activity.status),
        },
    })
}

#[derive(Debug, Serialize)]
pub struct StockResponseData {
    pub stock: i32,
}

/// `GET /api/v1/flash-sales/{id}/stock`
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> ApiResult<StockResponseData> {
    let stock = match state.rs.live_stock(activity_id).await {
        Ok(s) => s,
        Err(_) => {
            let activity = state
                .store
                .get_activity(activity_id, crate::admission::DS_DEADLINE)
                .await
                .map_err(|_| ApiError::not_found("activity not found"))?;
            activity.available_stock
        }
    };
    ok(StockResponseData { stock })
}

#[derive(Debug, Serialize)]
pub struct HealthResponseData {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub git_hash: &'static str,
}

/// `GET /healthz` — no auth, ambient liveness probe (§4.10).
pub async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponseData> {
    match state.store.health_check().await {
        Ok(()) => ok(HealthResponseData {
            status: "ok",
            uptime_secs: state.uptime_secs(),
            git_hash: env!("GIT_HASH"),
        }),
        Err(e) => ApiError::service_unavailable(format!("durable store unreachable: {e}")).into_err(),
    }
}
