//! # GET /
//!
//! 死活監視エンドポイント。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use upauth_types::{HealthResponse, HEALTH_STATUS_OK};

use crate::config::GatewayState;

/// GET / — プロセスが生きていれば常に200を返す。
pub async fn handle_health(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HEALTH_STATUS_OK.to_string(),
        service: state.service_name.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
