//! # POST /imagekit/auth
//!
//! 認証パラメータの発行。
//!
//! リクエストボディは受け付けるが中身は参照しない。
//! JSONとして宣言されたボディが壊れている場合、
//! またはトップレベルがオブジェクト・配列以外の場合のみ400を返す。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use upauth_types::AuthParameters;

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::relay;

/// POST /imagekit/auth — 認証パラメータの発行。
///
/// 署名器の失敗は500として返す。内部メッセージは開発モードでのみ含める。
pub async fn handle_auth(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AuthParameters>, Response> {
    if is_json(&headers) && !body.is_empty() {
        check_json_body(&body).map_err(|e| {
            tracing::debug!(error = %e, "リクエストボディのJSONパースに失敗しました");
            e.into_response_with(state.expose_error_details)
        })?;
    }

    let params = relay::issue(state.signer.as_ref()).map_err(|e| {
        tracing::error!(error = %e, "認証パラメータの生成に失敗しました");
        e.into_response_with(state.expose_error_details)
    })?;

    tracing::info!("認証パラメータを発行しました");
    Ok(Json(params))
}

/// JSONボディを検証する。トップレベルはオブジェクトか配列のみ受け付ける。
fn check_json_body(body: &[u8]) -> Result<(), GatewayError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    if value.is_object() || value.is_array() {
        Ok(())
    } else {
        Err(GatewayError::BadRequest(
            "top-level JSON value must be an object or an array".to_string(),
        ))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let mime = v.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}
