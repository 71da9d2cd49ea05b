//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型と、HTTPレスポンスへの変換。
//! 内部エラーの詳細は開発モードでのみクライアントに返す。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use upauth_types::ErrorResponse;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 署名器が認証パラメータの生成に失敗
    #[error("認証パラメータの生成に失敗: {0}")]
    Issuance(String),
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 未定義のルート
    #[error("エンドポイントが見つかりません")]
    NotFound,
    /// レート制限超過
    #[error("{0}")]
    RateLimited(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl GatewayError {
    /// 対応するHTTPステータス
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Issuance(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// クライアント向けのレスポンスボディを構築する。
    pub fn body(&self, expose_details: bool) -> ErrorResponse {
        let (public, details) = match self {
            GatewayError::Issuance(d) => ("Failed to generate authentication parameters", Some(d)),
            GatewayError::BadRequest(d) => ("Invalid request body", Some(d)),
            GatewayError::NotFound => ("Endpoint not found", None),
            GatewayError::RateLimited(msg) => return ErrorResponse::new(msg.clone()),
            GatewayError::Internal(d) => ("Internal server error", Some(d)),
        };
        let body = ErrorResponse::new(public);
        match details {
            Some(d) if expose_details => body.with_details(d.clone()),
            _ => body,
        }
    }

    /// 詳細の公開可否を指定してレスポンスに変換する。
    pub fn into_response_with(self, expose_details: bool) -> Response {
        (self.status(), Json(self.body(expose_details))).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::Issuance("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(GatewayError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::RateLimited("slow down".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    /// 本番モードでは内部メッセージを返さないことを確認
    #[test]
    fn test_issuance_details_withheld_by_default() {
        let err = GatewayError::Issuance("invalid private key material".into());
        let body = err.body(false);
        assert_eq!(body.error, "Failed to generate authentication parameters");
        assert_eq!(body.details, None);
    }

    #[test]
    fn test_issuance_details_exposed_in_development() {
        let err = GatewayError::Issuance("invalid private key material".into());
        let body = err.body(true);
        assert_eq!(body.details.as_deref(), Some("invalid private key material"));
    }

    #[test]
    fn test_not_found_body() {
        let body = GatewayError::NotFound.body(true);
        assert_eq!(body.error, "Endpoint not found");
        assert_eq!(body.details, None);
    }

    #[test]
    fn test_rate_limited_body_is_message() {
        let body = GatewayError::RateLimited("Too many".into()).body(false);
        assert_eq!(body.error, "Too many");
    }
}
