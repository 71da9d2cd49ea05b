//! # Upload Auth 共有型定義
//!
//! 署名処理（`upauth-crypto`）とGateway（`upauth-gateway`）の間、
//! およびGatewayとクライアントの間でやり取りされるJSON構造を定義する。
//!
//! フィールド名はメディアホスティングAPIの署名仕様に合わせており、
//! クライアントSDKはこのレスポンスをそのままアップロード時の認証に使う。

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 認証パラメータ
// ---------------------------------------------------------------------------

/// アップロード用の短命な署名付き認証パラメータ。
///
/// リクエストごとに新しく生成され、サーバー側には一切保存されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParameters {
    /// ランダムなワンタイムトークン（UUID v4）
    pub token: String,
    /// 有効期限（UNIXタイムスタンプ、秒）
    pub expire: i64,
    /// `token + expire` に対するHMAC-SHA1署名（小文字16進数）
    pub signature: String,
}

// ---------------------------------------------------------------------------
// ヘルスチェック
// ---------------------------------------------------------------------------

/// `GET /` レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 常に `"OK"`
    pub status: String,
    /// サービス名
    pub service: String,
    /// 応答時刻（RFC 3339、UTC）
    pub timestamp: String,
}

/// ヘルスチェックの `status` に入る値
pub const HEALTH_STATUS_OK: &str = "OK";

// ---------------------------------------------------------------------------
// エラー
// ---------------------------------------------------------------------------

/// エラーレスポンスのボディ。
///
/// `details` は開発モードでのみ埋められる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// クライアント向けの汎用メッセージ
    pub error: String,
    /// 内部エラーの詳細
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// 詳細なしのエラーレスポンスを構築する。
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// 詳細を付与する。
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// details未設定のときJSONにキー自体が出ないことを確認
    #[test]
    fn test_error_response_omits_empty_details() {
        let json = serde_json::to_value(ErrorResponse::new("Endpoint not found")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Endpoint not found" }));
    }

    #[test]
    fn test_error_response_with_details() {
        let body = ErrorResponse::new("Failed").with_details("bad key");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["details"], "bad key");
    }

    /// 認証パラメータのフィールド名が署名仕様どおりであることを確認
    #[test]
    fn test_auth_parameters_field_names() {
        let params = AuthParameters {
            token: "t".to_string(),
            expire: 1_700_000_000,
            signature: "abc".to_string(),
        };
        let json = serde_json::to_value(&params).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["expire", "signature", "token"]);
        assert!(json["expire"].is_i64());
    }
}
