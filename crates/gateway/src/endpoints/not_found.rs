//! # 未定義ルート

use crate::error::GatewayError;

/// 未定義ルートへのフォールバック。構造化された404を返す。
pub async fn handle_not_found() -> GatewayError {
    GatewayError::NotFound
}
