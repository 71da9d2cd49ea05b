//! # 認証パラメータ発行の中継
//!
//! 署名器を呼び出し、生成された認証パラメータをそのまま返す。
//! 結果はキャッシュしない。

use upauth_crypto::AuthSigner;
use upauth_types::AuthParameters;

use crate::error::GatewayError;

/// 署名器を一度だけ呼び出して認証パラメータを発行する。
///
/// 署名器のエラーは `GatewayError::Issuance` に包んで返す。
/// 詳細をクライアントに返すかどうかはHTTP層が決める。
pub fn issue(signer: &dyn AuthSigner) -> Result<AuthParameters, GatewayError> {
    signer
        .authentication_parameters()
        .map_err(|e| GatewayError::Issuance(e.to_string()))
}
