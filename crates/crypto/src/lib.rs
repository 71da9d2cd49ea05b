//! # Upload Auth 署名処理
//!
//! メディアホスティングAPIへの直接アップロードに使う認証パラメータを生成する。
//!
//! ## アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | トークン | UUID v4 |
//! | 有効期限 | 現在時刻 + 30分（UNIX秒） |
//! | 署名 | HMAC-SHA1(秘密鍵, token ‖ expire) の小文字16進数 |

use hmac::{Hmac, Mac};
use sha1::Sha1;

pub mod signer;

pub use signer::{AuthSigner, ImageKitSigner, DEFAULT_EXPIRY_SECS};

type HmacSha1 = Hmac<Sha1>;

/// 署名処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// 鍵またはエンドポイントが空
    #[error("Missing {0} during signer initialization")]
    MissingKey(&'static str),
    /// エンドポイントURLが不正
    #[error("Invalid urlEndpoint: {0}")]
    InvalidEndpoint(String),
    /// HMAC鍵の初期化に失敗
    #[error("HMAC鍵の初期化に失敗しました")]
    InvalidKeyLength,
    /// システム時刻の取得に失敗
    #[error("システム時刻の取得に失敗: {0}")]
    Clock(String),
}

/// HMAC-SHA1を計算し、小文字16進数で返す。
pub fn hmac_sha1_hex(key: &[u8], message: &[u8]) -> Result<String, SignerError> {
    let mut mac = HmacSha1::new_from_slice(key).map_err(|_| SignerError::InvalidKeyLength)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// ワンタイムトークンを生成する（ハイフン付き小文字UUID v4）。
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
