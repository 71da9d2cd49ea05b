//! # 認証パラメータ署名器
//!
//! 保持した鍵ペアから、クライアントが直接アップロードするための
//! `{token, expire, signature}` を生成する。

use std::time::{SystemTime, UNIX_EPOCH};

use upauth_types::AuthParameters;

use crate::{generate_token, hmac_sha1_hex, SignerError};

/// 有効期限のデフォルト（発行時刻からの秒数）
pub const DEFAULT_EXPIRY_SECS: i64 = 60 * 30;

/// 認証パラメータ署名器の抽象インターフェース。
///
/// Gatewayはこのトレイト経由で署名器を呼び出すため、
/// テストではモック実装に差し替えられる。
pub trait AuthSigner: Send + Sync {
    /// 新しい認証パラメータを生成する。
    ///
    /// 呼び出しごとに独立したトークンと有効期限を返さなければならない。
    fn authentication_parameters(&self) -> Result<AuthParameters, SignerError>;
}

/// メディアホスティングAPIの署名仕様に従う署名器。
pub struct ImageKitSigner {
    public_key: String,
    private_key: String,
    url_endpoint: String,
}

impl ImageKitSigner {
    /// 鍵ペアとエンドポイントから署名器を構築する。
    ///
    /// いずれかが空、またはエンドポイントが絶対URLでない場合は失敗する。
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        url_endpoint: impl Into<String>,
    ) -> Result<Self, SignerError> {
        let public_key = public_key.into();
        let private_key = private_key.into();
        let url_endpoint = url_endpoint.into();

        if public_key.is_empty() {
            return Err(SignerError::MissingKey("publicKey"));
        }
        if private_key.is_empty() {
            return Err(SignerError::MissingKey("privateKey"));
        }
        if url_endpoint.is_empty() {
            return Err(SignerError::MissingKey("urlEndpoint"));
        }

        let parsed = url::Url::parse(&url_endpoint)
            .map_err(|e| SignerError::InvalidEndpoint(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SignerError::InvalidEndpoint(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        Ok(Self {
            public_key,
            private_key,
            url_endpoint,
        })
    }

    /// 公開鍵
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// エンドポイントURL
    pub fn url_endpoint(&self) -> &str {
        &self.url_endpoint
    }

    /// トークン・有効期限を明示して認証パラメータを生成する。
    ///
    /// `None` の場合はそれぞれUUID v4、現在時刻 + [`DEFAULT_EXPIRY_SECS`] を使う。
    pub fn authentication_parameters_with(
        &self,
        token: Option<&str>,
        expire: Option<i64>,
    ) -> Result<AuthParameters, SignerError> {
        let token = match token {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => generate_token(),
        };
        let expire = match expire {
            Some(e) if e != 0 => e,
            _ => unix_now()? + DEFAULT_EXPIRY_SECS,
        };

        let message = format!("{token}{expire}");
        let signature = hmac_sha1_hex(self.private_key.as_bytes(), message.as_bytes())?;

        Ok(AuthParameters {
            token,
            expire,
            signature,
        })
    }
}

impl AuthSigner for ImageKitSigner {
    fn authentication_parameters(&self) -> Result<AuthParameters, SignerError> {
        self.authentication_parameters_with(None, None)
    }
}

impl std::fmt::Debug for ImageKitSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageKitSigner")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("url_endpoint", &self.url_endpoint)
            .finish()
    }
}

fn unix_now() -> Result<i64, SignerError> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SignerError::Clock(e.to_string()))?
        .as_secs();
    i64::try_from(secs).map_err(|e| SignerError::Clock(e.to_string()))
}
