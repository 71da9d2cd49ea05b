//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定は起動時に一度だけ構築され、以後変更されない。

use std::time::Duration;

use upauth_crypto::AuthSigner;

/// 公開鍵の環境変数名
pub const ENV_PUBLIC_KEY: &str = "PUBLIC_KEY";
/// 秘密鍵の環境変数名
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
/// エンドポイントURLの環境変数名
pub const ENV_URL_ENDPOINT: &str = "URL_ENDPOINT";

/// デフォルトの待ち受けポート
pub const DEFAULT_PORT: u16 = 3001;
/// デフォルトの認証エンドポイント
pub const DEFAULT_AUTH_PATH: &str = "/imagekit/auth";
/// ヘルスチェックで返すデフォルトのサービス名
pub const DEFAULT_SERVICE_NAME: &str = "ImageKit Authentication Service";

/// 設定エラー型。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 必須の環境変数が未設定または空
    #[error("missing {0}")]
    Missing(&'static str),
    /// 値のパースまたは検証に失敗
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// 環境変数名
        name: &'static str,
        /// 失敗理由
        reason: String,
    },
}

/// レート制限の設定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// ウィンドウあたりの最大リクエスト数
    pub max_requests: u32,
    /// ウィンドウの長さ
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// CORSポリシー。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// CORSヘッダーを付与しない
    Disabled,
    /// 全オリジンを許可
    AllowAll,
    /// 指定オリジンのみ許可（POST/OPTIONS、Content-Typeヘッダーのみ）
    AllowList(Vec<String>),
}

/// サービス設定。
pub struct ServiceConfig {
    /// 公開鍵
    pub public_key: String,
    /// 秘密鍵
    pub private_key: String,
    /// メディアホスティングAPIのエンドポイントURL
    pub url_endpoint: String,
    /// 待ち受けポート
    pub port: u16,
    /// CORS許可オリジン（未設定なら全許可）
    pub allowed_origins: Option<Vec<String>>,
    /// 開発モード（エラーレスポンスに詳細を含める）
    pub development_mode: bool,
    /// CORSレイヤーの有効化
    pub cors_enabled: bool,
    /// レート制限（Noneなら無効）
    pub rate_limit: Option<RateLimitConfig>,
    /// セキュリティヘッダーの付与
    pub security_headers: bool,
    /// 認証エンドポイントのパス
    pub auth_path: String,
    /// 認証エンドポイントをGETでも受け付ける
    pub auth_allow_get: bool,
    /// 未定義ルートに構造化された404を返す
    pub not_found_handler: bool,
    /// ヘルスチェックで返すサービス名
    pub service_name: String,
}

impl ServiceConfig {
    /// `.env` とプロセス環境変数から設定を読み込む。
    ///
    /// `.env` の値は既存の環境変数を上書きしない。
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から設定を構築する。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_key = required(&lookup, ENV_PUBLIC_KEY, "IMAGEKIT_PUBLIC_KEY")?;
        let private_key = required(&lookup, ENV_PRIVATE_KEY, "IMAGEKIT_PRIVATE_KEY")?;
        let url_endpoint = required(&lookup, ENV_URL_ENDPOINT, "IMAGEKIT_URL_ENDPOINT")?;

        let port = match non_empty(&lookup, "PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(ConfigError::Invalid {
                name: "PORT",
                reason: "port must be between 1 and 65535".to_string(),
            });
        }

        let allowed_origins = match non_empty(&lookup, "ALLOWED_ORIGINS") {
            Some(raw) => {
                let origins: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if origins.is_empty() {
                    return Err(ConfigError::Invalid {
                        name: "ALLOWED_ORIGINS",
                        reason: format!("no origin in {raw:?}"),
                    });
                }
                Some(origins)
            }
            None => None,
        };

        let development_mode = non_empty(&lookup, "ENVIRONMENT_MODE")
            .map(|mode| is_development(&mode))
            .unwrap_or(false);

        let rate_limit = if parse_bool(&lookup, "RATE_LIMIT_ENABLED", true)? {
            let defaults = RateLimitConfig::default();
            let max_requests = parse_number(&lookup, "RATE_LIMIT_MAX", defaults.max_requests)?;
            let window_secs =
                parse_number(&lookup, "RATE_LIMIT_WINDOW_SECS", defaults.window.as_secs())?;
            if max_requests == 0 {
                return Err(ConfigError::Invalid {
                    name: "RATE_LIMIT_MAX",
                    reason: "must be greater than 0".to_string(),
                });
            }
            if window_secs == 0 {
                return Err(ConfigError::Invalid {
                    name: "RATE_LIMIT_WINDOW_SECS",
                    reason: "must be greater than 0".to_string(),
                });
            }
            Some(RateLimitConfig {
                max_requests,
                window: Duration::from_secs(window_secs),
            })
        } else {
            None
        };

        let auth_path =
            non_empty(&lookup, "AUTH_PATH").unwrap_or_else(|| DEFAULT_AUTH_PATH.to_string());
        validate_auth_path(&auth_path).map_err(|reason| ConfigError::Invalid {
            name: "AUTH_PATH",
            reason,
        })?;

        Ok(Self {
            public_key,
            private_key,
            url_endpoint,
            port,
            allowed_origins,
            development_mode,
            cors_enabled: parse_bool(&lookup, "CORS_ENABLED", true)?,
            rate_limit,
            security_headers: parse_bool(&lookup, "SECURITY_HEADERS_ENABLED", true)?,
            auth_path,
            auth_allow_get: parse_bool(&lookup, "AUTH_ALLOW_GET", false)?,
            not_found_handler: parse_bool(&lookup, "NOT_FOUND_HANDLER", true)?,
            service_name: non_empty(&lookup, "SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
        })
    }

    /// 有効なCORSポリシー
    pub fn cors_policy(&self) -> CorsPolicy {
        match (&self.allowed_origins, self.cors_enabled) {
            (_, false) => CorsPolicy::Disabled,
            (Some(origins), true) => CorsPolicy::AllowList(origins.clone()),
            (None, true) => CorsPolicy::AllowAll,
        }
    }

    /// 読み込んだ設定をログに出す。鍵は有無のみを出力する。
    pub fn log_summary(&self) {
        tracing::info!(
            public_key = presence(&self.public_key),
            private_key = presence(&self.private_key),
            url_endpoint = %self.url_endpoint,
            "認証情報を読み込みました"
        );
        tracing::info!(
            port = self.port,
            auth_path = %self.auth_path,
            cors = ?self.cors_policy(),
            rate_limit = ?self.rate_limit,
            security_headers = self.security_headers,
            development_mode = self.development_mode,
            "Gateway設定"
        );
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("public_key", &presence(&self.public_key))
            .field("private_key", &presence(&self.private_key))
            .field("url_endpoint", &self.url_endpoint)
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("development_mode", &self.development_mode)
            .field("cors_enabled", &self.cors_enabled)
            .field("rate_limit", &self.rate_limit)
            .field("security_headers", &self.security_headers)
            .field("auth_path", &self.auth_path)
            .field("auth_allow_get", &self.auth_allow_get)
            .field("not_found_handler", &self.not_found_handler)
            .field("service_name", &self.service_name)
            .finish()
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// 認証パラメータ署名器
    pub signer: Box<dyn AuthSigner>,
    /// ヘルスチェックで返すサービス名
    pub service_name: String,
    /// エラーレスポンスに内部エラーの詳細を含めるか
    pub expose_error_details: bool,
}

impl GatewayState {
    /// 設定と署名器から共有状態を構築する。
    pub fn new(config: &ServiceConfig, signer: Box<dyn AuthSigner>) -> Self {
        Self {
            signer,
            service_name: config.service_name.clone(),
            expose_error_details: config.development_mode,
        }
    }
}

fn presence(value: &str) -> &'static str {
    if value.is_empty() {
        "未設定"
    } else {
        "設定済み"
    }
}

fn is_development(mode: &str) -> bool {
    matches!(
        mode.trim().to_ascii_lowercase().as_str(),
        "development" | "dev"
    )
}

/// 認証パスがルーターに静的ルートとして登録できるか検証する。
///
/// `:` `*` で始まるセグメントや `{` `}` はルーター構築時にパニックするため、ここで弾く。
fn validate_auth_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') || path == "/" {
        return Err(format!(
            "must start with '/' and differ from the health route: {path}"
        ));
    }
    if path.contains(['{', '}']) {
        return Err(format!("must not contain route parameters: {path}"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(format!("segments must not start with ':' or '*': {path}"));
    }
    Ok(())
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn required<F>(lookup: &F, name: &'static str, alias: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name)
        .or_else(|| non_empty(lookup, alias))
        .ok_or(ConfigError::Missing(name))
}

fn parse_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup, name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_number<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
