//! # Upload Auth Gateway
//!
//! メディアホスティングAPIへの直接アップロード用に、
//! 短命な署名付き認証パラメータを発行するHTTPサービス。
//!
//! ## 役割
//! - 起動時の設定読み込みと検証（不足時は即終了）
//! - 署名器の呼び出しによる認証パラメータの発行
//! - CORS・レート制限・セキュリティヘッダー（設定で個別に有効化）
//!
//! ## API エンドポイント
//! - `GET /` — 死活監視
//! - `POST /imagekit/auth` — 認証パラメータ発行（パスは設定可能）

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod relay;
pub mod supervisor;

pub use config::{ConfigError, CorsPolicy, GatewayState, RateLimitConfig, ServiceConfig};
pub use error::GatewayError;
pub use rate_limit::RateLimiter;

/// リクエストボディの上限（バイト）
pub const MAX_BODY_BYTES: usize = 100 * 1024;

/// 設定に従ってルーターを構築する。
///
/// `limiter` がNoneの場合はレート制限を行わない。
pub fn build_router(
    config: &ServiceConfig,
    state: Arc<GatewayState>,
    limiter: Option<Arc<RateLimiter>>,
) -> Router {
    let auth_route = if config.auth_allow_get {
        post(endpoints::handle_auth).get(endpoints::handle_auth)
    } else {
        post(endpoints::handle_auth)
    };

    let mut routes = Router::new()
        .route("/", get(endpoints::handle_health))
        .route(&config.auth_path, auth_route);
    if config.not_found_handler {
        routes = routes.fallback(endpoints::handle_not_found);
    }

    // パニック捕捉は外側のレイヤーより内側（500にもヘッダーが付く）
    let mut router = routes
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(middleware::PanicResponder::new(
            config.development_mode,
        )));

    if let Some(limiter) = limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit_middleware,
        ));
    }
    if let Some(cors) = middleware::cors_layer(&config.cors_policy()) {
        router = router.layer(cors);
    }
    if config.security_headers {
        router = middleware::with_security_headers(router);
    }

    router.layer(TraceLayer::new_for_http())
}
