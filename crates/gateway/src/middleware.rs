//! # HTTPミドルウェア
//!
//! CORS、セキュリティヘッダー、ハンドラ内パニックの捕捉。
//! それぞれ設定で個別に有効化される。

use std::any::Any;

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::Method;
use axum::response::Response;
use axum::Router;
use tower_http::catch_panic::ResponseForPanic;
use tower_http::cors::{self, AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CorsPolicy;
use crate::error::GatewayError;

/// 付与するセキュリティヘッダー一覧
const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// セキュリティヘッダーのレイヤーをルーターに重ねる。
///
/// ハンドラが既に設定したヘッダーは上書きしない。
pub fn with_security_headers(mut router: Router) -> Router {
    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        ));
    }
    router
}

/// CORSポリシーに対応するレイヤーを構築する。`Disabled` の場合はNone。
pub fn cors_layer(policy: &CorsPolicy) -> Option<CorsLayer> {
    match policy {
        CorsPolicy::Disabled => None,
        CorsPolicy::AllowAll => Some(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([
                    Method::GET,
                    Method::HEAD,
                    Method::PUT,
                    Method::PATCH,
                    Method::POST,
                    Method::DELETE,
                ])
                .allow_headers(cors::Any),
        ),
        CorsPolicy::AllowList(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!(origin = %origin, error = %e, "不正なオリジンを無視します");
                        None
                    }
                })
                .collect();
            Some(
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE]),
            )
        }
    }
}

/// ハンドラ内のパニックを500レスポンスに変換する。
///
/// パニック自体のログはプロセス全体のパニックフックが出力する。
#[derive(Debug, Clone, Copy)]
pub struct PanicResponder {
    expose_details: bool,
}

impl PanicResponder {
    /// 詳細の公開可否を指定して構築する。
    pub fn new(expose_details: bool) -> Self {
        Self { expose_details }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = axum::body::Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response {
        GatewayError::Internal(crate::supervisor::panic_message(err.as_ref()))
            .into_response_with(self.expose_details)
    }
}
