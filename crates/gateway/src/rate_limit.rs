//! # クライアント単位のレート制限
//!
//! クライアント（接続元IP）ごとに固定ウィンドウでリクエスト数を数える。
//! ウィンドウが切れたエントリは次のリクエスト時にリセットされ、
//! 定期スイープでテーブルから取り除かれる。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::GatewayError;

/// 制限超過時にクライアントへ返すメッセージ
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// 接続元が特定できないリクエストに使うキー
const UNKNOWN_CLIENT: &str = "unknown";

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// 現在のウィンドウにおけるクライアントの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// ウィンドウあたりの上限
    pub limit: u32,
    /// 残りリクエスト数
    pub remaining: u32,
    /// ウィンドウがリセットされるまでの時間
    pub reset_after: Duration,
}

/// レート制限の判定結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// 許可
    Allowed(RateLimitStatus),
    /// 拒否
    Denied(RateLimitStatus),
}

impl RateLimitDecision {
    /// 判定に付随する状態
    pub fn status(&self) -> &RateLimitStatus {
        match self {
            RateLimitDecision::Allowed(s) | RateLimitDecision::Denied(s) => s,
        }
    }
}

#[derive(Debug)]
struct ClientWindow {
    count: u32,
    window_start: Instant,
}

/// 固定ウィンドウ方式のレートリミッタ。
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl RateLimiter {
    /// 設定からレートリミッタを構築する。
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// 設定
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// リクエストを1件数え、許可するかどうかを判定する。
    ///
    /// 判定とカウントの更新はロック内で一度に行われる。
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        let window = clients
            .entry(client.to_string())
            .or_insert(ClientWindow {
                count: 0,
                window_start: now,
            });

        if now.duration_since(window.window_start) >= self.config.window {
            window.count = 0;
            window.window_start = now;
        }

        let reset_after = self
            .config
            .window
            .saturating_sub(now.duration_since(window.window_start));
        let limit = self.config.max_requests;

        if window.count >= limit {
            return RateLimitDecision::Denied(RateLimitStatus {
                limit,
                remaining: 0,
                reset_after,
            });
        }

        window.count += 1;
        RateLimitDecision::Allowed(RateLimitStatus {
            limit,
            remaining: limit - window.count,
            reset_after,
        })
    }

    /// ウィンドウが切れたエントリを削除し、削除件数を返す。
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, w| now.duration_since(w.window_start) < self.config.window);
        before - clients.len()
    }

    /// 追跡中のクライアント数
    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// ウィンドウ長ごとに期限切れエントリを掃除し続ける。
    pub async fn run_sweeper(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.window);
        // 初回のtickは即時に完了する
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = self.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "期限切れのレート制限エントリを削除しました");
            }
        }
    }
}

/// リクエストからクライアント識別子（接続元IP）を取り出す。
pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// レート制限ミドルウェア。
///
/// 通過したレスポンスにも拒否レスポンスにも `RateLimit-*` ヘッダーを付与する。
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match limiter.check(&client).await {
        RateLimitDecision::Allowed(status) => {
            let mut response = next.run(request).await;
            apply_headers(response.headers_mut(), &status);
            response
        }
        RateLimitDecision::Denied(status) => {
            tracing::warn!(
                client = %client,
                path = %request.uri().path(),
                "レート制限を超過しました"
            );
            let mut response =
                GatewayError::RateLimited(RATE_LIMIT_MESSAGE.to_string()).into_response();
            let headers = response.headers_mut();
            apply_headers(headers, &status);
            headers.insert(RETRY_AFTER, HeaderValue::from(reset_secs(&status)));
            response
        }
    }
}

fn apply_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs(status)));
}

/// リセットまでの秒数（切り上げ）
fn reset_secs(status: &RateLimitStatus) -> u64 {
    let d = status.reset_after;
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
