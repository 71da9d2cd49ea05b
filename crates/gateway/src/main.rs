//! # Upload Auth Gateway
//!
//! ## 起動シーケンス
//! 1. 環境変数（および `.env`）から設定を読み込む。不足していれば終了コード1
//! 2. 署名器を構築する。構築できなければ終了コード1
//! 3. ルーターを構築し、監視付きタスクとしてHTTPサーバーを起動
//! 4. Ctrl+C / SIGTERM で正常終了

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use upauth_crypto::ImageKitSigner;
use upauth_gateway::supervisor;
use upauth_gateway::{build_router, GatewayState, RateLimiter, ServiceConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    supervisor::install_panic_hook();

    // Step 1: 設定の読み込み
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "必須の設定が不足しています。起動を中止します");
            return ExitCode::FAILURE;
        }
    };
    config.log_summary();

    // Step 2: 署名器の構築
    let signer = match ImageKitSigner::new(
        config.public_key.clone(),
        config.private_key.clone(),
        config.url_endpoint.clone(),
    ) {
        Ok(signer) => signer,
        Err(e) => {
            tracing::error!(error = %e, "署名器を初期化できません。起動を中止します");
            return ExitCode::FAILURE;
        }
    };

    // Step 3: ルーター構築とサーバー起動
    let state = Arc::new(GatewayState::new(&config, Box::new(signer)));
    let limiter = config.rate_limit.map(|rl| Arc::new(RateLimiter::new(rl)));
    if let Some(limiter) = &limiter {
        supervisor::spawn_background("rate-limit-sweeper", limiter.clone().run_sweeper());
    }
    let app = build_router(&config, state, limiter);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    supervisor::supervise(serve(addr, app)).await.into()
}

async fn serve(addr: SocketAddr, app: axum::Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("{addr} へのバインドに失敗しました"))?;
    tracing::info!(port = addr.port(), "サーバーを起動しました");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("サーバーエラー")?;

    Ok(())
}

/// Ctrl+C または SIGTERM を待つ。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+Cハンドラを設定できません");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERMハンドラを設定できません");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+Cを受信しました。停止します"),
        _ = terminate => tracing::info!("SIGTERMを受信しました。停止します"),
    }
}
