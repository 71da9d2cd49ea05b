//! # プロセス監視
//!
//! サーバー本体を監視付きタスクとして実行し、終了理由を終了コードに変換する。
//!
//! - サーバータスクのエラー・パニック: 致命的。ログを出して終了コード1
//! - バックグラウンドタスクのパニック: 非致命的。ログのみで継続
//! - ハンドラ内のパニック: リクエスト単位で500に変換（`middleware::PanicResponder`）

use std::any::Any;
use std::future::Future;
use std::process::ExitCode;

/// サーバーの終了理由。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// シグナル受信等による正常終了
    Graceful,
    /// 致命的エラーによる終了
    Fatal(String),
}

impl From<Shutdown> for ExitCode {
    fn from(value: Shutdown) -> Self {
        match value {
            Shutdown::Graceful => ExitCode::SUCCESS,
            Shutdown::Fatal(_) => ExitCode::FAILURE,
        }
    }
}

/// 全パニックをtracing経由で記録するフックを設定する。
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let message = panic_message(info.payload());
        tracing::error!(%location, %message, "パニックが発生しました");
    }));
}

/// パニックのペイロードからメッセージを取り出す。
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// サーバー本体を監視付きで実行し、終了理由を返す。
pub async fn supervise<F>(server: F) -> Shutdown
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    match tokio::spawn(server).await {
        Ok(Ok(())) => {
            tracing::info!("サーバーを停止しました");
            Shutdown::Graceful
        }
        Ok(Err(e)) => {
            let reason = format!("{e:#}");
            tracing::error!(error = %reason, "サーバーが致命的エラーで停止しました");
            Shutdown::Fatal(reason)
        }
        Err(e) if e.is_panic() => {
            let reason = panic_message(e.into_panic().as_ref());
            tracing::error!(error = %reason, "サーバータスクがパニックで停止しました");
            Shutdown::Fatal(reason)
        }
        Err(e) => {
            tracing::error!(error = %e, "サーバータスクが中断されました");
            Shutdown::Fatal(e.to_string())
        }
    }
}

/// バックグラウンドタスクを起動する。パニックしてもプロセスは継続する。
pub fn spawn_background<F>(name: &'static str, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(task);
    tokio::spawn(async move {
        match handle.await {
            Ok(()) => tracing::debug!(task = name, "バックグラウンドタスクが終了しました"),
            Err(e) if e.is_panic() => {
                tracing::error!(task = name, "バックグラウンドタスクがパニックしました（継続します）")
            }
            Err(_) => {}
        }
    });
}
