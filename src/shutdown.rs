//! 关闭信号
//!
//! Ctrl+C / SIGTERM 触发同一个 CancellationToken；会话把它绑定到每一轮，
//! 进行中的调用随之取消，调用方拿到已到达的结果后正常退出。

use tokio_util::sync::CancellationToken;

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// 进程级关闭信号
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 供会话绑定的子 token：关闭时一并取消，单独取消不影响进程
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn trigger(&self, reason: ShutdownReason) {
        tracing::info!(?reason, "Shutdown requested, cancelling pending searches");
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                signal.trigger(ShutdownReason::Interrupt);
            }
        });

        #[cfg(unix)]
        {
            let signal = self.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal as unix_signal, SignalKind};
                if let Ok(mut sigterm) = unix_signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    signal.trigger(ShutdownReason::Terminate);
                }
            });
        }
    }
}
