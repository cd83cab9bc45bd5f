//! 라이프사이클 관리.
//!
//! OS 종료 시그널을 기다리고, 종료 요청을 구독자에게 알린다.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// `LifecycleManager::shutdown` 호출
    Requested,
}

/// 라이프사이클 관리자
///
/// 종료 플래그 하나를 `watch` 채널로 공유한다. 플래그는 한 번 켜지면 꺼지지 않는다.
pub struct LifecycleManager {
    flag: watch::Sender<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            flag: watch::Sender::new(false),
        }
    }

    /// 종료 플래그 구독
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }

    /// 종료 요청. 처음 호출할 때만 기록한다.
    pub fn shutdown(&self) {
        let already = self.flag.send_replace(true);
        if !already {
            info!("종료 요청");
        }
    }

    /// 종료 시그널 또는 `shutdown()` 호출까지 대기
    pub async fn wait_for_signal(&self) -> Result<ShutdownReason> {
        let requested = self.requested();
        let reason = os_signal_or(requested).await?;
        info!(?reason, "종료 시작");
        self.shutdown();
        Ok(reason)
    }

    fn requested(&self) -> impl std::future::Future<Output = ()> + 'static {
        let mut rx = self.subscribe();
        async move {
            let _ = rx.wait_for(|stop| *stop).await;
        }
    }
}

#[cfg(unix)]
async fn os_signal_or(requested: impl std::future::Future<Output = ()>) -> Result<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).context("SIGINT 핸들러 등록 실패")?;
    let mut terminate = signal(SignalKind::terminate()).context("SIGTERM 핸들러 등록 실패")?;

    Ok(tokio::select! {
        _ = interrupt.recv() => ShutdownReason::Interrupt,
        _ = terminate.recv() => ShutdownReason::Terminate,
        _ = requested => ShutdownReason::Requested,
    })
}

#[cfg(not(unix))]
async fn os_signal_or(requested: impl std::future::Future<Output = ()>) -> Result<ShutdownReason> {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Ctrl+C 핸들러 등록 실패")?;
            Ok(ShutdownReason::Interrupt)
        }
        _ = requested => Ok(ShutdownReason::Requested),
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn starts_not_shutting_down() {
        let lm = LifecycleManager::default();
        assert!(!*lm.subscribe().borrow());
    }

    #[test]
    fn shutdown_is_sticky_and_visible_to_late_subscribers() {
        let lm = LifecycleManager::new();
        let early = lm.subscribe();
        lm.shutdown();
        lm.shutdown();
        assert!(*early.borrow());
        assert!(*lm.subscribe().borrow());
    }

    #[tokio::test]
    async fn manual_shutdown_ends_wait_with_requested() {
        let lm = Arc::new(LifecycleManager::new());
        let waiter = tokio::spawn({
            let lm = lm.clone();
            async move { lm.wait_for_signal().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        lm.shutdown();

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("대기가 끝나야 함")
            .unwrap()
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }

    #[tokio::test]
    async fn wait_after_shutdown_returns_immediately() {
        let lm = LifecycleManager::new();
        lm.shutdown();
        let reason = tokio::time::timeout(Duration::from_millis(200), lm.wait_for_signal())
            .await
            .expect("이미 종료 요청됨")
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }
}
