//! 프레임 오케스트레이터.
//!
//! 소스에서 프레임을 캡처하고 등록된 트리거를 실행한다. 스케줄링 방식:
//! - `run`: 한 번
//! - `run_debounced`: 마지막 호출 후 `delay` 동안 조용하면 한 번
//! - `run_on_interval`: 실행 완료 후 `interval` 대기, 반복
//! - `run_realtime`: 화면 갱신 주기(`RefreshClock`)마다
//! - `auto_run`: 소스 변경 알림마다
//!
//! 루프는 `running` 플래그와 epoch로 협력적으로 종료된다.
//! 새 루프를 시작하면 이전 루프는 다음 확인 시점에 빠져나간다.
//! 실행 중인 틱은 중간에 끊지 않는다.

use framehook_core::config::{ExecutionMode, SchedulerConfig};
use framehook_core::error::CoreError;
use framehook_core::models::source::SourceKind;
use framehook_core::ports::source::SourceAdapter;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::trigger::Trigger;

/// 틱 한 번의 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub frame_num: u64,
    /// 실행된 (활성) 트리거 수
    pub triggers_run: usize,
    pub elapsed: Duration,
}

/// 화면 갱신 주기 시계
///
/// 놓친 틱은 건너뛴다 (밀린 틱을 몰아서 실행하지 않음).
pub struct RefreshClock {
    interval: tokio::time::Interval,
}

impl RefreshClock {
    pub fn new(hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / hz.max(1) as f64);
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// 다음 갱신 시점까지 대기
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// `running`이 false가 될 때까지 대기
async fn until_stopped(running: &mut watch::Receiver<bool>) {
    let _ = running.wait_for(|r| !*r).await;
}

struct PendingDebounce {
    generation: u64,
    cancel: oneshot::Sender<()>,
}

struct Inner {
    source: Arc<dyn SourceAdapter>,
    triggers: RwLock<Vec<Arc<Trigger>>>,
    running: watch::Sender<bool>,
    pending: Mutex<Option<PendingDebounce>>,
    debounce_generation: AtomicU64,
    epoch: AtomicU64,
    frame_counter: AtomicU64,
    mode: RwLock<ExecutionMode>,
    refresh_hz: u32,
}

/// 프레임 오케스트레이터 (복제하면 같은 상태를 공유)
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// 기본 설정(팬아웃, 60Hz)으로 생성
    pub fn new(source: Arc<dyn SourceAdapter>) -> Self {
        Self::with_config(source, &SchedulerConfig::default())
    }

    /// 스케줄러 설정으로 생성
    pub fn with_config(source: Arc<dyn SourceAdapter>, config: &SchedulerConfig) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                source,
                triggers: RwLock::new(Vec::new()),
                running,
                pending: Mutex::new(None),
                debounce_generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                frame_counter: AtomicU64::new(0),
                mode: RwLock::new(config.execution),
                refresh_hz: config.refresh_hz.max(1),
            }),
        }
    }

    pub fn source(&self) -> &Arc<dyn SourceAdapter> {
        &self.inner.source
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        *self.inner.mode.read()
    }

    pub fn set_execution_mode(&self, mode: ExecutionMode) {
        *self.inner.mode.write() = mode;
    }

    // ============================================================
    // 트리거 관리
    // ============================================================

    /// 트리거 등록 (목록 끝에 추가)
    pub fn add_trigger(&self, trigger: Trigger) -> Arc<Trigger> {
        let trigger = Arc::new(trigger);
        debug!("트리거 등록: {} ({})", trigger.id(), trigger.title());
        self.inner.triggers.write().push(trigger.clone());
        trigger
    }

    /// 트리거 제거. 없으면 false.
    pub fn remove_trigger(&self, id: &str) -> bool {
        let mut triggers = self.inner.triggers.write();
        let before = triggers.len();
        triggers.retain(|t| t.id() != id);
        before != triggers.len()
    }

    /// 트리거 활성/비활성. 없으면 false.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        match self.inner.triggers.read().iter().find(|t| t.id() == id) {
            Some(trigger) => {
                trigger.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// 등록된 트리거 스냅샷 (등록 순서)
    pub fn triggers(&self) -> Vec<Arc<Trigger>> {
        self.inner.triggers.read().clone()
    }

    // ============================================================
    // 스케줄링
    // ============================================================

    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    /// 프레임 하나를 캡처해서 활성 트리거 전부 실행
    ///
    /// 캡처 실패(`Configuration`)는 즉시 반환한다. 트리거 콜백 에러는
    /// 모든 트리거가 끝난 뒤 첫 번째 것을 반환한다.
    pub async fn run(&self) -> Result<TickReport, CoreError> {
        let started = Instant::now();
        let frame = self.inner.source.capture_frame()?;
        let frame_num = self.inner.frame_counter.fetch_add(1, Ordering::SeqCst);
        let frame = Arc::new(frame.renumbered(frame_num));

        let triggers: Vec<Arc<Trigger>> = self
            .inner
            .triggers
            .read()
            .iter()
            .filter(|t| t.is_enabled())
            .cloned()
            .collect();

        let results = match self.execution_mode() {
            ExecutionMode::FanOut => join_all(triggers.iter().map(|t| t.run(&frame))).await,
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(triggers.len());
                for trigger in &triggers {
                    results.push(trigger.run(&frame).await);
                }
                results
            }
        };

        let report = TickReport {
            frame_num,
            triggers_run: triggers.len(),
            elapsed: started.elapsed(),
        };
        debug!(
            "틱 #{} 완료: 트리거 {}개, {:?}",
            report.frame_num, report.triggers_run, report.elapsed
        );

        match results.into_iter().find_map(Result::err) {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// 디바운스 실행
    ///
    /// 이전에 예약된 실행을 취소하고 `delay` 뒤로 새로 예약한다.
    /// 연속 호출 묶음마다 실행은 최대 한 번.
    pub fn run_debounced(&self, delay: Duration) -> JoinHandle<()> {
        let generation = self.inner.debounce_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (cancel, mut cancelled) = oneshot::channel();
        let previous = self
            .inner
            .pending
            .lock()
            .replace(PendingDebounce { generation, cancel });
        if let Some(previous) = previous {
            let _ = previous.cancel.send(());
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut cancelled => {
                    debug!("디바운스 #{} 취소", generation);
                    return;
                }
            }

            {
                let mut pending = this.inner.pending.lock();
                if !matches!(pending.as_ref(), Some(p) if p.generation == generation) {
                    return;
                }
                *pending = None;
            }

            this.tick_logged().await;
        })
    }

    /// 고정 간격 반복 (주기 = 실행 시간 + `interval`)
    pub fn run_on_interval(&self, interval: Duration) -> JoinHandle<()> {
        let epoch = self.begin_loop("interval");
        let this = self.clone();
        tokio::spawn(async move {
            let mut running = this.inner.running.subscribe();
            while this.is_current(epoch) {
                this.tick_logged().await;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = until_stopped(&mut running) => {}
                }
            }
            debug!("interval 루프 종료 (epoch {})", epoch);
        })
    }

    /// 화면 갱신 주기마다 반복
    pub fn run_realtime(&self) -> JoinHandle<()> {
        let epoch = self.begin_loop("realtime");
        let this = self.clone();
        tokio::spawn(async move {
            let mut running = this.inner.running.subscribe();
            let mut clock = RefreshClock::new(this.inner.refresh_hz);
            while this.is_current(epoch) {
                this.tick_logged().await;
                tokio::select! {
                    _ = clock.tick() => {}
                    _ = until_stopped(&mut running) => {}
                }
            }
            debug!("realtime 루프 종료 (epoch {})", epoch);
        })
    }

    /// 소스 변경 알림마다 실행
    ///
    /// 정지 이미지는 로드될 때마다, 비디오는 새 프레임이 디코딩될 때마다.
    /// 틱 실행 중에 들어온 알림은 하나로 합쳐진다. 변경 신호가 없는
    /// 그리기 표면은 한 번만 실행한다.
    pub fn auto_run(&self) -> JoinHandle<()> {
        let source = self.inner.source.clone();
        let changes = match source.kind() {
            SourceKind::StillImage | SourceKind::LiveVideo => source.subscribe_changes(),
            _ => None,
        };

        let Some(mut changes) = changes else {
            warn!(
                "소스 {}에는 변경 신호가 없음: 한 번만 실행. 반복하려면 debounced 또는 interval 방식 사용",
                source.kind()
            );
            let this = self.clone();
            return tokio::spawn(async move { this.tick_logged().await });
        };

        let epoch = self.begin_loop("auto");
        let this = self.clone();
        tokio::spawn(async move {
            let mut running = this.inner.running.subscribe();
            changes.borrow_and_update();
            if source.dimensions().is_some() {
                this.tick_logged().await;
            }

            while this.is_current(epoch) {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = until_stopped(&mut running) => break,
                }
                if !this.is_current(epoch) {
                    break;
                }
                changes.borrow_and_update();
                this.tick_logged().await;
            }
            debug!("auto 루프 종료 (epoch {})", epoch);
        })
    }

    /// 루프 중지 및 예약된 디바운스 취소
    ///
    /// 실행 중인 틱은 끝까지 수행되고, 이후 새 틱은 예약되지 않는다.
    pub fn stop(&self) {
        let was_running = self.inner.running.send_replace(false);
        if let Some(pending) = self.inner.pending.lock().take() {
            let _ = pending.cancel.send(());
        }
        if was_running {
            info!("오케스트레이터 중지");
        }
    }

    fn begin_loop(&self, discipline: &str) -> u64 {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.running.send_replace(true);
        info!("{} 루프 시작 (epoch {})", discipline, epoch);
        epoch
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.is_running() && self.inner.epoch.load(Ordering::SeqCst) == epoch
    }

    /// 루프용 실행: 에러는 로그만 남기고 다음 틱에 재시도
    async fn tick_logged(&self) {
        match self.run().await {
            Ok(_) => {}
            Err(e) if e.is_configuration() => {
                warn!("틱 건너뜀: {}", e);
            }
            Err(e) => {
                warn!("트리거 콜백 실패: {}", e);
            }
        }
    }
}
