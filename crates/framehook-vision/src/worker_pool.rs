//! 인식 워커 풀.
//!
//! 워커마다 전용 OS 스레드를 띄우고, 각 스레드 안에서 `WorkerFactory::create`로
//! 독립적으로 초기화한다. 초기화에 실패한 워커는 로그만 남기고 영구 제외된다.
//!
//! 작업 분배는 `Dispatch` 하나가 담당한다:
//! - 유휴 워커가 있으면 즉시 배정
//! - 없으면 FIFO 큐 뒤에 추가 (상한 없음)
//! - 작업을 끝낸 워커는 큐 맨 앞 작업을 가져가거나 유휴 목록으로 돌아간다
//!
//! 호출자는 각자 oneshot 응답을 기다린다. 타임아웃은 없다.
//! 작업 중 패닉한 워커는 `Failed`로 바뀌고 더 이상 배정되지 않는다.

use framehook_core::config::WorkerPoolConfig;
use framehook_core::error::CoreError;
use framehook_core::models::recognition::WorkerState;
use framehook_core::ports::recognizer::WorkerFactory;
use image::RgbaImage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const POOL_CLOSED: &str = "pool closed";

type Reply = oneshot::Sender<Result<String, CoreError>>;

struct Job {
    image: RgbaImage,
    reply: Reply,
}

#[derive(Default)]
struct Dispatch {
    /// 준비된 워커의 작업 채널 (인덱스 = 워커 번호, 실패한 워커는 None)
    senders: Vec<Option<mpsc::UnboundedSender<Job>>>,
    states: Vec<WorkerState>,
    idle: VecDeque<usize>,
    queue: VecDeque<Job>,
    closed: bool,
}

impl Dispatch {
    /// 작업 배정: 유휴 워커 → 즉시, 없으면 큐
    fn assign(&mut self, job: Job) {
        if self.closed {
            let _ = job.reply.send(Err(closed_error()));
            return;
        }
        if self.live() == 0 {
            let _ = job.reply.send(Err(no_workers_error()));
            return;
        }
        match self.idle.pop_front() {
            Some(index) => self.send_to(index, job),
            None => self.queue.push_back(job),
        }
    }

    /// 작업을 끝낸 워커 반환
    fn release(&mut self, index: usize) {
        if self.closed {
            return;
        }
        match self.queue.pop_front() {
            Some(job) => self.send_to(index, job),
            None => self.idle.push_back(index),
        }
    }

    /// 워커 영구 제외. 남은 워커가 없으면 큐의 작업을 모두 실패 처리한다.
    fn retire(&mut self, index: usize) {
        if let Some(sender) = self.senders.get_mut(index) {
            *sender = None;
        }
        if let Some(state) = self.states.get_mut(index) {
            *state = WorkerState::Failed;
        }
        self.idle.retain(|i| *i != index);
        if self.live() == 0 {
            for job in self.queue.drain(..) {
                let _ = job.reply.send(Err(no_workers_error()));
            }
        }
    }

    /// 작업을 받을 수 있는 워커 수
    fn live(&self) -> usize {
        self.senders.iter().flatten().count()
    }

    fn send_to(&mut self, index: usize, job: Job) {
        let Some(sender) = self.senders.get(index).and_then(Option::as_ref) else {
            let _ = job.reply.send(Err(CoreError::Internal(format!(
                "워커 #{index} 채널 없음"
            ))));
            return;
        };
        if let Err(mpsc::error::SendError(job)) = sender.send(job) {
            // 스레드가 사라진 워커는 다시 배정하지 않는다
            warn!("워커 #{} 종료됨, 작업 실패 처리", index);
            self.senders[index] = None;
            let _ = job
                .reply
                .send(Err(CoreError::Recognition(format!("워커 #{index} 종료됨"))));
        }
    }
}

fn closed_error() -> CoreError {
    CoreError::Recognition(POOL_CLOSED.to_string())
}

fn no_workers_error() -> CoreError {
    CoreError::Recognition("남은 워커 없음".to_string())
}

/// 인식 워커 풀
pub struct WorkerPool {
    engine: String,
    requested: usize,
    dispatch: Arc<Mutex<Dispatch>>,
}

impl WorkerPool {
    /// 워커 `config.num_workers`개를 띄우고 모두 초기화를 마칠 때까지 대기
    ///
    /// 일부가 실패하면 풀이 요청보다 작아질 뿐이다. 전부 실패하면
    /// `CoreError::WorkerPoolEmpty`.
    pub async fn initialize(
        config: WorkerPoolConfig,
        factory: Arc<dyn WorkerFactory>,
    ) -> Result<Arc<Self>, CoreError> {
        let requested = config.num_workers;
        if requested == 0 {
            return Err(CoreError::Configuration(
                "workers.num_workers는 1 이상이어야 함".to_string(),
            ));
        }

        let engine = factory.engine_name().to_string();
        info!("워커 풀 초기화 시작: {} x{}", engine, requested);

        let dispatch = Arc::new(Mutex::new(Dispatch::default()));
        let mut pending = Vec::with_capacity(requested);

        for index in 0..requested {
            let (job_tx, job_rx) = mpsc::unbounded_channel::<Job>();
            let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CoreError>>();
            let factory = factory.clone();
            let config = config.clone();
            let dispatch = dispatch.clone();

            let spawned = thread::Builder::new()
                .name(format!("framehook-worker-{index}"))
                .spawn(move || run_worker(index, factory, config, ready_tx, job_rx, dispatch));

            match spawned {
                Ok(_) => pending.push((index, job_tx, ready_rx)),
                Err(e) => {
                    warn!("워커 #{} 스레드 생성 실패: {}", index, e);
                }
            }
        }

        let mut states = vec![WorkerState::Failed; requested];
        let mut senders: Vec<Option<mpsc::UnboundedSender<Job>>> = vec![None; requested];
        let mut ready = Vec::new();

        for (index, job_tx, ready_rx) in pending {
            let outcome = ready_rx.await.unwrap_or_else(|_| {
                Err(CoreError::WorkerInit {
                    index,
                    message: "초기화 중 워커 스레드 종료".to_string(),
                })
            });
            match outcome {
                Ok(()) => {
                    states[index] = WorkerState::Ready;
                    senders[index] = Some(job_tx);
                    ready.push(index);
                }
                Err(e) => warn!("워커 제외: {}", e),
            }
        }

        if ready.is_empty() {
            return Err(CoreError::WorkerPoolEmpty { requested });
        }

        {
            let mut dispatch = dispatch.lock();
            dispatch.senders = senders;
            dispatch.states = states;
            dispatch.idle = ready.iter().copied().collect();
        }

        info!("워커 풀 준비 완료: {}/{}", ready.len(), requested);

        Ok(Arc::new(Self {
            engine,
            requested,
            dispatch,
        }))
    }

    /// 인식 작업 제출 후 결과 대기
    pub async fn submit(&self, image: RgbaImage) -> Result<String, CoreError> {
        let (reply, result) = oneshot::channel();
        self.dispatch.lock().assign(Job { image, reply });
        result
            .await
            .map_err(|_| CoreError::Recognition("워커가 응답 없이 종료됨".to_string()))?
    }

    /// 준비된 워커 수
    pub fn size(&self) -> usize {
        self.dispatch
            .lock()
            .states
            .iter()
            .filter(|s| **s == WorkerState::Ready)
            .count()
    }

    /// 요청한 워커 수
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn idle_count(&self) -> usize {
        self.dispatch.lock().idle.len()
    }

    /// 대기 중인 작업 수
    pub fn queued(&self) -> usize {
        self.dispatch.lock().queue.len()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.dispatch.lock().states.clone()
    }

    pub fn engine_name(&self) -> &str {
        &self.engine
    }

    /// 풀 종료
    ///
    /// 실행 중인 작업은 끝까지 수행되고, 큐에 남은 작업과 이후 제출은
    /// `Recognition("pool closed")`로 응답한다.
    pub fn shutdown(&self) {
        let mut dispatch = self.dispatch.lock();
        if dispatch.closed {
            return;
        }
        dispatch.closed = true;
        dispatch.senders.clear();
        dispatch.idle.clear();
        let dropped = dispatch.queue.len();
        for job in dispatch.queue.drain(..) {
            let _ = job.reply.send(Err(closed_error()));
        }
        info!("워커 풀 종료 (대기 작업 {}개 취소)", dropped);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    index: usize,
    factory: Arc<dyn WorkerFactory>,
    config: WorkerPoolConfig,
    ready: oneshot::Sender<Result<(), CoreError>>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    dispatch: Arc<Mutex<Dispatch>>,
) {
    let mut worker = match factory.create(index, &config) {
        Ok(worker) => worker,
        Err(e) => {
            let e = match e {
                e @ CoreError::WorkerInit { .. } => e,
                other => CoreError::WorkerInit {
                    index,
                    message: other.to_string(),
                },
            };
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    debug!("워커 #{} 대기 시작", index);

    while let Some(job) = jobs.blocking_recv() {
        let Job { image, reply } = job;
        match panic::catch_unwind(AssertUnwindSafe(|| worker.recognize(&image))) {
            Ok(result) => {
                if let Err(e) = &result {
                    debug!("워커 #{} 인식 실패: {}", index, e);
                }
                dispatch.lock().release(index);
                let _ = reply.send(result);
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!("워커 #{} 패닉, 풀에서 제외: {}", index, reason);
                dispatch.lock().retire(index);
                let _ = reply.send(Err(CoreError::Recognition(format!(
                    "워커 #{index} 패닉: {reason}"
                ))));
                return;
            }
        }
    }

    debug!("워커 #{} 종료", index);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "알 수 없는 패닉".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use framehook_core::ports::recognizer::RecognitionWorker;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// 열림 신호가 올 때까지 막혀 있는 가짜 워커
    #[derive(Default, Clone)]
    struct Gauge {
        open: Arc<AtomicBool>,
        started: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    struct GatedWorker {
        gauge: Gauge,
    }

    impl RecognitionWorker for GatedWorker {
        fn recognize(&mut self, image: &RgbaImage) -> Result<String, CoreError> {
            let p = &self.gauge;
            p.started.fetch_add(1, Ordering::SeqCst);
            let now = p.active.fetch_add(1, Ordering::SeqCst) + 1;
            p.max_active.fetch_max(now, Ordering::SeqCst);
            while !p.open.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            p.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("{}x{}", image.width(), image.height()))
        }
    }

    struct GatedFactory {
        fail: Vec<usize>,
        gauge: Gauge,
    }

    impl WorkerFactory for GatedFactory {
        fn create(
            &self,
            index: usize,
            _config: &WorkerPoolConfig,
        ) -> Result<Box<dyn RecognitionWorker>, CoreError> {
            if self.fail.contains(&index) {
                return Err(CoreError::Internal("traineddata 없음".to_string()));
            }
            Ok(Box::new(GatedWorker {
                gauge: self.gauge.clone(),
            }))
        }

        fn engine_name(&self) -> &str {
            "gated"
        }
    }

    fn config(n: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            num_workers: n,
            ..WorkerPoolConfig::default()
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("조건 대기 시간 초과");
    }

    #[tokio::test]
    async fn failed_worker_is_excluded() {
        let gauge = Gauge::default();
        let factory = Arc::new(GatedFactory {
            fail: vec![1],
            gauge: gauge.clone(),
        });
        let pool = WorkerPool::initialize(config(3), factory).await.unwrap();

        assert_eq!(pool.size(), 2);
        assert_eq!(pool.requested(), 3);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(
            pool.worker_states(),
            vec![WorkerState::Ready, WorkerState::Failed, WorkerState::Ready]
        );
        assert_eq!(pool.engine_name(), "gated");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn third_job_queues_until_worker_frees() {
        let gauge = Gauge::default();
        let factory = Arc::new(GatedFactory {
            fail: vec![1],
            gauge: gauge.clone(),
        });
        let pool = WorkerPool::initialize(config(3), factory).await.unwrap();

        let handles: Vec<_> = (1..=3)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.submit(RgbaImage::new(i, i)).await })
            })
            .collect();

        wait_until(|| gauge.started.load(Ordering::SeqCst) == 2).await;
        wait_until(|| pool.queued() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gauge.started.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 0);

        gauge.open.store(true, Ordering::SeqCst);
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(results, vec!["1x1", "2x2", "3x3"]);
        assert_eq!(gauge.started.load(Ordering::SeqCst), 3);
        assert_eq!(gauge.max_active.load(Ordering::SeqCst), 2);
        assert_eq!(pool.queued(), 0);
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test]
    async fn all_workers_failing_is_an_error() {
        let factory = Arc::new(GatedFactory {
            fail: vec![0, 1],
            gauge: Gauge::default(),
        });
        let result = WorkerPool::initialize(config(2), factory).await;
        assert_matches!(result.err(), Some(CoreError::WorkerPoolEmpty { requested: 2 }));
    }

    #[tokio::test]
    async fn zero_workers_is_configuration_error() {
        let factory = Arc::new(GatedFactory {
            fail: vec![],
            gauge: Gauge::default(),
        });
        let result = WorkerPool::initialize(config(0), factory).await;
        assert_matches!(result.err(), Some(CoreError::Configuration(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_answers_queued_jobs() {
        let gauge = Gauge::default();
        let factory = Arc::new(GatedFactory {
            fail: vec![],
            gauge: gauge.clone(),
        });
        let pool = WorkerPool::initialize(config(1), factory).await.unwrap();

        let running = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.submit(RgbaImage::new(4, 4)).await })
        };
        wait_until(|| gauge.started.load(Ordering::SeqCst) == 1).await;

        let queued = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.submit(RgbaImage::new(8, 8)).await })
        };
        wait_until(|| pool.queued() == 1).await;

        pool.shutdown();
        assert_matches!(
            queued.await.unwrap(),
            Err(CoreError::Recognition(msg)) if msg == POOL_CLOSED
        );

        // 실행 중이던 작업은 끝까지 수행
        gauge.open.store(true, Ordering::SeqCst);
        assert_eq!(running.await.unwrap().unwrap(), "4x4");

        assert_matches!(
            pool.submit(RgbaImage::new(1, 1)).await,
            Err(CoreError::Recognition(_))
        );
    }

    /// 폭이 13인 이미지를 받으면 패닉하는 워커
    struct FragileWorker;

    impl RecognitionWorker for FragileWorker {
        fn recognize(&mut self, image: &RgbaImage) -> Result<String, CoreError> {
            if image.width() == 13 {
                panic!("손상된 입력");
            }
            Ok(image.width().to_string())
        }
    }

    struct FragileFactory;

    impl WorkerFactory for FragileFactory {
        fn create(
            &self,
            _index: usize,
            _config: &WorkerPoolConfig,
        ) -> Result<Box<dyn RecognitionWorker>, CoreError> {
            Ok(Box::new(FragileWorker))
        }

        fn engine_name(&self) -> &str {
            "fragile"
        }
    }

    #[tokio::test]
    async fn panicking_worker_is_retired() {
        let pool = WorkerPool::initialize(config(2), Arc::new(FragileFactory))
            .await
            .unwrap();

        assert_matches!(
            pool.submit(RgbaImage::new(13, 1)).await,
            Err(CoreError::Recognition(msg)) if msg.contains("손상된 입력")
        );
        assert_eq!(pool.size(), 1);
        assert_eq!(
            pool.worker_states()
                .iter()
                .filter(|s| **s == WorkerState::Failed)
                .count(),
            1
        );
        assert_eq!(pool.idle_count(), 1);

        // 남은 워커가 계속 작업을 받는다
        for _ in 0..3 {
            assert_eq!(pool.submit(RgbaImage::new(5, 1)).await.unwrap(), "5");
        }
    }

    #[tokio::test]
    async fn last_worker_panic_fails_later_jobs_immediately() {
        let pool = WorkerPool::initialize(config(1), Arc::new(FragileFactory))
            .await
            .unwrap();

        assert!(pool.submit(RgbaImage::new(13, 1)).await.is_err());
        assert_eq!(pool.size(), 0);

        let next = tokio::time::timeout(Duration::from_secs(1), pool.submit(RgbaImage::new(2, 2)))
            .await
            .expect("작업이 멈춰 있으면 안 됨");
        assert_matches!(next, Err(CoreError::Recognition(_)));
    }
}
