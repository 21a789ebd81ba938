//! 파이프라인 오케스트레이션 -- 수신/분류/팬아웃의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](hooklog_core::pipeline::Pipeline) trait을 구현하여
//! `hooklog-daemon`에서 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! DatagramReceiver -> Dispatcher -+-> SharedRingBuffer
//!                                 +-> mpsc -> StoreWriter -> LogStore
//!                                 +-> BroadcastHub -> Subscription*
//! ```
//!
//! # 정지 순서
//! 1. 취소 토큰으로 수신 루프와 통계 보고 태스크를 멈춤
//! 2. 영속화 큐 송신측 분리
//! 3. 쓰기 워커가 큐에 남은 레코드를 저장하고 종료할 때까지 대기

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hooklog_core::error::{HooklogError, PipelineError};
use hooklog_core::pipeline::{HealthStatus, Pipeline};

use crate::buffer::SharedRingBuffer;
use crate::classifier::Classifier;
use crate::collector::{DatagramReceiver, ReceiverSnapshot, ReceiverStats, report_stats};
use crate::config::PipelineConfig;
use crate::dispatch::Dispatcher;
use crate::error::LogPipelineError;
use crate::hub::BroadcastHub;
use crate::query::QueryService;
use crate::store::{LogStore, PersistStats, StoreWriter};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 파이프라인 -- 수신/분류/버퍼/영속화/브로드캐스트의 전체 흐름을 관리합니다.
///
/// # 사용 예시
/// ```ignore
/// use hooklog_pipeline::LogPipelineBuilder;
///
/// let (mut pipeline, query) = LogPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.start().await?;
/// let recent = query.request_recent();
/// ```
pub struct LogPipeline {
    config: PipelineConfig,
    state: PipelineState,
    dispatcher: Arc<Dispatcher>,
    store: Arc<LogStore>,
    buffer: SharedRingBuffer,
    hub: BroadcastHub,
    receiver_stats: Arc<ReceiverStats>,
    persist_stats: Arc<PersistStats>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl LogPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 실행 중이면 수신기가 실제로 바인드된 주소를 반환합니다.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 수신기 카운터 스냅샷을 반환합니다.
    pub fn receiver_stats(&self) -> ReceiverSnapshot {
        self.receiver_stats.snapshot()
    }

    /// 영속화 통계를 반환합니다.
    pub fn persist_stats(&self) -> &PersistStats {
        &self.persist_stats
    }

    /// 현재 링 버퍼 크기를 반환합니다.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// 연결된 구독자 수를 반환합니다.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// 디스패처에 전달된 레코드 수를 반환합니다.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatcher.dispatched_count()
    }

    async fn start_inner(&mut self) -> Result<(), LogPipelineError> {
        let cancel = CancellationToken::new();

        let (persist_tx, persist_rx) = mpsc::channel(self.config.queue_capacity);
        self.dispatcher.attach_persistence(persist_tx);
        let writer = StoreWriter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.persist_stats),
            self.config.max_records,
            self.config.prune_every,
        )
        .spawn(persist_rx);

        if self.config.receiver_enabled {
            let bound = DatagramReceiver::bind(
                &self.config.bind,
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.receiver_stats),
                self.config.max_datagram_size,
            )
            .await
            .and_then(|receiver| {
                let addr = receiver.local_addr()?;
                Ok((receiver, addr))
            });

            let receiver = match bound {
                Ok((receiver, addr)) => {
                    self.local_addr = Some(addr);
                    receiver
                }
                Err(e) => {
                    // 쓰기 워커를 정리한 뒤 에러 반환
                    self.dispatcher.detach_persistence();
                    if let Err(join) = writer.await {
                        tracing::warn!(error = %join, "store writer task failed");
                    }
                    return Err(e);
                }
            };

            self.tasks.push(tokio::spawn(receiver.run(cancel.child_token())));
            self.tasks.push(tokio::spawn(report_stats(
                Arc::clone(&self.receiver_stats),
                Duration::from_secs(self.config.stats_interval_secs),
                cancel.child_token(),
            )));
        } else {
            tracing::info!("datagram receiver disabled");
        }

        self.writer = Some(writer);
        self.cancel = cancel;
        Ok(())
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), HooklogError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(
            bind = self.config.bind.as_str(),
            buffer_capacity = self.config.buffer_capacity,
            store = self.config.store_path.as_str(),
            "starting log pipeline"
        );

        self.start_inner().await?;

        self.state = PipelineState::Running;
        tracing::info!(local_addr = ?self.local_addr, "log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), HooklogError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");

        // 1. 수신 루프 중단
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "pipeline task failed");
            }
        }

        // 2. 큐에 남은 레코드 저장 후 쓰기 워커 종료
        self.dispatcher.detach_persistence();
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                tracing::warn!(error = %e, "store writer task failed");
            }
        }

        self.local_addr = None;
        self.state = PipelineState::Stopped;
        tracing::info!(
            persisted = self.persist_stats.persisted(),
            dropped = self.persist_stats.dropped(),
            "log pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let failed = self.persist_stats.failed();
                if self.writer.as_ref().is_some_and(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("store writer exited".to_owned())
                } else if failed > 0 {
                    HealthStatus::Degraded(format!("{failed} records failed to persist"))
                } else if self.buffer.is_full() && self.persist_stats.dropped() > 0 {
                    HealthStatus::Degraded(format!(
                        "persistence queue saturated: {} records not stored",
                        self.persist_stats.dropped()
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파이프라인과 이를 공유하는 [`QueryService`]를 함께 생성합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    store: Option<Arc<LogStore>>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            store: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 이미 열린 저장소를 사용합니다.
    ///
    /// 설정하지 않으면 `store_path`에서 저장소를 엽니다.
    pub fn store(mut self, store: Arc<LogStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LogPipeline`: 파이프라인 인스턴스
    /// - `QueryService`: 같은 저장소/버퍼/허브를 공유하는 조회 서비스
    pub fn build(self) -> Result<(LogPipeline, QueryService), LogPipelineError> {
        self.config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(LogStore::open(&self.config.store_path)?),
        };

        let buffer = SharedRingBuffer::new(self.config.buffer_capacity);
        let hub = BroadcastHub::new(self.config.subscriber_capacity);
        let persist_stats = Arc::new(PersistStats::default());
        let dispatcher = Arc::new(Dispatcher::new(
            Classifier::new()?,
            buffer.clone(),
            hub.clone(),
            Arc::clone(&persist_stats),
        ));

        let query = QueryService::new(
            Arc::clone(&store),
            buffer.clone(),
            hub.clone(),
            Arc::clone(&dispatcher),
            self.config.recent_count,
        );

        let pipeline = LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            dispatcher,
            store,
            buffer,
            hub,
            receiver_stats: Arc::new(ReceiverStats::new()),
            persist_stats,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            writer: None,
            local_addr: None,
        };

        Ok((pipeline, query))
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;

    fn memory_builder(config: PipelineConfig) -> LogPipelineBuilder {
        LogPipelineBuilder::new()
            .config(config)
            .store(Arc::new(LogStore::open_in_memory().unwrap()))
    }

    fn loopback_config() -> PipelineConfig {
        PipelineConfigBuilder::new()
            .bind("127.0.0.1:0")
            .build()
            .unwrap()
    }

    #[test]
    fn builder_creates_pipeline() {
        let (pipeline, query) = memory_builder(loopback_config()).build().unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert!(pipeline.local_addr().is_none());
        assert!(query.request_recent().is_empty());
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let mut config = PipelineConfig::default();
        config.buffer_capacity = 0;
        let result = LogPipelineBuilder::new().config(config).build();
        assert!(matches!(result, Err(LogPipelineError::Config { .. })));
    }

    #[test]
    fn builder_opens_store_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logs.db");
        let config = PipelineConfigBuilder::new()
            .store_path(path.to_string_lossy())
            .build()
            .unwrap();
        let _ = LogPipelineBuilder::new().config(config).build().unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let (mut pipeline, _query) = memory_builder(loopback_config()).build().unwrap();

        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.local_addr().is_some());
        assert!(pipeline.health_check().await.is_healthy());
        assert!(matches!(
            pipeline.start().await,
            Err(HooklogError::Pipeline(PipelineError::AlreadyRunning))
        ));

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.health_check().await.is_unhealthy());

        // 재시작 가능
        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn failed_start_releases_persistence() {
        let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = PipelineConfigBuilder::new()
            .bind(occupied.local_addr().unwrap().to_string())
            .build()
            .unwrap();
        let (mut pipeline, query) = memory_builder(config).build().unwrap();

        assert!(pipeline.start().await.is_err());

        assert!(pipeline.writer.is_none());
        assert!(pipeline.tasks.is_empty());
        assert!(pipeline.local_addr().is_none());
        assert_eq!(pipeline.state_name(), "initialized");

        // 영속화 큐가 분리되어 레코드는 저장소로 가지 않음
        query.inject_samples();
        assert_eq!(pipeline.persist_stats().dropped(), 7);
        assert_eq!(pipeline.persist_stats().persisted(), 0);
    }

    #[tokio::test]
    async fn stop_drains_persistence_queue() {
        let config = PipelineConfigBuilder::new()
            .receiver_enabled(false)
            .build()
            .unwrap();
        let store = Arc::new(LogStore::open_in_memory().unwrap());
        let (mut pipeline, query) = LogPipelineBuilder::new()
            .config(config)
            .store(Arc::clone(&store))
            .build()
            .unwrap();

        pipeline.start().await.unwrap();
        assert!(pipeline.local_addr().is_none());
        query.inject_samples();
        pipeline.stop().await.unwrap();

        assert_eq!(store.count().unwrap(), 7);
        assert_eq!(pipeline.persist_stats().persisted(), 7);
        assert_eq!(pipeline.dispatched_count(), 7);
    }

    #[tokio::test]
    async fn records_outside_running_state_are_not_persisted() {
        let (pipeline, query) = memory_builder(loopback_config()).build().unwrap();
        query.inject_samples();
        assert_eq!(pipeline.buffer_len(), 7);
        assert_eq!(pipeline.persist_stats().dropped(), 7);
    }
}
