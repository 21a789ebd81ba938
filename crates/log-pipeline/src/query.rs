//! 조회 서비스 -- 외부(HTTP, WebSocket 등)에 노출되는 읽기/관리 계약
//!
//! 저장소 호출은 모두 `spawn_blocking`으로 실행되어 비동기 런타임을 막지 않습니다.
//! 최근 로그 요청은 링 버퍼만 읽습니다.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use hooklog_core::types::{Level, LogRecord, LogStats, StoredLog};

use crate::buffer::SharedRingBuffer;
use crate::dispatch::Dispatcher;
use crate::error::LogPipelineError;
use crate::hub::{BroadcastHub, Subscription};
use crate::store::{LogQuery, LogStore};

/// 샘플 주입 시 사용하는 송신자 주소
pub const SAMPLE_SOURCE_IP: &str = "127.0.0.1";

/// 동작 확인용 샘플 라인
pub const SAMPLE_LINES: [&str; 7] = [
    "微信Hook测试日志",
    "发现敏感数据: phone=13812345678",
    "Hook失败: java.lang.ClassNotFoundException",
    "WeChat用户登录成功",
    "error: 拦截失败",
    "warning: 检测到token传输",
    "debug: Hook点加载完成",
];

/// 통계 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// 저장소 통계
    #[serde(flatten)]
    pub stats: LogStats,
    /// 현재 링 버퍼 크기
    pub buffer_size: usize,
    /// 연결된 구독자 수
    pub clients_connected: usize,
}

/// 조회 서비스
///
/// `Clone`은 같은 저장소, 버퍼, 허브를 공유하는 핸들을 만듭니다.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<LogStore>,
    buffer: SharedRingBuffer,
    hub: BroadcastHub,
    dispatcher: Arc<Dispatcher>,
    recent_count: usize,
}

impl QueryService {
    pub(crate) fn new(
        store: Arc<LogStore>,
        buffer: SharedRingBuffer,
        hub: BroadcastHub,
        dispatcher: Arc<Dispatcher>,
        recent_count: usize,
    ) -> Self {
        Self {
            store,
            buffer,
            hub,
            dispatcher,
            recent_count,
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, LogPipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&LogStore) -> Result<T, LogPipelineError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| LogPipelineError::Storage(format!("store task failed: {e}")))?
    }

    /// 저장된 로그를 최신순으로 조회합니다.
    pub async fn list(
        &self,
        level: Option<Level>,
        search: Option<String>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredLog>, LogPipelineError> {
        let query = LogQuery {
            level,
            search,
            limit,
            offset,
        };
        self.with_store(move |store| store.list(&query)).await
    }

    /// 페이지 단위로 조회합니다. 페이지는 1부터 시작하며 0은 1로 취급합니다.
    pub async fn list_page(
        &self,
        page: usize,
        per_page: usize,
        level: Option<Level>,
        search: Option<String>,
    ) -> Result<Vec<StoredLog>, LogPipelineError> {
        let offset = page.max(1).saturating_sub(1).saturating_mul(per_page);
        self.list(level, search, per_page, offset).await
    }

    /// 저장소 통계와 현재 버퍼/구독자 상태를 반환합니다.
    pub async fn stats(&self) -> Result<QueryStats, LogPipelineError> {
        let stats = self.with_store(|store| store.stats()).await?;
        Ok(QueryStats {
            stats,
            buffer_size: self.buffer.len(),
            clients_connected: self.hub.subscriber_count(),
        })
    }

    /// 저장소와 버퍼를 비우고 구독자에게 삭제 이벤트를 보냅니다.
    ///
    /// 저장소 삭제가 실패하면 버퍼는 그대로 두고 에러를 반환합니다.
    /// 반환값은 저장소에서 삭제된 레코드 수입니다.
    pub async fn clear(&self) -> Result<u64, LogPipelineError> {
        let deleted = self.with_store(|store| store.clear()).await?;
        let evicted = self.buffer.clear();
        let notified = self.hub.publish_cleared();
        info!(deleted, evicted, notified, "logs cleared");
        Ok(deleted)
    }

    /// 링 버퍼의 최근 레코드를 시간순으로 반환합니다.
    pub fn request_recent(&self) -> Vec<Arc<LogRecord>> {
        self.buffer.recent(self.recent_count)
    }

    /// 실시간 이벤트를 구독합니다.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// 샘플 라인을 수집 경로에 주입하고 주입한 라인 수를 반환합니다.
    pub fn inject_samples(&self) -> usize {
        for line in SAMPLE_LINES {
            self.dispatcher.dispatch_line(line, SAMPLE_SOURCE_IP);
        }
        info!(count = SAMPLE_LINES.len(), "sample logs injected");
        SAMPLE_LINES.len()
    }
}
