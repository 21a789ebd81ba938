//! 저장소 쓰기 태스크
//!
//! 디스패처가 bounded mpsc 큐에 넣은 레코드를 전용 블로킹 스레드에서
//! 순서대로 저장합니다. 큐 송신측이 모두 닫히면 남은 레코드를 저장한 뒤 종료합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hooklog_core::metrics as m;
use hooklog_core::types::LogRecord;

use super::LogStore;

/// 영속화 통계
#[derive(Debug, Default)]
pub struct PersistStats {
    persisted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    pruned: AtomicU64,
}

impl PersistStats {
    /// 큐 포화로 저장을 건너뛴 레코드를 기록합니다.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        counter!(m::STORE_PERSIST_DROPPED_TOTAL).increment(1);
    }

    fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
        counter!(m::STORE_PERSISTED_TOTAL).increment(1);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        counter!(m::STORE_PERSIST_FAILURES_TOTAL).increment(1);
    }

    /// 저장에 성공한 레코드 수
    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    /// 저장에 실패한 레코드 수
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// 큐 포화로 건너뛴 레코드 수
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 보관 상한으로 삭제된 레코드 수
    pub fn pruned(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }
}

/// 저장소 쓰기 워커
pub struct StoreWriter {
    store: Arc<LogStore>,
    stats: Arc<PersistStats>,
    max_records: u64,
    prune_every: u64,
}

impl StoreWriter {
    /// 새 쓰기 워커를 생성합니다.
    pub fn new(
        store: Arc<LogStore>,
        stats: Arc<PersistStats>,
        max_records: u64,
        prune_every: u64,
    ) -> Self {
        Self {
            store,
            stats,
            max_records,
            prune_every: prune_every.max(1),
        }
    }

    /// 블로킹 스레드에서 쓰기 루프를 시작합니다.
    pub fn spawn(self, rx: mpsc::Receiver<Arc<LogRecord>>) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || self.run(rx))
    }

    fn run(self, mut rx: mpsc::Receiver<Arc<LogRecord>>) {
        info!(
            max_records = self.max_records,
            prune_every = self.prune_every,
            "store writer started"
        );
        let mut since_prune = 0u64;

        while let Some(record) = rx.blocking_recv() {
            match self.store.insert(&record) {
                Ok(id) => {
                    self.stats.record_persisted();
                    debug!(id, level = %record.level, "record persisted");
                }
                Err(e) => {
                    self.stats.record_failed();
                    warn!(error = %e, "failed to persist record");
                }
            }

            since_prune += 1;
            if since_prune >= self.prune_every {
                since_prune = 0;
                self.enforce_retention();
            }
        }

        info!(
            persisted = self.stats.persisted(),
            failed = self.stats.failed(),
            "store writer stopped"
        );
    }

    fn enforce_retention(&self) {
        match self.store.prune(self.max_records) {
            Ok(0) => {}
            Ok(deleted) => {
                self.stats.pruned.fetch_add(deleted, Ordering::Relaxed);
                info!(deleted, max_records = self.max_records, "pruned old records");
            }
            Err(e) => warn!(error = %e, "retention check failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hooklog_core::types::Level;

    fn record(i: usize) -> Arc<LogRecord> {
        Arc::new(LogRecord {
            timestamp: Utc::now(),
            level: Level::Info,
            tag: "Xposed".to_owned(),
            message: format!("m{i}"),
            source_ip: "127.0.0.1".to_owned(),
            app_package: None,
            hook_point: None,
            data_type: None,
            raw_data: format!("m{i}"),
        })
    }

    #[tokio::test]
    async fn writer_persists_in_order_and_drains_on_close() {
        let store = Arc::new(LogStore::open_in_memory().unwrap());
        let stats = Arc::new(PersistStats::default());
        let (tx, rx) = mpsc::channel(16);
        let handle = StoreWriter::new(Arc::clone(&store), Arc::clone(&stats), 100, 10).spawn(rx);

        for i in 0..5 {
            tx.send(record(i)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(stats.persisted(), 5);
        let logs = store.list(&super::super::LogQuery::default()).unwrap();
        assert_eq!(logs[0].record.message, "m4");
        assert_eq!(logs[4].record.message, "m0");
    }

    #[tokio::test]
    async fn writer_enforces_retention() {
        let store = Arc::new(LogStore::open_in_memory().unwrap());
        let stats = Arc::new(PersistStats::default());
        let (tx, rx) = mpsc::channel(64);
        let handle = StoreWriter::new(Arc::clone(&store), Arc::clone(&stats), 5, 2).spawn(rx);

        for i in 0..20 {
            tx.send(record(i)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.count().unwrap(), 5);
        assert_eq!(stats.pruned(), 15);
    }

    #[test]
    fn dropped_counter_increments() {
        let stats = PersistStats::default();
        stats.record_dropped();
        stats.record_dropped();
        assert_eq!(stats.dropped(), 2);
    }
}
