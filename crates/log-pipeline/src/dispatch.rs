//! 디스패처 -- 분류된 레코드를 버퍼, 영속화 큐, 허브로 전달합니다.
//!
//! 모든 경로가 동기이며 대기하지 않습니다.
//!
//! ```text
//!                   +-> SharedRingBuffer::push
//! classify -> Arc --+-> persist queue (try_send) -> StoreWriter
//!                   +-> BroadcastHub::publish (try_send per subscriber)
//! ```
//!
//! 영속화 큐가 가득 차면 그 레코드는 저장소에만 빠지고 버퍼와 허브에는 전달됩니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use hooklog_core::metrics as m;
use hooklog_core::types::LogRecord;

use crate::buffer::SharedRingBuffer;
use crate::classifier::Classifier;
use crate::hub::BroadcastHub;
use crate::store::PersistStats;

type PersistSender = mpsc::Sender<Arc<LogRecord>>;

/// 분류 결과 팬아웃
pub struct Dispatcher {
    classifier: Classifier,
    buffer: SharedRingBuffer,
    hub: BroadcastHub,
    persist_tx: Mutex<Option<PersistSender>>,
    persist_stats: Arc<PersistStats>,
    dispatched: AtomicU64,
}

impl Dispatcher {
    /// 새 디스패처를 생성합니다. 영속화 큐는 [`attach_persistence`](Self::attach_persistence)로 연결합니다.
    pub fn new(
        classifier: Classifier,
        buffer: SharedRingBuffer,
        hub: BroadcastHub,
        persist_stats: Arc<PersistStats>,
    ) -> Self {
        Self {
            classifier,
            buffer,
            hub,
            persist_tx: Mutex::new(None),
            persist_stats,
            dispatched: AtomicU64::new(0),
        }
    }

    fn persist_slot(&self) -> MutexGuard<'_, Option<PersistSender>> {
        self.persist_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 영속화 큐 송신측을 연결합니다.
    pub fn attach_persistence(&self, tx: PersistSender) {
        *self.persist_slot() = Some(tx);
    }

    /// 영속화 큐 송신측을 분리합니다. 쓰기 워커는 남은 레코드를 저장한 뒤 종료합니다.
    pub fn detach_persistence(&self) {
        self.persist_slot().take();
    }

    /// 원시 라인을 분류하고 전달합니다.
    pub fn dispatch_line(&self, raw: &str, source_ip: &str) -> Arc<LogRecord> {
        let record = Arc::new(self.classifier.classify(raw, source_ip));
        self.dispatch(Arc::clone(&record));
        record
    }

    /// 분류된 레코드를 전달합니다.
    pub fn dispatch(&self, record: Arc<LogRecord>) {
        self.buffer.push(Arc::clone(&record));

        self.persist(&record);

        let level = record.level.as_str();
        self.hub.publish(record);

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        counter!(m::RECEIVER_LINES_TOTAL, m::LABEL_LEVEL => level).increment(1);
    }

    fn persist(&self, record: &Arc<LogRecord>) {
        let slot = self.persist_slot();
        let Some(tx) = slot.as_ref() else {
            self.persist_stats.record_dropped();
            debug!("persistence not attached, record kept in memory only");
            return;
        };

        match tx.try_send(Arc::clone(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.persist_stats.record_dropped();
                warn!(
                    dropped = self.persist_stats.dropped(),
                    "persistence queue full, record not stored"
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.persist_stats.record_dropped();
                debug!("persistence queue closed, record not stored");
            }
        }
    }

    /// 지금까지 전달한 레코드 수를 반환합니다.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubEvent;

    fn dispatcher(buffer_capacity: usize) -> (Dispatcher, SharedRingBuffer, BroadcastHub, Arc<PersistStats>) {
        let buffer = SharedRingBuffer::new(buffer_capacity);
        let hub = BroadcastHub::new(16);
        let stats = Arc::new(PersistStats::default());
        let d = Dispatcher::new(
            Classifier::new().unwrap(),
            buffer.clone(),
            hub.clone(),
            Arc::clone(&stats),
        );
        (d, buffer, hub, stats)
    }

    #[test]
    fn dispatch_line_reaches_buffer_queue_and_hub() {
        let (d, buffer, hub, stats) = dispatcher(10);
        let (tx, mut rx) = mpsc::channel(4);
        d.attach_persistence(tx);
        let mut sub = hub.subscribe();

        let record = d.dispatch_line("hook installed", "10.0.0.9");
        assert_eq!(record.tag, "Hook");
        assert_eq!(buffer.len(), 1);
        assert_eq!(rx.try_recv().unwrap().message, "hook installed");
        assert!(matches!(sub.try_recv(), Some(HubEvent::NewLog(_))));
        assert_eq!(stats.dropped(), 0);
        assert_eq!(d.dispatched_count(), 1);
    }

    #[test]
    fn full_queue_drops_for_store_only() {
        let (d, buffer, hub, stats) = dispatcher(10);
        let (tx, _rx) = mpsc::channel(1);
        d.attach_persistence(tx);
        let mut sub = hub.subscribe();

        d.dispatch_line("a", "ip");
        d.dispatch_line("b", "ip");

        assert_eq!(stats.dropped(), 1);
        assert_eq!(buffer.len(), 2);
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
    }

    #[test]
    fn detached_persistence_counts_drop() {
        let (d, buffer, _hub, stats) = dispatcher(10);
        d.dispatch_line("a", "ip");
        assert_eq!(stats.dropped(), 1);
        assert_eq!(buffer.len(), 1);

        let (tx, mut rx) = mpsc::channel(4);
        d.attach_persistence(tx);
        d.detach_persistence();
        d.dispatch_line("b", "ip");
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.dropped(), 2);
    }
}
