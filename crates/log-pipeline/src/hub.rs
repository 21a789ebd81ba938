//! 브로드캐스트 허브 -- 실시간 구독자 팬아웃
//!
//! 구독자마다 bounded mpsc 채널을 하나씩 둡니다. 게시(publish)는 `try_send`만
//! 사용하므로 느린 구독자가 수집 경로를 막지 않습니다.
//!
//! - `Full`: 해당 구독자에게만 이벤트를 버림 (카운트)
//! - `Closed`: 구독자를 제거
//!
//! 연결 시 과거 이벤트를 재전송하지 않습니다. 백필은
//! [`QueryService::request_recent`](crate::query::QueryService::request_recent)로 합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use metrics::{counter, gauge};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};
use uuid::Uuid;

use hooklog_core::metrics as m;
use hooklog_core::types::LogRecord;

/// 구독자에게 전달되는 이벤트
///
/// JSON 직렬화 형식:
/// - `{"event":"new_log","data":{...}}`
/// - `{"event":"clear_logs"}`
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// 새 레코드
    NewLog(Arc<LogRecord>),
    /// 전체 삭제
    Cleared,
}

impl HubEvent {
    /// 이벤트 이름을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewLog(_) => "new_log",
            Self::Cleared => "clear_logs",
        }
    }
}

impl Serialize for HubEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("event", self.name())?;
        if let Self::NewLog(record) = self {
            map.serialize_entry("data", record.as_ref())?;
        }
        map.end()
    }
}

struct HubInner {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<HubEvent>>>,
    capacity: usize,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<HubEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: &Uuid) {
        let mut subs = self.lock();
        if subs.remove(id).is_some() {
            gauge!(m::HUB_SUBSCRIBERS).set(subs.len() as f64);
            info!(subscriber = %id, remaining = subs.len(), "subscriber disconnected");
        }
    }
}

/// 브로드캐스트 허브
///
/// `Clone`은 같은 구독자 집합을 공유하는 핸들을 만듭니다.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// 구독자별 채널 용량을 지정해 허브를 생성합니다.
    pub fn new(subscriber_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(HashMap::new()),
                capacity: subscriber_capacity.max(1),
                sent: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// 새 구독을 등록합니다. 반환된 [`Subscription`]을 drop하면 구독이 해제됩니다.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = Uuid::new_v4();
        let count = {
            let mut subs = self.inner.lock();
            subs.insert(id, tx);
            subs.len()
        };
        gauge!(m::HUB_SUBSCRIBERS).set(count as f64);
        info!(subscriber = %id, total = count, "subscriber connected");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// 새 레코드를 모든 구독자에게 게시하고 전달 성공 수를 반환합니다.
    pub fn publish(&self, record: Arc<LogRecord>) -> usize {
        self.broadcast(HubEvent::NewLog(record))
    }

    /// 전체 삭제 이벤트를 게시합니다.
    pub fn publish_cleared(&self) -> usize {
        self.broadcast(HubEvent::Cleared)
    }

    fn broadcast(&self, event: HubEvent) -> usize {
        let mut subs = self.inner.lock();
        if subs.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in subs.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    counter!(m::HUB_DROPPED_TOTAL).increment(1);
                    debug!(subscriber = %id, event = event.name(), "subscriber lagging, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in &closed {
            subs.remove(id);
        }
        if !closed.is_empty() {
            gauge!(m::HUB_SUBSCRIBERS).set(subs.len() as f64);
        }

        self.inner
            .sent
            .fetch_add(delivered as u64, Ordering::Relaxed);
        counter!(m::HUB_SENT_TOTAL).increment(delivered as u64);
        delivered
    }

    /// 현재 구독자 수를 반환합니다.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// 전달 성공한 이벤트 수를 반환합니다.
    pub fn sent_count(&self) -> u64 {
        self.inner.sent.load(Ordering::Relaxed)
    }

    /// 느린 구독자 때문에 버린 이벤트 수를 반환합니다.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// 허브 구독 핸들
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<HubEvent>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// 구독 ID를 반환합니다.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 다음 이벤트를 기다립니다. 허브가 사라지면 `None`입니다.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }

    /// 대기 중인 이벤트를 즉시 꺼냅니다.
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.id);
        }
    }
}
