//! 링 버퍼 -- 최근 레코드의 고정 용량 인메모리 보관소
//!
//! [`RingBuffer`]는 삽입 순서를 유지하며, 용량을 넘으면 가장 오래된 레코드
//! 하나를 제거합니다. [`SharedRingBuffer`]는 이를 `Mutex`로 감싸 추가/제거와
//! 스냅샷 읽기가 서로 원자적으로 보이게 하고, 추가와 비우기 때마다
//! `hooklog_buffer_size` 게이지를 갱신합니다.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use metrics::gauge;

use hooklog_core::metrics as m;
use hooklog_core::types::LogRecord;

/// 고정 용량 링 버퍼
#[derive(Debug)]
pub struct RingBuffer {
    /// 내부 저장소 (앞쪽이 가장 오래된 레코드)
    buffer: VecDeque<Arc<LogRecord>>,
    /// 최대 용량
    capacity: usize,
    /// 총 추가 횟수
    total_pushed: u64,
    /// 용량 초과로 제거된 레코드 수
    evicted_count: u64,
}

impl RingBuffer {
    /// 새 링 버퍼를 생성합니다. 용량은 최소 1로 보정됩니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            total_pushed: 0,
            evicted_count: 0,
        }
    }

    /// 레코드를 추가합니다. 제거가 발생하면 제거된 레코드를 반환합니다.
    pub fn push(&mut self, record: Arc<LogRecord>) -> Option<Arc<LogRecord>> {
        self.total_pushed += 1;

        let evicted = if self.buffer.len() >= self.capacity {
            self.evicted_count += 1;
            self.buffer.pop_front()
        } else {
            None
        };

        self.buffer.push_back(record);
        evicted
    }

    /// 최근 `n`개 레코드를 시간순(오래된 것 먼저)으로 반환합니다.
    pub fn recent(&self, n: usize) -> Vec<Arc<LogRecord>> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip).cloned().collect()
    }

    /// 모든 레코드를 시간순으로 반환합니다.
    pub fn snapshot(&self) -> Vec<Arc<LogRecord>> {
        self.buffer.iter().cloned().collect()
    }

    /// 버퍼를 비우고 제거된 레코드 수를 반환합니다.
    pub fn clear(&mut self) -> usize {
        let n = self.buffer.len();
        self.buffer.clear();
        n
    }

    /// 현재 레코드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 버퍼가 가득 찼는지 확인합니다.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    /// 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 총 추가 횟수를 반환합니다.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// 제거된 레코드 수를 반환합니다.
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// 버퍼 사용률을 0.0~1.0 범위로 반환합니다.
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.buffer.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

/// 여러 태스크가 공유하는 링 버퍼 핸들
///
/// 잠금 범위는 항상 동기 코드 안에서 끝나며 `.await`를 넘지 않습니다.
#[derive(Debug, Clone)]
pub struct SharedRingBuffer {
    inner: Arc<Mutex<RingBuffer>>,
}

impl SharedRingBuffer {
    /// 새 공유 링 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity))),
        }
    }

    // 패닉한 스레드가 남긴 poison은 무시합니다. 버퍼 연산은 중간 상태를 남기지 않습니다.
    fn lock(&self) -> MutexGuard<'_, RingBuffer> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 레코드를 추가하고 추가 후 레코드 수를 반환합니다.
    pub fn push(&self, record: Arc<LogRecord>) -> usize {
        let len = {
            let mut buf = self.lock();
            buf.push(record);
            buf.len()
        };
        gauge!(m::BUFFER_SIZE).set(len as f64);
        len
    }

    /// 최근 `n`개 레코드를 시간순으로 반환합니다.
    pub fn recent(&self, n: usize) -> Vec<Arc<LogRecord>> {
        self.lock().recent(n)
    }

    /// 모든 레코드를 시간순으로 반환합니다.
    pub fn snapshot(&self) -> Vec<Arc<LogRecord>> {
        self.lock().snapshot()
    }

    /// 버퍼를 비우고 제거된 레코드 수를 반환합니다.
    pub fn clear(&self) -> usize {
        let evicted = self.lock().clear();
        gauge!(m::BUFFER_SIZE).set(0.0);
        evicted
    }

    /// 현재 레코드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 버퍼가 가득 찼는지 확인합니다.
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// 제거된 레코드 수를 반환합니다.
    pub fn evicted_count(&self) -> u64 {
        self.lock().evicted_count()
    }

    /// 버퍼 사용률을 반환합니다.
    pub fn utilization(&self) -> f64 {
        self.lock().utilization()
    }
}
