//! 로그 수집 모듈 -- UDP 데이터그램을 받아 라인 단위로 분류기에 넘깁니다.
//!
//! # 처리 흐름
//! ```text
//! recv_from -> RawDatagram -> decode -> split_lines -> Dispatcher::dispatch_line
//! ```
//!
//! 데이터그램 하나는 독립적으로 처리되며, 데이터그램 사이에서 라인을 합치거나
//! 버퍼링하지 않습니다.

pub mod udp;

pub use udp::{DatagramReceiver, report_stats};

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use hooklog_core::metrics as m;

use crate::dispatch::Dispatcher;
use crate::error::LogPipelineError;

/// 수신된 원시 데이터그램
#[derive(Debug, Clone)]
pub struct RawDatagram {
    /// 원시 바이트
    pub data: Bytes,
    /// 송신자 주소
    pub peer: SocketAddr,
}

impl RawDatagram {
    /// 새 데이터그램을 생성합니다.
    pub fn new(data: Bytes, peer: SocketAddr) -> Self {
        Self { data, peer }
    }
}

/// 바이트를 텍스트로 디코딩합니다.
///
/// UTF-8(손실 허용)을 먼저 시도하고, 결과에 쓸 만한 문자가 없고 원본이 유효한
/// UTF-8이 아니었다면 ISO-8859-1로 한 번 더 시도합니다. 둘 다 실패하면 에러입니다.
/// 유효한 UTF-8이지만 공백뿐인 입력은 에러가 아니며 라인이 없는 텍스트가 됩니다.
pub fn decode(data: &[u8]) -> Result<Cow<'_, str>, LogPipelineError> {
    let lossy = String::from_utf8_lossy(data);
    if has_usable_char(&lossy) || matches!(lossy, Cow::Borrowed(_)) {
        return Ok(lossy);
    }

    let latin1: String = data.iter().map(|&b| char::from(b)).collect();
    if has_usable_char(&latin1) {
        return Ok(Cow::Owned(latin1));
    }

    Err(LogPipelineError::Decode(format!(
        "{} bytes with no decodable text",
        data.len()
    )))
}

fn has_usable_char(s: &str) -> bool {
    s.chars()
        .any(|c| !c.is_whitespace() && !c.is_control() && c != char::REPLACEMENT_CHARACTER)
}

/// 텍스트를 `\n` 기준으로 나누고 trim한 뒤 빈 라인을 건너뜁니다.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(str::trim).filter(|line| !line.is_empty())
}

/// 데이터그램 하나를 처리하고 전달한 라인 수를 반환합니다.
pub fn process_datagram(
    dispatcher: &Dispatcher,
    stats: &ReceiverStats,
    datagram: &RawDatagram,
) -> usize {
    stats.record_datagram(datagram.peer.ip());

    let text = match decode(&datagram.data) {
        Ok(text) => text,
        Err(e) => {
            stats.record_error();
            warn!(peer = %datagram.peer, error = %e, "dropping undecodable datagram");
            return 0;
        }
    };

    let source_ip = datagram.peer.ip().to_string();
    let mut forwarded = 0;
    for line in split_lines(&text) {
        dispatcher.dispatch_line(line, &source_ip);
        forwarded += 1;
    }
    stats.record_lines(forwarded);

    debug!(
        peer = %datagram.peer,
        bytes = datagram.data.len(),
        lines = forwarded,
        "datagram processed"
    );
    forwarded
}

/// 수신기 카운터
#[derive(Debug)]
pub struct ReceiverStats {
    datagrams: AtomicU64,
    lines: AtomicU64,
    errors: AtomicU64,
    sources: Mutex<BTreeSet<IpAddr>>,
    started_at: Instant,
}

impl Default for ReceiverStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverStats {
    /// 새 카운터를 생성합니다. 가동 시간은 지금부터 계산합니다.
    pub fn new() -> Self {
        Self {
            datagrams: AtomicU64::new(0),
            lines: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            sources: Mutex::new(BTreeSet::new()),
            started_at: Instant::now(),
        }
    }

    fn record_datagram(&self, source: IpAddr) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        counter!(m::RECEIVER_DATAGRAMS_TOTAL).increment(1);
        self.sources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(source);
    }

    fn record_lines(&self, n: usize) {
        self.lines.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// 수신/디코딩 에러를 기록합니다.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!(m::RECEIVER_ERRORS_TOTAL).increment(1);
    }

    /// 수신한 데이터그램 수
    pub fn datagrams(&self) -> u64 {
        self.datagrams.load(Ordering::Relaxed)
    }

    /// 분류기로 전달한 라인 수
    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// 에러 수
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// 현재 카운터 스냅샷을 반환합니다.
    pub fn snapshot(&self) -> ReceiverSnapshot {
        let sources: Vec<String> = self
            .sources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(ToString::to_string)
            .collect();

        ReceiverSnapshot {
            datagrams_received: self.datagrams(),
            lines_processed: self.lines(),
            errors: self.errors(),
            distinct_sources: sources.len(),
            sources,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// 수신기 카운터 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiverSnapshot {
    /// 수신한 데이터그램 수
    pub datagrams_received: u64,
    /// 분류기로 전달한 라인 수
    pub lines_processed: u64,
    /// 에러 수
    pub errors: u64,
    /// 서로 다른 송신자 IP 수
    pub distinct_sources: usize,
    /// 송신자 IP 목록 (정렬됨)
    pub sources: Vec<String>,
    /// 가동 시간 (초)
    pub uptime_secs: u64,
}
