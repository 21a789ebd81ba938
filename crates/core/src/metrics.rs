//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `hooklog_`
//! - 컴포넌트명: `receiver_`, `store_`, `hub_`, `buffer_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(hooklog_core::metrics::RECEIVER_DATAGRAMS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 로그 레벨 레이블 키 (DEBUG, INFO, WARN, ERROR)
pub const LABEL_LEVEL: &str = "level";

// ─── Receiver 메트릭 ────────────────────────────────────────────────

/// Receiver: 수신한 데이터그램 수 (counter)
pub const RECEIVER_DATAGRAMS_TOTAL: &str = "hooklog_receiver_datagrams_total";

/// Receiver: 분류기로 전달한 라인 수 (counter, label: level)
pub const RECEIVER_LINES_TOTAL: &str = "hooklog_receiver_lines_total";

/// Receiver: 수신/디코딩 에러 수 (counter)
pub const RECEIVER_ERRORS_TOTAL: &str = "hooklog_receiver_errors_total";

// ─── Store 메트릭 ───────────────────────────────────────────────────

/// Store: 저장된 레코드 수 (counter)
pub const STORE_PERSISTED_TOTAL: &str = "hooklog_store_persisted_total";

/// Store: 저장 실패 수 (counter)
pub const STORE_PERSIST_FAILURES_TOTAL: &str = "hooklog_store_persist_failures_total";

/// Store: 큐 포화로 저장을 건너뛴 레코드 수 (counter)
pub const STORE_PERSIST_DROPPED_TOTAL: &str = "hooklog_store_persist_dropped_total";

// ─── Hub 메트릭 ─────────────────────────────────────────────────────

/// Hub: 구독자에게 전달한 이벤트 수 (counter)
pub const HUB_SENT_TOTAL: &str = "hooklog_hub_sent_total";

/// Hub: 구독자 채널 포화로 버린 이벤트 수 (counter)
pub const HUB_DROPPED_TOTAL: &str = "hooklog_hub_dropped_total";

/// Hub: 현재 구독자 수 (gauge)
pub const HUB_SUBSCRIBERS: &str = "hooklog_hub_subscribers";

// ─── Buffer 메트릭 ──────────────────────────────────────────────────

/// Buffer: 현재 버퍼 내 레코드 수 (gauge)
pub const BUFFER_SIZE: &str = "hooklog_buffer_size";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "hooklog_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "hooklog_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `hooklog-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Receiver
    describe_counter!(
        RECEIVER_DATAGRAMS_TOTAL,
        "Total number of UDP datagrams received"
    );
    describe_counter!(
        RECEIVER_LINES_TOTAL,
        "Total number of log lines classified, by level"
    );
    describe_counter!(
        RECEIVER_ERRORS_TOTAL,
        "Total number of receive and decode failures"
    );

    // Store
    describe_counter!(
        STORE_PERSISTED_TOTAL,
        "Total number of records written to the durable store"
    );
    describe_counter!(
        STORE_PERSIST_FAILURES_TOTAL,
        "Total number of failed store inserts"
    );
    describe_counter!(
        STORE_PERSIST_DROPPED_TOTAL,
        "Total number of records skipped because the persistence queue was full"
    );

    // Hub
    describe_counter!(HUB_SENT_TOTAL, "Total number of events pushed to subscribers");
    describe_counter!(
        HUB_DROPPED_TOTAL,
        "Total number of events dropped for slow subscribers"
    );
    describe_gauge!(HUB_SUBSCRIBERS, "Number of live subscribers");

    // Buffer
    describe_gauge!(BUFFER_SIZE, "Current number of records in the ring buffer");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "hooklog daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        RECEIVER_DATAGRAMS_TOTAL,
        RECEIVER_LINES_TOTAL,
        RECEIVER_ERRORS_TOTAL,
        STORE_PERSISTED_TOTAL,
        STORE_PERSIST_FAILURES_TOTAL,
        STORE_PERSIST_DROPPED_TOTAL,
        HUB_SENT_TOTAL,
        HUB_DROPPED_TOTAL,
        HUB_SUBSCRIBERS,
        BUFFER_SIZE,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_hooklog_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("hooklog_"),
                "Metric '{}' does not start with 'hooklog_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        let counters = [
            RECEIVER_DATAGRAMS_TOTAL,
            RECEIVER_LINES_TOTAL,
            RECEIVER_ERRORS_TOTAL,
            STORE_PERSISTED_TOTAL,
            STORE_PERSIST_FAILURES_TOTAL,
            STORE_PERSIST_DROPPED_TOTAL,
            HUB_SENT_TOTAL,
            HUB_DROPPED_TOTAL,
        ];
        for name in counters {
            assert!(name.ends_with("_total"), "counter '{name}' lacks _total");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        assert_eq!(LABEL_LEVEL.to_lowercase(), LABEL_LEVEL);
    }
}
