//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 실제 UDP 소켓으로 데이터그램을 보내 수신부터 버퍼, 저장소, 구독자까지의
//! 흐름을 검증합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use hooklog_core::error::HooklogError;
use hooklog_core::pipeline::Pipeline;
use hooklog_core::types::{DataType, Level};
use hooklog_pipeline::{
    HubEvent, LogPipeline, LogPipelineBuilder, LogStore, PipelineConfigBuilder, QueryService,
};

/// 루프백 포트 0에 바인드한 파이프라인을 시작합니다.
async fn start_pipeline(buffer_capacity: usize) -> (LogPipeline, QueryService, Arc<LogStore>, SocketAddr) {
    let config = PipelineConfigBuilder::new()
        .bind("127.0.0.1:0")
        .buffer_capacity(buffer_capacity)
        .recent_count(buffer_capacity.min(10))
        .build()
        .expect("valid config");
    let store = Arc::new(LogStore::open_in_memory().expect("in-memory store"));
    let (mut pipeline, query) = LogPipelineBuilder::new()
        .config(config)
        .store(Arc::clone(&store))
        .build()
        .expect("pipeline builds");

    pipeline.start().await.expect("pipeline starts");
    let addr = pipeline.local_addr().expect("receiver bound");
    (pipeline, query, store, addr)
}

async fn send(addr: SocketAddr, payload: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(payload, addr).await.unwrap();
}

/// 조건이 만족될 때까지 최대 2초 대기합니다.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within timeout"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// 멀티라인 데이터그램 -> 빈 줄을 건너뛴 3개 레코드 (순서 유지)
#[tokio::test]
async fn test_multiline_datagram_yields_ordered_records() {
    let (mut pipeline, query, _store, addr) = start_pipeline(100).await;

    send(addr, b"line1\nline2\n\nline3").await;
    wait_until(|| query.request_recent().len() == 3).await;

    let messages: Vec<_> = query
        .request_recent()
        .iter()
        .map(|r| r.message.clone())
        .collect();
    assert_eq!(messages, ["line1", "line2", "line3"]);
    assert!(query.request_recent().iter().all(|r| r.source_ip == "127.0.0.1"));

    let stats = pipeline.receiver_stats();
    assert_eq!(stats.datagrams_received, 1);
    assert_eq!(stats.lines_processed, 3);
    assert_eq!(stats.sources, ["127.0.0.1"]);

    pipeline.stop().await.unwrap();
}

/// 디코딩 불가 데이터그램 -> 버려지고 에러 카운트만 증가, 이후 수신은 정상
#[tokio::test]
async fn test_undecodable_datagram_is_dropped_and_counted() {
    let (mut pipeline, query, store, addr) = start_pipeline(100).await;

    send(addr, &[0x80, 0x81, 0x9F]).await;
    wait_until(|| pipeline.receiver_stats().errors == 1).await;

    let stats = pipeline.receiver_stats();
    assert_eq!(stats.datagrams_received, 1);
    assert_eq!(stats.lines_processed, 0);
    assert!(query.request_recent().is_empty());

    send(addr, b"still alive").await;
    wait_until(|| query.request_recent().len() == 1).await;
    pipeline.stop().await.unwrap();

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(pipeline.receiver_stats().errors, 1);
}

/// JSON 오버라이드 -> 필드 병합, source_ip는 송신 주소 유지
#[tokio::test]
async fn test_json_override_keeps_transport_source() {
    let (mut pipeline, query, _store, addr) = start_pipeline(100).await;

    send(
        addr,
        br#"{"level":"ERROR","tag":"Custom","message":"x","source_ip":"8.8.8.8"}"#,
    )
    .await;
    wait_until(|| !query.request_recent().is_empty()).await;

    let record = &query.request_recent()[0];
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.tag, "Custom");
    assert_eq!(record.message, "x");
    assert_eq!(record.source_ip, "127.0.0.1");

    pipeline.stop().await.unwrap();
}

/// 수신된 레코드가 저장소에 영속화되고 조회/통계에 반영됨
#[tokio::test]
async fn test_received_records_are_persisted() {
    let (mut pipeline, query, store, addr) = start_pipeline(100).await;

    send(addr, "发现手机号: 13812345678\nwechat hook installed\nerror: crash".as_bytes()).await;
    wait_until(|| query.request_recent().len() == 3).await;
    // 정지 시 쓰기 큐가 비워짐
    pipeline.stop().await.unwrap();

    assert_eq!(store.count().unwrap(), 3);

    let logs = query.list(None, None, 100, 0).await.unwrap();
    assert_eq!(logs[0].record.message, "error: crash");
    assert_eq!(logs[2].record.tag, "Phone");
    assert_eq!(logs[2].record.data_type, Some(DataType::Sensitive));

    let sensitive = query.list(Some(Level::Warn), None, 100, 0).await.unwrap();
    assert_eq!(sensitive.len(), 1);

    let stats = query.stats().await.unwrap();
    assert_eq!(stats.stats.total, 3);
    assert_eq!(stats.stats.today, 3);
    assert_eq!(stats.stats.per_app, vec![("com.tencent.mm".to_owned(), 1)]);
}

/// 구독자 -> new_log 후 clear_logs 수신
#[tokio::test]
async fn test_subscriber_receives_new_log_then_clear() {
    let (mut pipeline, query, _store, addr) = start_pipeline(100).await;
    let mut sub = query.subscribe();

    send(addr, b"hook point loaded").await;
    let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("event within timeout")
        .expect("hub alive");
    match event {
        HubEvent::NewLog(record) => assert_eq!(record.tag, "Hook"),
        other => panic!("unexpected event: {other:?}"),
    }

    query.clear().await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("event within timeout");
    assert_eq!(event, Some(HubEvent::Cleared));

    pipeline.stop().await.unwrap();
}

/// clear 두 번 연속 -> 두 번 모두 성공, 버퍼와 저장소 비어 있음
#[tokio::test]
async fn test_clear_twice_is_idempotent() {
    let (mut pipeline, query, store, addr) = start_pipeline(100).await;

    send(addr, b"a\nb").await;
    wait_until(|| query.request_recent().len() == 2).await;
    pipeline.stop().await.unwrap();

    query.clear().await.unwrap();
    assert!(query.request_recent().is_empty());
    assert_eq!(store.count().unwrap(), 0);

    assert_eq!(query.clear().await.unwrap(), 0);
    assert!(query.request_recent().is_empty());
    assert_eq!(store.count().unwrap(), 0);
}

/// 용량 초과 -> 가장 오래된 레코드부터 제거
#[tokio::test]
async fn test_buffer_evicts_oldest_under_burst() {
    let (mut pipeline, query, _store, addr) = start_pipeline(5).await;

    let payload: String = (0..6).map(|i| format!("m{i}\n")).collect();
    send(addr, payload.as_bytes()).await;
    wait_until(|| pipeline.receiver_stats().lines_processed == 6).await;

    let messages: Vec<_> = query
        .request_recent()
        .iter()
        .map(|r| r.message.clone())
        .collect();
    assert_eq!(messages, ["m1", "m2", "m3", "m4", "m5"]);

    pipeline.stop().await.unwrap();
}

/// 바인드 실패 -> start에서 에러 반환
#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();

    let config = PipelineConfigBuilder::new()
        .bind(addr.to_string())
        .build()
        .unwrap();
    let (mut pipeline, _query) = LogPipelineBuilder::new()
        .config(config)
        .store(Arc::new(LogStore::open_in_memory().unwrap()))
        .build()
        .unwrap();

    let err = pipeline.start().await.unwrap_err();
    assert!(matches!(err, HooklogError::Pipeline(_)));
    assert!(err.to_string().contains(&addr.to_string()));
    assert_eq!(pipeline.state_name(), "initialized");
}

/// 동시 append/read -> K건 이상 append 후 읽기는 항상 K건, 부분 레코드 없음
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_append_and_recent_reads() {
    const K: usize = 10;
    let config = PipelineConfigBuilder::new()
        .receiver_enabled(false)
        .buffer_capacity(50)
        .recent_count(K)
        .build()
        .unwrap();
    let (mut pipeline, query) = LogPipelineBuilder::new()
        .config(config)
        .store(Arc::new(LogStore::open_in_memory().unwrap()))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    // 먼저 K건 이상을 채움
    for _ in 0..2 {
        query.inject_samples();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let q = query.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                q.inject_samples();
                tokio::task::yield_now().await;
            }
        }));
    }
    for _ in 0..4 {
        let q = query.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..200 {
                let recent = q.request_recent();
                assert_eq!(recent.len(), K);
                assert!(recent.iter().all(|r| !r.message.is_empty()));
                tokio::task::yield_now().await;
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    pipeline.stop().await.unwrap();
}
