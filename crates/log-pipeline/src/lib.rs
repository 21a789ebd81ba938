//! # hooklog-pipeline
//!
//! 후킹된 앱이 UDP로 보내는 로그를 수신, 분류하여 링 버퍼, SQLite 저장소,
//! 실시간 구독자에게 전달하는 파이프라인입니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: UDP 데이터그램 수신, 디코딩, 라인 분리
//! - [`classifier`]: 키워드/정규식 기반 휴리스틱 분류 및 JSON 오버라이드
//! - [`dispatch`]: 분류 결과를 버퍼, 영속화 큐, 허브로 팬아웃
//! - [`buffer`]: 고정 용량 링 버퍼 (최근 로그)
//! - [`store`]: SQLite 저장소와 쓰기 워커
//! - [`hub`]: 구독자별 bounded 채널 브로드캐스트
//! - [`query`]: 외부 노출용 조회/관리 계약
//! - [`pipeline`]: 전체 생명주기 관리 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 평탄화)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! UDP -> DatagramReceiver -> Classifier -> Dispatcher -+-> RingBuffer   <- request_recent
//!                                                      +-> StoreWriter  -> LogStore <- list/stats/clear
//!                                                      +-> BroadcastHub -> Subscription
//! ```

pub mod buffer;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod pipeline;
pub mod query;
pub mod store;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 분류기
pub use classifier::{Classifier, ClassifyError, LogOverrides};

// 수집기
pub use collector::{DatagramReceiver, RawDatagram, ReceiverSnapshot, ReceiverStats};

// 버퍼
pub use buffer::{RingBuffer, SharedRingBuffer};

// 저장소
pub use store::{LogQuery, LogStore, PersistStats, StoreWriter};

// 허브
pub use hub::{BroadcastHub, HubEvent, Subscription};

// 조회
pub use dispatch::Dispatcher;
pub use query::{QueryService, QueryStats};
