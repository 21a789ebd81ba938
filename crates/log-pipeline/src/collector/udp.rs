//! UDP 데이터그램 수신기
//!
//! 단일 tokio 태스크에서 `recv_from` 루프를 실행합니다. 정지는 협력적이며,
//! `CancellationToken`이 취소되면 `select!`가 풀리고 소켓이 닫힙니다.
//! 이미 처리 중인 데이터그램은 끝까지 처리됩니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{RawDatagram, ReceiverStats, process_datagram};
use crate::dispatch::Dispatcher;
use crate::error::LogPipelineError;

/// UDP 데이터그램 수신기
pub struct DatagramReceiver {
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ReceiverStats>,
    max_datagram_size: usize,
}

impl DatagramReceiver {
    /// 주소에 바인드합니다. 실패는 치명적이며 호출자에게 그대로 전달됩니다.
    pub async fn bind(
        addr: &str,
        dispatcher: Arc<Dispatcher>,
        stats: Arc<ReceiverStats>,
        max_datagram_size: usize,
    ) -> Result<Self, LogPipelineError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| LogPipelineError::Bind {
                addr: addr.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            socket,
            dispatcher,
            stats,
            max_datagram_size: max_datagram_size.max(1),
        })
    }

    /// 실제 바인드된 주소를 반환합니다 (포트 0 바인드 시 유용).
    pub fn local_addr(&self) -> Result<SocketAddr, LogPipelineError> {
        Ok(self.socket.local_addr()?)
    }

    /// 취소될 때까지 수신 루프를 실행합니다.
    pub async fn run(self, cancel: CancellationToken) {
        let local = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        info!(addr = local.as_str(), "datagram receiver listening");

        let mut buf = vec![0u8; self.max_datagram_size];
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("datagram receiver received shutdown signal");
                    break;
                }
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((n, peer)) => {
                        let datagram = RawDatagram::new(Bytes::copy_from_slice(&buf[..n]), peer);
                        process_datagram(&self.dispatcher, &self.stats, &datagram);
                    }
                    Err(e) => {
                        self.stats.record_error();
                        warn!(error = %e, "datagram receive failed");
                    }
                }
            }
        }

        info!(
            datagrams = self.stats.datagrams(),
            lines = self.stats.lines(),
            errors = self.stats.errors(),
            "datagram receiver stopped"
        );
    }
}

/// 주기적으로 수신 통계를 로그로 남깁니다.
///
/// 데이터그램을 하나도 받지 않았으면 보고를 건너뜁니다.
pub async fn report_stats(stats: Arc<ReceiverStats>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    // 첫 tick은 즉시 발생하므로 건너뜀
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snap = stats.snapshot();
                if snap.datagrams_received == 0 {
                    continue;
                }
                info!(
                    uptime_secs = snap.uptime_secs,
                    datagrams = snap.datagrams_received,
                    lines = snap.lines_processed,
                    errors = snap.errors,
                    clients = snap.distinct_sources,
                    sources = snap.sources.join(", ").as_str(),
                    "receiver stats"
                );
            }
        }
    }
}
