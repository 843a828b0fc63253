//! 컨트롤러 → 워커 단방향 폴 신호
//!
//! ## 의미론
//! - 전송은 언제나 비차단(`try_send`) — 컨트롤러는 워커 응답을 기다리지 않음
//! - 수신측이 바쁘거나(채널 가득 참) 죽었으면 신호는 조용히 버려짐
//! - 큐잉/재전송 없음: 놓친 틱은 다음 틱이 대신함
//!
//! 용량 1의 바운드 채널을 사용합니다. 이미 대기 중인 신호가 있으면
//! 추가 신호는 의미가 없으므로(어차피 한 사이클만 돌게 됨) 버립니다.

use tokio::sync::mpsc;

/// 폴 요청 — 페이로드 없음
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRequest;

/// 신호 송신측 (컨트롤러 보유)
#[derive(Debug, Clone)]
pub struct PollSignal {
    tx: mpsc::Sender<PollRequest>,
}

/// 신호 수신측 (워커 보유)
#[derive(Debug)]
pub struct PollReceiver {
    rx: mpsc::Receiver<PollRequest>,
}

/// 단방향 폴 채널 생성
pub fn poll_channel() -> (PollSignal, PollReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (PollSignal { tx }, PollReceiver { rx })
}

impl PollSignal {
    /// 폴 신호 전송. 실패는 삼켜짐 — 에러를 반환하지 않음.
    pub fn notify(&self) {
        match self.tx.try_send(PollRequest) {
            Ok(()) => {
                tracing::debug!("[Signal] Poll signal sent");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("[Signal] Worker busy, poll signal dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("[Signal] Worker gone, poll signal dropped");
            }
        }
    }
}

impl PollReceiver {
    /// 다음 폴 신호 대기. 송신측이 전부 닫히면 `None`.
    pub async fn recv(&mut self) -> Option<PollRequest> {
        self.rx.recv().await
    }

    /// 대기 없이 신호 확인 (테스트 및 드레인용)
    pub fn try_recv(&mut self) -> Option<PollRequest> {
        self.rx.try_recv().ok()
    }
}
