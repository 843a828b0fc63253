//! 폴링 타이머 서비스 (컨트롤러 측)
//!
//! ## 불변식
//! - 무장된 타이머는 프로세스 전체에서 최대 하나
//! - `enabled == false`면 타이머 없음, `enabled == true`면 정확히 하나
//! - 동일한 설정으로의 재설정은 no-op — 진행 중인 카운트다운을
//!   리셋하지 않음
//!
//! 틱마다 창 상태를 확인해 자격이 있을 때만(창 존재 + 비표시)
//! 워커에 단방향 폴 신호를 보냅니다. 자격이 없는 틱은 큐잉/재시도
//! 없이 버려집니다. 틱 콜백은 어떤 에러도 전파하지 않습니다.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use wowcui_addons_lib::PollSignal;

use crate::window::WindowTracker;

/// 폴링 설정 — 워커의 명시적 재설정 메시지로만 변경됨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub enabled: bool,
    /// 체크 간격 (초 단위, 기본 1시간)
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

impl PollingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// 반복 폴 타이머의 소유자
pub struct Poller {
    config: PollingConfig,
    /// 부팅 등록(initLookForUpdates)은 최초 1회만 유효
    initialized: bool,
    signal: PollSignal,
    window: Arc<RwLock<WindowTracker>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    /// 무장 횟수 — 카운트다운 보존 검증용
    generation: u64,
}

impl Poller {
    pub fn new(signal: PollSignal, window: Arc<RwLock<WindowTracker>>) -> Self {
        Self {
            config: PollingConfig {
                enabled: false,
                interval_secs: PollingConfig::default().interval_secs,
            },
            initialized: false,
            signal,
            window,
            handle: None,
            generation: 0,
        }
    }

    /// 부팅 시 1회 등록 — 첫 호출만 적용되고 이후 호출은 무시
    pub fn init_configure(&mut self, enabled: bool, interval_secs: u64) {
        if self.initialized {
            tracing::debug!("[Poller] Already initialized, ignoring");
            return;
        }
        self.initialized = true;

        // 안전장치: 남아 있는 타이머가 있으면 제거
        self.disarm();
        self.config = PollingConfig {
            enabled,
            interval_secs,
        };
        if enabled {
            self.arm();
        }
    }

    /// 재설정. 설정이 그대로이고 enabled면 no-op — 살아있는
    /// 카운트다운을 리셋하지 않기 위함.
    pub fn configure(&mut self, enabled: bool, interval_secs: u64) {
        if self.handle.is_some()
            && enabled
            && self.config.enabled
            && self.config.interval_secs == interval_secs
        {
            tracing::debug!("[Poller] Config unchanged, keeping countdown");
            return;
        }

        self.disarm();
        self.config = PollingConfig {
            enabled,
            interval_secs,
        };
        if enabled {
            self.arm();
        }
    }

    fn arm(&mut self) {
        let period = self.config.period();
        let signal = self.signal.clone();
        let window = self.window.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                // 창이 떠 있으면(또는 없으면) 틱은 조용히 버려짐
                if window.read().await.eligible() {
                    signal.notify();
                } else {
                    tracing::debug!("[Poller] Tick dropped (window ineligible)");
                }
            }
        });

        self.handle = Some(handle);
        self.generation += 1;
        tracing::info!(
            "[Poller] Armed (every {}s)",
            self.config.interval_secs
        );
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::info!("[Poller] Disarmed");
        }
    }

    /// 프로세스 종료 경로에서 호출 — 타이머를 내리고 비활성으로 남김
    pub fn disarm_for_shutdown(&mut self) {
        self.config.enabled = false;
        self.disarm();
    }

    pub fn config(&self) -> PollingConfig {
        self.config
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// 현재까지의 무장 횟수. 같은 설정으로 재설정해도 증가하지 않아야 함.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.disarm();
    }
}
