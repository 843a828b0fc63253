//! 워커 루프 — 폴 신호를 받아 업데이트 사이클을 구동
//!
//! 컨트롤러(타이머/IPC)가 보낸 신호마다 사이클 하나를 실행합니다.
//! 사이클이 Scanning에 도달했으면 체크 시각을 설정 파일에 영속화하여
//! 재시작 후에도 "마지막 확인" 표시가 유지되게 합니다.

use std::sync::Arc;
use tokio::sync::RwLock;

use wowcui_addons_lib::{
    AddonPathResolver, AddonScanner, AddonUpdater, CycleOutcome, PollReceiver, UpdateCycle,
    UpdateSource,
};

use crate::config::Settings;

/// 신호 수신 → 사이클 실행 루프. 신호 채널이 닫히면 종료.
pub async fn run_worker_loop<P, S, U, A>(
    mut rx: PollReceiver,
    cycle: Arc<UpdateCycle<P, S, U, A>>,
    settings: Arc<RwLock<Settings>>,
) where
    P: AddonPathResolver,
    S: AddonScanner,
    U: UpdateSource,
    A: AddonUpdater,
{
    tracing::info!("[Worker] Update worker started");

    while rx.recv().await.is_some() {
        match cycle.run().await {
            Ok(CycleOutcome::Skipped(reason)) => {
                tracing::debug!("[Worker] Cycle skipped: {:?}", reason);
            }
            Ok(outcome) => {
                persist_last_check(&cycle, &settings).await;
                tracing::debug!("[Worker] Cycle finished: {:?}", outcome);
            }
            Err(e) => {
                // 다음 틱에 자연 재시도 — 여기서는 기록만
                persist_last_check(&cycle, &settings).await;
                tracing::warn!("[Worker] Cycle failed: {}", e);
            }
        }
    }

    tracing::info!("[Worker] Signal channel closed, worker stopping");
}

async fn persist_last_check<P, S, U, A>(
    cycle: &UpdateCycle<P, S, U, A>,
    settings: &Arc<RwLock<Settings>>,
) where
    P: AddonPathResolver,
    S: AddonScanner,
    U: UpdateSource,
    A: AddonUpdater,
{
    let last_check = cycle.status_handle().read().await.last_check.clone();
    let Some(last_check) = last_check else {
        return;
    };

    let mut settings = settings.write().await;
    settings.last_check = Some(last_check);
    if let Err(e) = settings.save() {
        tracing::warn!("[Worker] Failed to persist last check time: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::future::Future;
    use tokio::time::{timeout, Duration};
    use wowcui_addons_lib::{
        poll_channel, AddonId, AddonRecord, AddonsError, ExclusionSet, FixedPathResolver,
        UpdateInfo,
    };

    struct EmptyScanner;
    impl AddonScanner for EmptyScanner {
        fn scan(
            &self,
            _path: &str,
        ) -> impl Future<Output = Result<Vec<AddonRecord>, AddonsError>> + Send {
            async { Ok(Vec::new()) }
        }
    }

    struct EmptySource;
    impl UpdateSource for EmptySource {
        fn look(
            &self,
            _installed: &[AddonRecord],
        ) -> impl Future<Output = Result<HashMap<AddonId, UpdateInfo>, AddonsError>> + Send
        {
            async { Ok(HashMap::new()) }
        }
    }

    struct NoopUpdater;
    impl AddonUpdater for NoopUpdater {
        fn update(
            &self,
            _addon: AddonRecord,
        ) -> impl Future<Output = Result<(), AddonsError>> + Send {
            async { Ok(()) }
        }
    }

    #[tokio::test]
    async fn test_signal_drives_cycle_and_records_check_time() {
        let (signal, rx) = poll_channel();
        let cycle = Arc::new(UpdateCycle::new(
            Arc::new(FixedPathResolver("/tmp".to_string())),
            Arc::new(EmptyScanner),
            Arc::new(EmptySource),
            Arc::new(NoopUpdater),
            Arc::new(RwLock::new(ExclusionSet::default())),
        ));
        let status = cycle.status_handle();
        let dir = tempfile::TempDir::new().unwrap();
        let mut stored = Settings::default();
        stored.config_path = Some(dir.path().join("settings.toml"));
        let settings = Arc::new(RwLock::new(stored));

        let worker = tokio::spawn(run_worker_loop(rx, cycle, settings.clone()));

        signal.notify();

        // 사이클이 돌아 last_check가 기록될 때까지 대기
        let recorded = timeout(Duration::from_secs(2), async {
            loop {
                if status.read().await.last_check.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(recorded.is_ok());

        drop(signal);
        let _ = timeout(Duration::from_secs(2), worker).await;

        // 체크 시각이 설정에 영속화됨
        assert!(settings.read().await.last_check.is_some());
        assert!(dir.path().join("settings.toml").exists());
    }
}
