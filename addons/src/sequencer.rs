//! 업데이트 사이클 시퀀서
//!
//! ## 상태 기계
//! `Idle → Scanning → Diffing → Applying → Idle`.
//! 폴 신호 수신 시 한 사이클을 실행하며, 이미 진행 중이거나 애드온
//! 경로가 비어 있으면 `Idle → Idle`로 건너뜁니다. 기존 구현의
//! 플래그 3개 대신 단일 `CyclePhase` 값으로 가드합니다 — 사이클은
//! `Idle`에서만 시작할 수 있습니다.
//!
//! ## 적용 정책
//! 설치 목록에 없는 업데이트 대상이나 제외 목록의 애드온을 만났을 때:
//! - `AbortCycle`: 남은 적용 단계 전체를 즉시 중단 (기존 동작 재현,
//!   이미 디스패치된 업데이트는 롤백하지 않음)
//! - `SkipAddon`: 해당 항목만 건너뛰고 계속
//!
//! 애드온별 적용은 독립 태스크로 발사되며 합류 없이 사이클이 끝납니다.
//! 개별 실패는 형제 업데이트에 전파되지 않습니다.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AddonsError;
use crate::scanner::AddonScanner;
use crate::source::{AddonUpdater, UpdateSource};
use crate::{AddonId, AddonPathResolver, ExclusionSet};

/// 사이클 단계 — 단일 값으로 전이되는 가드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Scanning,
    Diffing,
    Applying,
}

/// 적용 단계에서 비정상 항목을 만났을 때의 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPolicy {
    /// 남은 적용 전체 중단 (기본값)
    AbortCycle,
    /// 해당 항목만 건너뜀
    SkipAddon,
}

/// 사이클이 건너뛰어진 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 애드온 경로 미설정 — 정상 상태, 에러 아님
    NoPath,
    /// 다른 사이클 진행 중
    Busy,
}

/// 적용 단계가 중단된 이유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// 업데이트 대상이 설치 목록에 없음
    MissingInstalled(AddonId),
    /// 업데이트 대상이 제외 목록에 있음
    Excluded(AddonId),
}

/// 한 사이클의 결과 — 에러가 아니라 데이터로 보고
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Completed { found: usize, dispatched: usize },
    Aborted { reason: AbortReason, dispatched: usize },
}

/// 사이클 상태 스냅샷 (IPC 상태 엔드포인트 노출용)
#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
    pub phase: CyclePhase,
    /// Scanning에 도달한 마지막 사이클의 시각 (RFC3339)
    pub last_check: Option<String>,
    pub installed_count: usize,
    pub updates_found: usize,
    pub last_outcome: Option<String>,
}

impl Default for CycleStatus {
    fn default() -> Self {
        Self {
            phase: CyclePhase::Idle,
            last_check: None,
            installed_count: 0,
            updates_found: 0,
            last_outcome: None,
        }
    }
}

/// 워커 업데이트 사이클 시퀀서
pub struct UpdateCycle<P, S, U, A>
where
    P: AddonPathResolver,
    S: AddonScanner,
    U: UpdateSource,
    A: AddonUpdater,
{
    resolver: Arc<P>,
    scanner: Arc<S>,
    source: Arc<U>,
    updater: Arc<A>,
    exclusions: Arc<RwLock<ExclusionSet>>,
    policy: ApplyPolicy,
    status: Arc<RwLock<CycleStatus>>,
}

impl<P, S, U, A> UpdateCycle<P, S, U, A>
where
    P: AddonPathResolver,
    S: AddonScanner,
    U: UpdateSource,
    A: AddonUpdater,
{
    pub fn new(
        resolver: Arc<P>,
        scanner: Arc<S>,
        source: Arc<U>,
        updater: Arc<A>,
        exclusions: Arc<RwLock<ExclusionSet>>,
    ) -> Self {
        Self {
            resolver,
            scanner,
            source,
            updater,
            exclusions,
            policy: ApplyPolicy::AbortCycle,
            status: Arc::new(RwLock::new(CycleStatus::default())),
        }
    }

    pub fn with_policy(mut self, policy: ApplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 상태 공유 핸들 — IPC 상태 조회 및 last_check 영속화에 사용
    pub fn status_handle(&self) -> Arc<RwLock<CycleStatus>> {
        self.status.clone()
    }

    async fn reset_to_idle(&self, outcome: Option<&CycleOutcome>) {
        let mut st = self.status.write().await;
        st.phase = CyclePhase::Idle;
        if let Some(o) = outcome {
            st.last_outcome = Some(format!("{:?}", o));
        }
    }

    /// 한 사이클 실행: 경로 확인 → 가드 → 스캔 → 비교 → 적용.
    ///
    /// 스캔/비교 실패는 `Err`로 전파됩니다 (재시도는 다음 틱에만).
    /// 적용 단계의 중단은 에러가 아니라 `CycleOutcome::Aborted`입니다.
    pub async fn run(&self) -> Result<CycleOutcome, AddonsError> {
        // 1. 경로 확인 — 비어 있으면 정상 스킵
        let path = self.resolver.addons_path().await;
        if path.is_empty() {
            tracing::debug!("[Cycle] Addons path not configured, skipping");
            return Ok(CycleOutcome::Skipped(SkipReason::NoPath));
        }

        // 2. 가드 — Idle에서만 시작, 상태는 건드리지 않고 스킵
        {
            let mut st = self.status.write().await;
            if st.phase != CyclePhase::Idle {
                tracing::debug!("[Cycle] Cycle already in {:?}, skipping", st.phase);
                return Ok(CycleOutcome::Skipped(SkipReason::Busy));
            }
            // 3. 스캔 진입 — 이전 결과 비우고 체크 시각 기록
            st.phase = CyclePhase::Scanning;
            st.last_check = Some(Utc::now().to_rfc3339());
            st.updates_found = 0;
        }

        let installed = match self.scanner.scan(&path).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("[Cycle] Scan failed: {}", e);
                self.reset_to_idle(None).await;
                return Err(e);
            }
        };

        // 4. 비교
        {
            let mut st = self.status.write().await;
            st.phase = CyclePhase::Diffing;
            st.installed_count = installed.len();
        }

        let updates = match self.source.look(&installed).await {
            Ok(map) => map,
            Err(e) => {
                tracing::error!("[Cycle] Update lookup failed: {}", e);
                self.reset_to_idle(None).await;
                return Err(e);
            }
        };

        {
            let mut st = self.status.write().await;
            st.updates_found = updates.len();
        }

        let found = updates.len();
        let mut dispatched = 0usize;
        let mut abort: Option<AbortReason> = None;

        // 5. 적용
        if !updates.is_empty() {
            {
                let mut st = self.status.write().await;
                st.phase = CyclePhase::Applying;
            }

            let exclusions = self.exclusions.read().await.clone();

            // id 정렬 순회 — 중단 동작을 결정적으로
            let mut ids: Vec<AddonId> = updates.keys().cloned().collect();
            ids.sort();

            for id in ids {
                let info = &updates[&id];

                let Some(record) = installed.iter().find(|r| r.id == id) else {
                    tracing::warn!("[Cycle] Update target {} not in installed set", id);
                    match self.policy {
                        ApplyPolicy::AbortCycle => {
                            abort = Some(AbortReason::MissingInstalled(id));
                            break;
                        }
                        ApplyPolicy::SkipAddon => continue,
                    }
                };

                if exclusions.contains(&record.id) {
                    tracing::info!("[Cycle] {} is excluded from auto-update", record.name);
                    match self.policy {
                        ApplyPolicy::AbortCycle => {
                            abort = Some(AbortReason::Excluded(id));
                            break;
                        }
                        ApplyPolicy::SkipAddon => continue,
                    }
                }

                // 대상 파일/버전으로 스테이징된 레코드를 독립 디스패치.
                // 합류 없음 — 사이클은 완료를 기다리지 않음.
                let mut staged = record.clone();
                staged.main_file_id = info.file_id;
                staged.installed_version = info.version.clone();

                let updater = Arc::clone(&self.updater);
                tokio::spawn(async move {
                    let name = staged.name.clone();
                    if let Err(e) = updater.update(staged).await {
                        tracing::warn!("[Cycle] Update dispatch failed for {}: {}", name, e);
                    }
                });
                dispatched += 1;
            }
        }

        let outcome = match abort {
            Some(reason) => CycleOutcome::Aborted { reason, dispatched },
            None => CycleOutcome::Completed { found, dispatched },
        };

        tracing::info!(
            "[Cycle] Done: {} installed, {} update(s), {} dispatched",
            installed.len(),
            found,
            dispatched
        );
        self.reset_to_idle(Some(&outcome)).await;
        Ok(outcome)
    }
}
