//! GUI ↔ 데몬 IPC HTTP 서버
//!
//! GUI 셸이 로컬 HTTP로 보내는 메시지를 처리합니다.
//!
//! ## 폴링 메시지 계약
//! - `POST /api/updates/poll/init` — 부팅 등록. 최초 1회만 적용.
//! - `POST /api/updates/poll/config` — 재설정. 같은 설정이면
//!   진행 중인 카운트다운을 유지.
//! - `POST /api/updates/check` — 수동 확인. 창 상태와 무관하게
//!   워커에 폴 신호를 보냄 (단방향, 응답은 발송 여부만).
//!
//! 두 설정 메시지의 페이로드는 `{ lookForUpdates, checkInterval }`.

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use wowcui_addons_lib::{CycleStatus, ExclusionSet, PollSignal, SharedToken};

use crate::config::Settings;
use crate::error::DaemonError;
use crate::poller::Poller;
use crate::window::WindowTracker;

/// 폴링 설정 페이로드 (init / config 공용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfigRequest {
    #[serde(rename = "lookForUpdates")]
    pub look_for_updates: bool,
    #[serde(rename = "checkInterval")]
    pub check_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStateRequest {
    pub attached: bool,
    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// 설정 부분 업데이트 — 보낸 필드만 반영
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub look_for_updates: Option<bool>,
    pub check_interval: Option<u64>,
    pub excluded: Option<Vec<String>>,
    pub addons_path: Option<String>,
    pub minimize_to_tray: Option<bool>,
}

/// IPC 핸들러가 공유하는 데몬 상태
#[derive(Clone)]
pub struct DaemonState {
    pub poller: Arc<RwLock<Poller>>,
    pub window: Arc<RwLock<WindowTracker>>,
    pub settings: Arc<RwLock<Settings>>,
    pub exclusions: Arc<RwLock<ExclusionSet>>,
    pub cycle_status: Arc<RwLock<CycleStatus>>,
    pub signal: PollSignal,
    pub auth_token: SharedToken,
}

impl DaemonState {
    /// 폴링 설정을 settings에 반영하고 디스크에 저장
    async fn persist_poll_config(&self, enabled: bool, interval: u64) -> Result<(), DaemonError> {
        let mut settings = self.settings.write().await;
        settings.look_for_updates = enabled;
        settings.check_interval = interval;
        settings
            .save()
            .map_err(|e| DaemonError::Settings(e.to_string()))
    }
}

/// 라우터 생성 — 통합 테스트에서 서버 없이 직접 사용
pub fn router(state: DaemonState) -> Router {
    Router::new()
        .route("/api/updates/poll/init", post(init_poll))
        .route(
            "/api/updates/poll/config",
            get(get_poll_config).post(set_poll_config),
        )
        .route("/api/updates/check", post(check_now))
        .route("/api/updates/status", get(get_update_status))
        .route("/api/window/state", post(set_window_state))
        .route("/api/settings", get(get_settings).put(patch_settings))
        .route("/api/auth/token", post(set_token).delete(clear_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// IPC Server
pub struct IpcServer {
    state: DaemonState,
    listen_addr: String,
}

impl IpcServer {
    pub fn new(state: DaemonState, listen_addr: &str) -> Self {
        Self {
            state,
            listen_addr: listen_addr.to_string(),
        }
    }

    pub async fn start(self) -> Result<()> {
        tracing::info!("IPC HTTP server starting on {}", self.listen_addr);

        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("IPC listening on http://{}", self.listen_addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn validate_interval(check_interval: u64) -> Result<(), DaemonError> {
    if check_interval == 0 {
        return Err(DaemonError::InvalidConfig(
            "checkInterval must be positive".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/updates/poll/init - 부팅 등록 (최초 1회만 적용)
async fn init_poll(
    State(state): State<DaemonState>,
    Json(req): Json<PollConfigRequest>,
) -> Result<impl IntoResponse, DaemonError> {
    validate_interval(req.check_interval)?;

    let mut poller = state.poller.write().await;
    poller.init_configure(req.look_for_updates, req.check_interval);
    let config = poller.config();

    Ok(Json(json!({
        "success": true,
        "lookForUpdates": config.enabled,
        "checkInterval": config.interval_secs,
    })))
}

/// POST /api/updates/poll/config - 폴링 재설정
async fn set_poll_config(
    State(state): State<DaemonState>,
    Json(req): Json<PollConfigRequest>,
) -> Result<impl IntoResponse, DaemonError> {
    validate_interval(req.check_interval)?;

    {
        let mut poller = state.poller.write().await;
        poller.configure(req.look_for_updates, req.check_interval);
    }
    state
        .persist_poll_config(req.look_for_updates, req.check_interval)
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// GET /api/updates/poll/config - 현재 폴링 설정 조회
async fn get_poll_config(State(state): State<DaemonState>) -> impl IntoResponse {
    let poller = state.poller.read().await;
    let config = poller.config();

    Json(json!({
        "lookForUpdates": config.enabled,
        "checkInterval": config.interval_secs,
        "armed": poller.is_armed(),
    }))
}

/// POST /api/updates/check - 수동 업데이트 확인
///
/// 신호는 단방향입니다. 워커가 바쁘거나 경로가 비어 있으면 그쪽에서
/// 조용히 스킵되고, 여기서는 발송 여부만 응답합니다.
async fn check_now(State(state): State<DaemonState>) -> impl IntoResponse {
    state.signal.notify();
    Json(json!({ "success": true, "dispatched": true }))
}

/// GET /api/updates/status - 사이클 상태 스냅샷
async fn get_update_status(State(state): State<DaemonState>) -> impl IntoResponse {
    let status = state.cycle_status.read().await.clone();
    let poller = state.poller.read().await;
    let config = poller.config();

    Json(json!({
        "cycle": status,
        "polling": {
            "lookForUpdates": config.enabled,
            "checkInterval": config.interval_secs,
            "armed": poller.is_armed(),
        },
    }))
}

/// POST /api/window/state - GUI 창 생성/표시 상태 보고
async fn set_window_state(
    State(state): State<DaemonState>,
    Json(req): Json<WindowStateRequest>,
) -> impl IntoResponse {
    let mut window = state.window.write().await;
    window.set_state(req.attached, req.visible);
    tracing::debug!(
        "[IPC] Window state: attached={}, visible={}",
        window.attached,
        window.visible
    );

    Json(json!({ "success": true }))
}

/// GET /api/settings - 설정 전체 조회
async fn get_settings(State(state): State<DaemonState>) -> impl IntoResponse {
    let settings = state.settings.read().await.clone();
    Json(settings)
}

/// PUT /api/settings - 설정 부분 업데이트
///
/// 제외 목록 변경은 워커의 제외 집합에, 폴링 필드 변경은 Poller에
/// 즉시 반영합니다.
async fn patch_settings(
    State(state): State<DaemonState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<impl IntoResponse, DaemonError> {
    if let Some(interval) = patch.check_interval {
        validate_interval(interval)?;
    }

    let updated = {
        let mut settings = state.settings.write().await;
        if let Some(v) = patch.look_for_updates {
            settings.look_for_updates = v;
        }
        if let Some(v) = patch.check_interval {
            settings.check_interval = v;
        }
        if let Some(v) = patch.excluded.clone() {
            settings.excluded = v;
        }
        if let Some(v) = patch.addons_path.clone() {
            settings.addons_path = v;
        }
        if let Some(v) = patch.minimize_to_tray {
            settings.minimize_to_tray = v;
        }
        settings
            .save()
            .map_err(|e| DaemonError::Settings(e.to_string()))?;
        settings.clone()
    };

    if let Some(excluded) = patch.excluded {
        state.exclusions.write().await.replace(excluded);
    }

    if patch.look_for_updates.is_some() || patch.check_interval.is_some() {
        let mut poller = state.poller.write().await;
        poller.configure(updated.look_for_updates, updated.check_interval);
    }

    Ok(Json(json!({ "success": true })))
}

/// POST /api/auth/token - 인증 토큰 설정
async fn set_token(
    State(state): State<DaemonState>,
    Json(req): Json<TokenRequest>,
) -> impl IntoResponse {
    if req.token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "token must not be empty" })),
        )
            .into_response();
    }

    *state.auth_token.write().await = Some(req.token);
    tracing::info!("[IPC] Auth token set");
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

/// DELETE /api/auth/token - 인증 토큰 해제
async fn clear_token(State(state): State<DaemonState>) -> impl IntoResponse {
    *state.auth_token.write().await = None;
    tracing::info!("[IPC] Auth token cleared");
    Json(json!({ "success": true }))
}
