/// 폴링 메시지 계약 통합 테스트
///
/// IPC 라우터를 서버 기동 없이 직접 호출하여 컨트롤러(타이머)와
/// 워커(사이클) 사이의 전체 흐름을 검증합니다.
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};
use tower::ServiceExt;

use wowcui_addons_lib::{
    poll_channel, AddonId, AddonRecord, AddonScanner, AddonUpdater, AddonsError, ExclusionSet,
    PollReceiver, UpdateCycle, UpdateInfo, UpdateSource,
};
use wowcui_core::config::{Settings, SettingsPathResolver};
use wowcui_core::ipc::{router, DaemonState};
use wowcui_core::poller::Poller;
use wowcui_core::window::WindowTracker;
use wowcui_core::worker::run_worker_loop;

// ── 모의 콜라보레이터 ──────────────────────────────────

struct StaticScanner(Vec<AddonRecord>);

impl AddonScanner for StaticScanner {
    fn scan(
        &self,
        _path: &str,
    ) -> impl Future<Output = Result<Vec<AddonRecord>, AddonsError>> + Send {
        let records = self.0.clone();
        async move { Ok(records) }
    }
}

struct StaticSource(HashMap<AddonId, UpdateInfo>);

impl UpdateSource for StaticSource {
    fn look(
        &self,
        _installed: &[AddonRecord],
    ) -> impl Future<Output = Result<HashMap<AddonId, UpdateInfo>, AddonsError>> + Send {
        let updates = self.0.clone();
        async move { Ok(updates) }
    }
}

struct RecordingUpdater(tokio::sync::mpsc::UnboundedSender<AddonRecord>);

impl AddonUpdater for RecordingUpdater {
    fn update(
        &self,
        addon: AddonRecord,
    ) -> impl Future<Output = Result<(), AddonsError>> + Send {
        let tx = self.0.clone();
        async move {
            let _ = tx.send(addon);
            Ok(())
        }
    }
}

fn record(id: &str, name: &str, folders: &[&str]) -> AddonRecord {
    AddonRecord {
        id: id.into(),
        name: name.to_string(),
        main_file_id: 1,
        installed_version: "1.0.0".to_string(),
        folders: folders.iter().map(|s| s.to_string()).collect(),
    }
}

// ── 테스트 하네스 ──────────────────────────────────────

struct Harness {
    state: DaemonState,
    dispatched_rx: tokio::sync::mpsc::UnboundedReceiver<AddonRecord>,
    _settings_dir: tempfile::TempDir,
}

/// 전체 데몬 배선: IPC 상태 + 워커 루프 + 모의 콜라보레이터
fn harness(installed: Vec<AddonRecord>, updates: HashMap<AddonId, UpdateInfo>) -> Harness {
    let dir = tempfile::TempDir::new().unwrap();
    let mut stored = Settings::default();
    stored.addons_path = dir.path().to_string_lossy().to_string();
    stored.config_path = Some(dir.path().join("settings.toml"));
    let settings = Arc::new(RwLock::new(stored));

    let window = Arc::new(RwLock::new(WindowTracker::default()));
    let exclusions = Arc::new(RwLock::new(ExclusionSet::default()));
    let auth_token = Arc::new(RwLock::new(None));
    let (signal, rx) = poll_channel();

    let (tx, dispatched_rx) = tokio::sync::mpsc::unbounded_channel();
    let cycle = Arc::new(UpdateCycle::new(
        Arc::new(SettingsPathResolver::new(settings.clone())),
        Arc::new(StaticScanner(installed)),
        Arc::new(StaticSource(updates)),
        Arc::new(RecordingUpdater(tx)),
        exclusions.clone(),
    ));
    let cycle_status = cycle.status_handle();

    tokio::spawn(run_worker_loop(rx, cycle, settings.clone()));

    let poller = Arc::new(RwLock::new(Poller::new(signal.clone(), window.clone())));

    let state = DaemonState {
        poller,
        window,
        settings,
        exclusions,
        cycle_status,
        signal,
        auth_token,
    };

    Harness {
        state,
        dispatched_rx,
        _settings_dir: dir,
    }
}

/// 워커 루프 없이 IPC만 배선 (타이머 설정 전용 테스트)
fn harness_without_worker() -> (Harness, PollReceiver) {
    let mut h = harness(Vec::new(), HashMap::new());
    // 기존 신호 채널 대신 새 채널을 달아 워커 루프와 분리
    let (signal, rx) = poll_channel();
    h.state.signal = signal.clone();
    let window = h.state.window.clone();
    h.state.poller = Arc::new(RwLock::new(Poller::new(signal, window)));
    (h, rx)
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// ── 타이머 설정 계약 ───────────────────────────────────

#[tokio::test]
async fn test_init_poll_applies_only_first_call() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/updates/poll/init",
        json!({ "lookForUpdates": true, "checkInterval": 1800 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 두 번째 부팅 등록은 무시됨
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/updates/poll/init",
        json!({ "lookForUpdates": false, "checkInterval": 60 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, config) = get_json(&app, "/api/updates/poll/config").await;
    assert_eq!(config["lookForUpdates"], true);
    assert_eq!(config["checkInterval"], 1800);
    assert_eq!(config["armed"], true);
}

#[tokio::test]
async fn test_reconfigure_same_values_keeps_countdown() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    let body = json!({ "lookForUpdates": true, "checkInterval": 3600 });
    let (status, _) = send_json(&app, "POST", "/api/updates/poll/config", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let g1 = h.state.poller.read().await.generation();

    // 동일 설정 재전송 — 타이머가 다시 무장되지 않아야 함
    let (status, _) = send_json(&app, "POST", "/api/updates/poll/config", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.state.poller.read().await.generation(), g1);

    // 간격이 바뀌면 재무장
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/updates/poll/config",
        json!({ "lookForUpdates": true, "checkInterval": 600 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.state.poller.read().await.generation(), g1 + 1);
}

#[tokio::test]
async fn test_disable_polling_disarms() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    send_json(
        &app,
        "POST",
        "/api/updates/poll/config",
        json!({ "lookForUpdates": true, "checkInterval": 3600 }),
    )
    .await;
    assert!(h.state.poller.read().await.is_armed());

    send_json(
        &app,
        "POST",
        "/api/updates/poll/config",
        json!({ "lookForUpdates": false, "checkInterval": 3600 }),
    )
    .await;
    assert!(!h.state.poller.read().await.is_armed());
}

#[tokio::test]
async fn test_zero_interval_rejected() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/updates/poll/config",
        json!({ "lookForUpdates": true, "checkInterval": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_CONFIG");
}

// ── 수동 확인 → 사이클 전체 흐름 ───────────────────────

#[tokio::test]
async fn test_manual_check_dispatches_update() {
    let mut updates = HashMap::new();
    updates.insert(
        AddonId::from("42"),
        UpdateInfo {
            version: "2.0.0".to_string(),
            file_id: 9001,
            file_url: None,
        },
    );
    let mut h = harness(vec![record("42", "DBM", &["DBM-Core"])], updates);
    let app = router(h.state.clone());

    let (status, body) = send_json(&app, "POST", "/api/updates/check", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // 워커가 사이클을 돌려 업데이트를 디스패치
    let dispatched = timeout(Duration::from_secs(2), h.dispatched_rx.recv())
        .await
        .expect("cycle did not dispatch in time")
        .unwrap();
    assert_eq!(dispatched.id, AddonId::from("42"));
    assert_eq!(dispatched.installed_version, "2.0.0");
    assert_eq!(dispatched.main_file_id, 9001);
}

#[tokio::test]
async fn test_status_reports_last_check_after_cycle() {
    let mut h = harness(Vec::new(), HashMap::new());
    let app = router(h.state.clone());

    let (_, before) = get_json(&app, "/api/updates/status").await;
    assert!(before["cycle"]["last_check"].is_null());

    send_json(&app, "POST", "/api/updates/check", json!({})).await;

    // 사이클이 Scanning에 도달하면 last_check가 기록됨
    let recorded = timeout(Duration::from_secs(2), async {
        loop {
            let (_, status) = get_json(&app, "/api/updates/status").await;
            if !status["cycle"]["last_check"].is_null() {
                break status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("last_check was never recorded");
    assert_eq!(recorded["cycle"]["phase"], "idle");

    drop(h.dispatched_rx);
}

// ── 창 상태 / 설정 / 토큰 ──────────────────────────────

#[tokio::test]
async fn test_window_state_updates_tracker() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/window/state",
        json!({ "attached": true, "visible": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.state.window.read().await.eligible());

    send_json(
        &app,
        "POST",
        "/api/window/state",
        json!({ "attached": true, "visible": true }),
    )
    .await;
    assert!(!h.state.window.read().await.eligible());
}

#[tokio::test]
async fn test_settings_patch_syncs_exclusions() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    let (status, _) = send_json(
        &app,
        "PUT",
        "/api/settings",
        json!({ "excluded": ["7", "13"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let exclusions = h.state.exclusions.read().await;
    assert_eq!(exclusions.len(), 2);
    assert!(exclusions.contains(&AddonId::from("7")));
    assert!(exclusions.contains(&AddonId::from(13u64)));
}

#[tokio::test]
async fn test_token_set_and_clear() {
    let (h, _rx) = harness_without_worker();
    let app = router(h.state.clone());

    let (status, _) = send_json(&app, "POST", "/api/auth/token", json!({ "token": "abc" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.state.auth_token.read().await.as_deref(), Some("abc"));

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/auth/token")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.state.auth_token.read().await.is_none());

    // 빈 토큰은 거부
    let (status, _) = send_json(&app, "POST", "/api/auth/token", json!({ "token": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
