mod config;
mod error;
mod ipc;
mod poller;
mod window;
mod worker;

use std::sync::Arc;
use tokio::sync::RwLock;

use wowcui_addons_lib::{
    poll_channel, ApiClientConfig, ApiUpdateSource, ApiUpdater, DirScanner, ExclusionSet,
    SharedToken, UpdateCycle,
};

use config::{Settings, SettingsPathResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("Core Daemon starting");

    // 설정 로드 — 파일이 없으면 기본값으로 시작
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Settings::default()
        }
    };
    let api_config =
        ApiClientConfig::new(&settings.api_base_url).with_timeout(settings.api_timeout_secs);
    let excluded = settings.excluded.clone();
    let look_for_updates = settings.look_for_updates;
    let check_interval = settings.check_interval;
    let settings = Arc::new(RwLock::new(settings));

    // 공유 상태
    let window = Arc::new(RwLock::new(window::WindowTracker::default()));
    let exclusions = Arc::new(RwLock::new(ExclusionSet::from_ids(excluded)));
    let auth_token: SharedToken = Arc::new(RwLock::new(None));
    let (signal, poll_rx) = poll_channel();

    // 워커 사이클 조립
    let resolver = Arc::new(SettingsPathResolver::new(settings.clone()));
    let cycle = Arc::new(UpdateCycle::new(
        resolver.clone(),
        Arc::new(DirScanner),
        Arc::new(ApiUpdateSource::new(&api_config, auth_token.clone())),
        Arc::new(ApiUpdater::new(&api_config, auth_token.clone(), resolver)),
        exclusions.clone(),
    ));
    let cycle_status = cycle.status_handle();

    tokio::spawn(worker::run_worker_loop(
        poll_rx,
        cycle,
        settings.clone(),
    ));

    // 폴링 타이머 — 저장된 설정으로 부팅 등록. GUI가 다시
    // init을 보내도 이 등록이 우선.
    let mut poller = poller::Poller::new(signal.clone(), window.clone());
    poller.init_configure(look_for_updates, check_interval);
    let poller = Arc::new(RwLock::new(poller));

    // Graceful shutdown: Ctrl+C / SIGTERM 시 정리
    let poller_shutdown = poller.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received, cleaning up...");
        poller_shutdown.write().await.disarm_for_shutdown();
        tracing::info!("Cleanup complete, exiting");
        std::process::exit(0);
    });

    // IPC HTTP server
    let state = ipc::DaemonState {
        poller,
        window,
        settings,
        exclusions,
        cycle_status,
        signal,
        auth_token,
    };
    let listen_addr =
        std::env::var("WOWCUI_IPC_ADDR").unwrap_or_else(|_| "127.0.0.1:57484".to_string());
    let ipc_server = ipc::IpcServer::new(state, &listen_addr);

    if let Err(e) = ipc_server.start().await {
        tracing::error!("IPC server error: {}", e);
    }

    tracing::info!("Core Daemon shutting down");
    Ok(())
}
