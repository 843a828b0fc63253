//! 원격 애드온 API 클라이언트
//!
//! ## 구성
//! - `ApiClientConfig`: 프로세스 루트에서 명시적으로 만들어 전달하는
//!   클라이언트 설정 (전역 싱글턴 없음)
//! - `ApiUpdateSource`: 설치 목록 → 업데이트 목록 조회
//! - `ApiUpdater`: 업데이트 파일 다운로드 + 압축 해제 + 매니페스트 갱신
//!
//! 인증 토큰은 공유 핸들(`SharedToken`)에 있어, 데몬 IPC의
//! 토큰 설정/해제 엔드포인트가 실행 중에 갱신할 수 있습니다.

use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::AddonsError;
use crate::{AddonId, AddonPathResolver, AddonRecord, InstalledManifest, UpdateInfo};

/// 런타임에 갱신 가능한 베어러 토큰 핸들
pub type SharedToken = Arc<RwLock<Option<String>>>;

/// API 클라이언트 설정 — 명시적으로 생성해 전달
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    /// 요청 타임아웃 (기본 15초)
    pub timeout_secs: u64,
}

impl ApiClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: 15,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn build_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .user_agent("wowcui-core/0.1")
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .expect("Failed to create HTTP client")
    }
}

// ══════════════════════════════════════════════════════
// 콜라보레이터 계약
// ══════════════════════════════════════════════════════

/// 업데이트 소스: 설치 목록을 주면 id → 업데이트 메타데이터 맵 반환
pub trait UpdateSource: Send + Sync + 'static {
    fn look(
        &self,
        installed: &[AddonRecord],
    ) -> impl Future<Output = Result<HashMap<AddonId, UpdateInfo>, AddonsError>> + Send;
}

/// 업데이터: 애드온 한 개를 대상 버전으로 교체
///
/// 전달되는 레코드는 시퀀서가 대상 파일 id/버전으로 스테이징한
/// 상태입니다 (`main_file_id` = 받을 파일, `installed_version` = 목표 버전).
pub trait AddonUpdater: Send + Sync + 'static {
    fn update(
        &self,
        addon: AddonRecord,
    ) -> impl Future<Output = Result<(), AddonsError>> + Send;
}

// ══════════════════════════════════════════════════════
// 업데이트 조회
// ══════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct LookResponse {
    #[serde(default)]
    updates: HashMap<AddonId, UpdateInfo>,
}

/// 원격 API 기반 업데이트 소스
pub struct ApiUpdateSource {
    http: reqwest::Client,
    base_url: String,
    token: SharedToken,
}

impl ApiUpdateSource {
    pub fn new(config: &ApiClientConfig, token: SharedToken) -> Self {
        Self {
            http: config.build_client(),
            base_url: config.base_url.clone(),
            token,
        }
    }
}

impl UpdateSource for ApiUpdateSource {
    fn look(
        &self,
        installed: &[AddonRecord],
    ) -> impl Future<Output = Result<HashMap<AddonId, UpdateInfo>, AddonsError>> + Send {
        let body = serde_json::json!({ "addons": installed });
        let url = format!("{}/addons/updates", self.base_url);
        let http = self.http.clone();
        let token = self.token.clone();
        let empty = installed.is_empty();

        async move {
            if empty {
                return Ok(HashMap::new());
            }

            let mut req = http.post(&url).json(&body);
            if let Some(t) = token.read().await.as_deref() {
                req = req.bearer_auth(t);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| AddonsError::from_reqwest(&e, "update lookup"))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(AddonsError::Api {
                    status_code: status.as_u16(),
                    message: resp.text().await.unwrap_or_default(),
                });
            }

            let parsed: LookResponse = resp
                .json()
                .await
                .map_err(|e| AddonsError::from_reqwest(&e, "update lookup parse"))?;

            tracing::debug!(
                "[Source] Lookup returned {} update(s)",
                parsed.updates.len()
            );
            Ok(parsed.updates)
        }
    }
}

// ══════════════════════════════════════════════════════
// 업데이트 적용
// ══════════════════════════════════════════════════════

/// 원격 API 기반 업데이터 — zip 다운로드 후 애드온 디렉터리에 해제
pub struct ApiUpdater<R: AddonPathResolver> {
    http: reqwest::Client,
    base_url: String,
    token: SharedToken,
    resolver: Arc<R>,
}

impl<R: AddonPathResolver> ApiUpdater<R> {
    pub fn new(config: &ApiClientConfig, token: SharedToken, resolver: Arc<R>) -> Self {
        Self {
            http: config.build_client(),
            base_url: config.base_url.clone(),
            token,
            resolver,
        }
    }

    async fn download(&self, file_id: u64) -> Result<Vec<u8>, AddonsError> {
        let url = format!("{}/files/{}/download", self.base_url, file_id);
        let mut req = self.http.get(&url);
        if let Some(t) = self.token.read().await.as_deref() {
            req = req.bearer_auth(t);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AddonsError::from_reqwest(&e, "download"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AddonsError::Api {
                status_code: status.as_u16(),
                message: format!("download of file {} failed", file_id),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AddonsError::from_reqwest(&e, "download body"))?;
        Ok(bytes.to_vec())
    }
}

impl<R: AddonPathResolver> AddonUpdater for ApiUpdater<R> {
    fn update(
        &self,
        addon: AddonRecord,
    ) -> impl Future<Output = Result<(), AddonsError>> + Send {
        async move {
            let path = self.resolver.addons_path().await;
            if path.is_empty() {
                return Err(AddonsError::FileSystem {
                    operation: "update".to_string(),
                    path: String::new(),
                    message: "addons path not configured".to_string(),
                });
            }

            tracing::info!(
                "[Updater] Updating {} ({}) to {} via file {}",
                addon.name,
                addon.id,
                addon.installed_version,
                addon.main_file_id
            );

            let archive = self.download(addon.main_file_id).await?;
            extract_zip(&archive, Path::new(&path))?;

            let dir = Path::new(&path);
            let mut manifest = InstalledManifest::load(dir);
            manifest.set_version(&addon.id, &addon.installed_version);
            manifest.save(dir).map_err(|e| AddonsError::FileSystem {
                operation: "manifest save".to_string(),
                path: path.clone(),
                message: e.to_string(),
            })?;

            tracing::info!("[Updater] {} updated", addon.name);
            Ok(())
        }
    }
}

/// zip 아카이브를 대상 디렉터리에 해제. 디렉터리 탈출 엔트리는 거부.
fn extract_zip(data: &[u8], target: &Path) -> Result<(), AddonsError> {
    let reader = Cursor::new(data);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| AddonsError::Archive {
        path: target.display().to_string(),
        message: e.to_string(),
    })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| AddonsError::Archive {
            path: target.display().to_string(),
            message: e.to_string(),
        })?;

        let Some(rel) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(AddonsError::Archive {
                path: target.display().to_string(),
                message: format!("unsafe entry name: {}", entry.name()),
            });
        };
        let out_path = target.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| AddonsError::from_io(&e, "extract", &out_path.display().to_string()))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AddonsError::from_io(&e, "extract", &parent.display().to_string())
                })?;
            }
            let mut out = std::fs::File::create(&out_path)
                .map_err(|e| AddonsError::from_io(&e, "extract", &out_path.display().to_string()))?;
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| AddonsError::from_io(&e, "extract", &out_path.display().to_string()))?;
        }
    }

    Ok(())
}
