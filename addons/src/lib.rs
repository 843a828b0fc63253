//! # wowcui 애드온 라이브러리
//!
//! 설치된 WoW 애드온의 스캔, 업데이트 확인, 자동 적용을 담당합니다.
//! 코어 데몬의 워커 태스크가 이 크레이트의 시퀀서를 구동합니다.
//!
//! ## 아키텍처
//! 컨트롤러(타이머)와 워커(사이클)를 분리한 폴링 파이프라인:
//! - **시그널(signal.rs)**: 컨트롤러 → 워커 단방향 폴 신호, 비차단 전송
//! - **시퀀서(sequencer.rs)**: Idle → Scanning → Diffing → Applying 상태 기계,
//!   사이클당 하나만 실행되도록 단일 상태 값으로 가드
//! - **스캐너(scanner.rs)**: 애드온 디렉터리 스캔, 설치 매니페스트 조인
//! - **소스(source.rs)**: 원격 API 업데이트 조회 및 다운로드/적용 클라이언트
//! - **에러(error.rs)**: 네트워크/파일시스템 장애 분류
//!
//! ## 설치 매니페스트
//! 애드온 디렉터리에 `.wowcui-installed.json` 파일을 유지합니다:
//! ```json
//! {
//!   "addons": {
//!     "42": { "name": "DBM", "version": "1.13.2", "mainFileId": 9001, "folders": ["DBM-Core"] }
//!   }
//! }
//! ```
//! 키는 정규화된 애드온 id 문자열입니다. 스캐너는 이 매니페스트를
//! 디렉터리 내용과 조인하여 `AddonRecord`를 만들고, 업데이터는 적용 후
//! 버전을 갱신합니다.

pub mod error;
pub mod scanner;
pub mod sequencer;
pub mod signal;
pub mod source;


// Re-exports for convenience
pub use error::AddonsError;
pub use scanner::{AddonScanner, DirScanner};
pub use sequencer::{
    AbortReason, ApplyPolicy, CycleOutcome, CyclePhase, CycleStatus, SkipReason, UpdateCycle,
};
pub use signal::{poll_channel, PollReceiver, PollRequest, PollSignal};
pub use source::{
    AddonUpdater, ApiClientConfig, ApiUpdateSource, ApiUpdater, SharedToken, UpdateSource,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;

// ══════════════════════════════════════════════════════
// 애드온 식별자
// ══════════════════════════════════════════════════════

/// 정규화된 애드온 식별자.
///
/// 원격 API는 id를 숫자로도, 문자열로도 내려줍니다. 경계에서 전부
/// 문자열 한 가지 표현으로 정규화하여, 내부에서는 느슨한 비교 없이
/// `==`로만 비교합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawAddonId")]
pub struct AddonId(String);

/// 역직렬화 전용 — 숫자/문자열 양쪽 표현 수용
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddonId {
    Num(u64),
    Str(String),
}

impl From<RawAddonId> for AddonId {
    fn from(raw: RawAddonId) -> Self {
        match raw {
            RawAddonId::Num(n) => AddonId(n.to_string()),
            RawAddonId::Str(s) => AddonId(s),
        }
    }
}

impl AddonId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for AddonId {
    fn from(n: u64) -> Self {
        AddonId(n.to_string())
    }
}

impl From<&str> for AddonId {
    fn from(s: &str) -> Self {
        AddonId(s.to_string())
    }
}

impl From<String> for AddonId {
    fn from(s: String) -> Self {
        AddonId(s)
    }
}

impl fmt::Display for AddonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ══════════════════════════════════════════════════════
// 코어 타입
// ══════════════════════════════════════════════════════

/// 설치된 애드온 한 개 — 스캐너가 생성, 시퀀서가 소비
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonRecord {
    pub id: AddonId,
    pub name: String,
    /// 업데이트 대상 파일 id (적용 시 다운로드할 파일)
    pub main_file_id: u64,
    pub installed_version: String,
    /// 이 애드온이 차지하는 폴더 이름들
    pub folders: Vec<String>,
}

/// 업데이트 소스가 내려주는 애드온별 업데이트 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub version: String,
    pub file_id: u64,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// 자동 업데이트 제외 목록 — 시퀀서 입장에서는 읽기 전용
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet(std::collections::HashSet<AddonId>);

impl ExclusionSet {
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<AddonId>,
    {
        ExclusionSet(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, id: &AddonId) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: AddonId) {
        self.0.insert(id);
    }

    /// 전체 교체 (설정 변경 반영)
    pub fn replace<I, T>(&mut self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<AddonId>,
    {
        self.0 = ids.into_iter().map(Into::into).collect();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ══════════════════════════════════════════════════════
// 설치 매니페스트
// ══════════════════════════════════════════════════════

/// 매니페스트 내 애드온 한 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledEntry {
    pub name: String,
    pub version: String,
    pub main_file_id: u64,
    pub folders: Vec<String>,
}

/// 애드온 디렉터리에 저장되는 설치 매니페스트
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstalledManifest {
    /// 정규화된 id 문자열 → 설치 정보
    #[serde(default)]
    pub addons: HashMap<String, InstalledEntry>,
}

impl InstalledManifest {
    pub const FILE_NAME: &'static str = ".wowcui-installed.json";

    /// 디렉터리에서 매니페스트 로드. 없거나 깨졌으면 빈 매니페스트.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(Self::FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("[Manifest] Failed to parse {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join(Self::FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// 적용 완료 후 버전 갱신
    pub fn set_version(&mut self, id: &AddonId, version: &str) {
        if let Some(entry) = self.addons.get_mut(id.as_str()) {
            entry.version = version.to_string();
        }
    }
}

// ══════════════════════════════════════════════════════
// 콜라보레이터 계약
// ══════════════════════════════════════════════════════

/// 애드온 설치 경로 제공자. 빈 문자열이면 "아직 설정 안 됨".
pub trait AddonPathResolver: Send + Sync + 'static {
    fn addons_path(&self) -> impl Future<Output = String> + Send;
}

/// 고정 경로 리졸버 — 테스트 및 단순 구성용
#[derive(Debug, Clone)]
pub struct FixedPathResolver(pub String);

impl AddonPathResolver for FixedPathResolver {
    fn addons_path(&self) -> impl Future<Output = String> + Send {
        let path = self.0.clone();
        async move { path }
    }
}
