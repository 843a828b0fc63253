//! 설정 저장소
//!
//! `config/settings.toml`에 사용자 설정을 유지합니다. 탐색 순서는
//! 실행 파일 옆 → CWD. 폴링 설정(lookForUpdates/checkInterval)의
//! 런타임 반영은 Poller가 담당하고, 여기는 영속화만 맡습니다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use wowcui_addons_lib::AddonPathResolver;

fn default_true() -> bool {
    true
}

fn default_check_interval() -> u64 {
    3600
}

fn default_api_base_url() -> String {
    "https://wowclassicui.com/api".to_string()
}

fn default_api_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 자동 업데이트 확인 여부
    pub look_for_updates: bool,
    /// 확인 간격 (초)
    pub check_interval: u64,
    /// 마지막 확인 시각 (RFC3339)
    pub last_check: Option<String>,
    /// 자동 업데이트 제외 애드온 id 목록
    pub excluded: Vec<String>,
    /// WoW 애드온 디렉터리. 비어 있으면 미설정.
    pub addons_path: String,
    /// 창 닫기 시 트레이로 최소화
    pub minimize_to_tray: bool,
    pub api_base_url: String,
    pub api_timeout_secs: u64,
    /// 로드된 파일 경로 — save()가 같은 위치에 다시 씀
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            look_for_updates: default_true(),
            check_interval: default_check_interval(),
            last_check: None,
            excluded: Vec::new(),
            addons_path: String::new(),
            minimize_to_tray: default_true(),
            api_base_url: default_api_base_url(),
            api_timeout_secs: default_api_timeout(),
            config_path: None,
        }
    }
}

impl Settings {
    /// 설정 파일 탐색: 실행 파일 옆 → CWD
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let p = dir.join("config").join("settings.toml");
                if p.exists() {
                    return Some(p);
                }
            }
        }

        let p = PathBuf::from("config").join("settings.toml");
        if p.exists() {
            return Some(p);
        }

        None
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config").join("settings.toml")
    }

    /// 파일이 없으면 기본값 — 최초 실행도 정상 경로
    pub fn load() -> anyhow::Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&content)?;
        settings.config_path = Some(path.clone());
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = match &self.config_path {
            Some(p) => p.clone(),
            None => Self::find_config_file().unwrap_or_else(Self::default_config_path),
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &PathBuf) -> anyhow::Result<()> {
        let out = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, out)?;
        Ok(())
    }
}

/// 설정에서 애드온 경로를 읽는 리졸버 — 워커 사이클의 콜라보레이터
#[derive(Clone)]
pub struct SettingsPathResolver {
    settings: Arc<RwLock<Settings>>,
}

impl SettingsPathResolver {
    pub fn new(settings: Arc<RwLock<Settings>>) -> Self {
        Self { settings }
    }
}

impl AddonPathResolver for SettingsPathResolver {
    fn addons_path(&self) -> impl std::future::Future<Output = String> + Send {
        let settings = self.settings.clone();
        async move { settings.read().await.addons_path.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.look_for_updates);
        assert_eq!(s.check_interval, 3600);
        assert!(s.last_check.is_none());
        assert!(s.addons_path.is_empty());
        assert_eq!(s.api_timeout_secs, 15);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("settings.toml");

        let mut s = Settings::default();
        s.look_for_updates = false;
        s.check_interval = 900;
        s.excluded = vec!["42".to_string()];
        s.addons_path = "/wow/Interface/AddOns".to_string();
        s.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert!(!loaded.look_for_updates);
        assert_eq!(loaded.check_interval, 900);
        assert_eq!(loaded.excluded, vec!["42".to_string()]);
        assert_eq!(loaded.addons_path, "/wow/Interface/AddOns");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "check_interval = 120\n").unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.check_interval, 120);
        assert!(loaded.look_for_updates);
        assert_eq!(loaded.api_timeout_secs, 15);
    }

    #[tokio::test]
    async fn test_path_resolver_reflects_settings() {
        let settings = Arc::new(RwLock::new(Settings::default()));
        let resolver = SettingsPathResolver::new(settings.clone());

        assert_eq!(resolver.addons_path().await, "");

        settings.write().await.addons_path = "/addons".to_string();
        assert_eq!(resolver.addons_path().await, "/addons");
    }
}
