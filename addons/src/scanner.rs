//! 애드온 디렉터리 스캐너
//!
//! 디렉터리의 폴더 목록을 설치 매니페스트와 조인하여 현재 설치된
//! `AddonRecord` 집합을 만듭니다. 폴더가 일부라도 삭제된 애드온은
//! 설치 목록에서 빠집니다 (수동 삭제 감지).

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;

use crate::error::AddonsError;
use crate::{AddonId, AddonRecord, InstalledManifest};

/// 스캔 콜라보레이터 계약
pub trait AddonScanner: Send + Sync + 'static {
    fn scan(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<AddonRecord>, AddonsError>> + Send;
}

/// 파일시스템 기반 스캐너
#[derive(Debug, Clone, Default)]
pub struct DirScanner;

impl DirScanner {
    pub fn new() -> Self {
        DirScanner
    }
}

impl AddonScanner for DirScanner {
    fn scan(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<AddonRecord>, AddonsError>> + Send {
        let path = path.to_string();
        async move {
            let dir = Path::new(&path);

            let mut folders = HashSet::new();
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .map_err(|e| AddonsError::from_io(&e, "scan", &path))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| AddonsError::from_io(&e, "scan", &path))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| AddonsError::from_io(&e, "scan", &path))?;
                if file_type.is_dir() {
                    folders.insert(entry.file_name().to_string_lossy().to_string());
                }
            }

            let manifest = InstalledManifest::load(dir);
            let mut records: Vec<AddonRecord> = manifest
                .addons
                .iter()
                .filter(|(_, entry)| {
                    !entry.folders.is_empty()
                        && entry.folders.iter().all(|f| folders.contains(f))
                })
                .map(|(id, entry)| AddonRecord {
                    id: AddonId::from(id.clone()),
                    name: entry.name.clone(),
                    main_file_id: entry.main_file_id,
                    installed_version: entry.version.clone(),
                    folders: entry.folders.clone(),
                })
                .collect();

            // 순회 순서를 결정적으로
            records.sort_by(|a, b| a.id.cmp(&b.id));

            tracing::debug!(
                "[Scanner] {} addon(s) installed under {} ({} folder(s))",
                records.len(),
                path,
                folders.len()
            );

            Ok(records)
        }
    }
}
