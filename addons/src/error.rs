//! 에러 분류
//!
//! ## 지원하는 에러 상황
//! - 네트워크 끊김 / 타임아웃
//! - API 응답 오류
//! - 파일 시스템 / 압축 해제 오류
//!
//! 사이클 내 스캔/조회 실패는 호출자에게 전파되고, 재시도는
//! 다음 타이머 틱에만 맡깁니다. 이 계층에서 자동 재시도는 없습니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 애드온 파이프라인 에러 타입
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum AddonsError {
    /// 네트워크 연결 실패
    Network { message: String, recoverable: bool },
    /// HTTP 요청 타임아웃
    Timeout { operation: String },
    /// API 응답 오류
    Api { status_code: u16, message: String },
    /// 파일 시스템 오류
    FileSystem {
        operation: String,
        path: String,
        message: String,
    },
    /// 압축 해제 오류
    Archive { path: String, message: String },
}

impl fmt::Display for AddonsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddonsError::Network { message, .. } => {
                write!(f, "Network error: {}", message)
            }
            AddonsError::Timeout { operation } => {
                write!(f, "Timeout during {}", operation)
            }
            AddonsError::Api {
                status_code,
                message,
            } => {
                write!(f, "API error ({}): {}", status_code, message)
            }
            AddonsError::FileSystem {
                operation,
                path,
                message,
            } => {
                write!(
                    f,
                    "File system error during {} on '{}': {}",
                    operation, path, message
                )
            }
            AddonsError::Archive { path, message } => {
                write!(f, "Archive error on '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for AddonsError {}

impl AddonsError {
    /// 다음 틱에 자연 복구될 가능성이 있는 에러인지
    pub fn is_recoverable(&self) -> bool {
        match self {
            AddonsError::Network { recoverable, .. } => *recoverable,
            AddonsError::Timeout { .. } => true,
            AddonsError::Api { status_code, .. } => {
                // 5xx는 일시적일 수 있음, 4xx는 아님
                *status_code >= 500
            }
            AddonsError::FileSystem { .. } => false,
            AddonsError::Archive { .. } => false,
        }
    }

    /// reqwest 에러 변환
    pub fn from_reqwest(err: &reqwest::Error, operation: &str) -> Self {
        if err.is_timeout() {
            AddonsError::Timeout {
                operation: operation.to_string(),
            }
        } else if err.is_connect() {
            AddonsError::Network {
                message: format!("Connection failed: {}", err),
                recoverable: true,
            }
        } else if let Some(status) = err.status() {
            AddonsError::Api {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            AddonsError::Network {
                message: err.to_string(),
                recoverable: err.is_request() || err.is_body(),
            }
        }
    }

    /// IO 에러 변환
    pub fn from_io(err: &std::io::Error, operation: &str, path: &str) -> Self {
        AddonsError::FileSystem {
            operation: operation.to_string(),
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}
