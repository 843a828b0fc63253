//! 데몬 전용 에러 타입 — 에러 종류를 구분하여 IPC 핸들러에서
//! 적절한 HTTP 상태 코드를 반환할 수 있게 합니다.

use axum::http::StatusCode;

/// 데몬 작업 중 발생할 수 있는 에러 유형
#[derive(thiserror::Error, Debug)]
pub enum DaemonError {
    #[error("Update cycle failed: {0}")]
    Cycle(#[from] wowcui_addons_lib::AddonsError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Settings persistence failed: {0}")]
    Settings(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl DaemonError {
    /// HTTP 상태 코드 매핑
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::Cycle(e) if e.is_recoverable() => StatusCode::BAD_GATEWAY,
            Self::Cycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON 에러 응답 생성
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
        })
    }

    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cycle(_) => "CYCLE_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Settings(_) => "SETTINGS_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// axum 핸들러에서 DaemonError를 직접 반환할 수 있도록 IntoResponse 구현
impl axum::response::IntoResponse for DaemonError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = axum::Json(self.to_json());
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_maps_to_400() {
        let e = DaemonError::InvalidConfig("checkInterval must be positive".into());
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_recoverable_cycle_error_maps_to_502() {
        let e = DaemonError::Cycle(wowcui_addons_lib::AddonsError::Api {
            status_code: 503,
            message: "maintenance".into(),
        });
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_json_shape() {
        let e = DaemonError::Settings("disk full".into());
        let v = e.to_json();
        assert_eq!(v["success"], false);
        assert_eq!(v["error_code"], "SETTINGS_ERROR");
    }
}
