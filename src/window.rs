//! GUI 창 상태 추적
//!
//! 컨트롤러가 폴 틱을 보낼지 결정할 때 참조합니다. GUI 프로세스가
//! IPC로 창 생성/표시 상태를 보고하며, 창이 화면에 떠 있는 동안에는
//! 자동 업데이트 신호를 보내지 않습니다 (사용자가 직접 조작 중).

use serde::Serialize;

/// 대상 창의 현재 상태
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WindowTracker {
    /// 살아있는 창이 붙어 있는지
    pub attached: bool,
    /// 창이 사용자에게 보이는지
    pub visible: bool,
}

impl WindowTracker {
    /// 폴 신호를 보내도 되는 상태인지: 창이 존재하고, 보이지 않을 때만
    pub fn eligible(&self) -> bool {
        self.attached && !self.visible
    }

    pub fn set_state(&mut self, attached: bool, visible: bool) {
        self.attached = attached;
        // 창이 없으면 visible일 수 없음
        self.visible = attached && visible;
    }
}
