//! Driver 状态定义

use std::fmt;

/// Driver 生命周期状态
///
/// `Stopped`（初始与终止状态）→ `Running` → `Stopped`，只通过 `start()` / `stop()` 转换。
///
/// - `Running`: 端点有效，RX/TX 线程运行中
/// - `Stopped`: 无端点，无线程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Stopped,
    Running,
}

impl DriverState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl From<bool> for DriverState {
    fn from(running: bool) -> Self {
        if running { Self::Running } else { Self::Stopped }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        })
    }
}
