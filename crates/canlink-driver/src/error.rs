//! 驱动层错误类型定义

use canlink_can::CanError;
use std::io;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 端点错误（`start()` 时的获取失败）
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 驱动未运行，`submit()` 被拒绝
    #[error("Driver is not running")]
    NotRunning,

    /// 发送队列已满，`submit()` 被拒绝
    #[error("Transmit queue full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// IO 线程创建失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: io::Error,
    },

    /// 无效配置
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl DriverError {
    /// 是否为 `submit()` 的拒绝信号（调用方自行决定重试/退避）
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::NotRunning | Self::QueueFull { .. })
    }
}
