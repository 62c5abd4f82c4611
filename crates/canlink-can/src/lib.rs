//! # canlink CAN Endpoint Layer
//!
//! CAN 通道端点抽象层：驱动层只通过 [`Connector`] / [`Endpoint`] 访问总线。
//!
//! - Linux：[`SocketCanConnector`] 打开原始 SocketCAN socket（非阻塞）
//! - 测试：`mock` feature 提供内存总线 [`mock::MockConnector`]

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub use canlink_frame::{FRAME_SIZE, Frame, FrameError};

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::{SocketCanConnector, SocketCanEndpoint};

#[cfg(feature = "mock")]
pub mod mock;

/// 端点获取的子步骤
///
/// 任一步骤失败都会使整个获取失败，并释放已获取的资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquireStage {
    /// 创建原始 CAN socket
    Open,
    /// 接口名解析为接口索引
    ResolveInterface,
    /// 绑定到接口
    Bind,
    /// 设置非阻塞模式
    SetNonBlocking,
}

impl fmt::Display for AcquireStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Open => "open CAN socket",
            Self::ResolveInterface => "resolve interface",
            Self::Bind => "bind socket",
            Self::SetNonBlocking => "set non-blocking mode",
        };
        f.write_str(stage)
    }
}

/// CAN 端点层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    /// 端点获取失败（仅影响本次 `start()`，可重试）
    #[error("Failed to {stage} for CAN interface '{interface}': {source}")]
    Acquire {
        stage: AcquireStage,
        interface: String,
        source: io::Error,
    },
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    /// 非阻塞 socket 暂无数据（或缓冲区满）
    #[error("Operation would block")]
    WouldBlock,
    #[error("Incomplete CAN frame read: {read} bytes (expected {expected})")]
    ShortRead { read: usize, expected: usize },
    #[error("Incomplete CAN frame write: {written} bytes (expected {expected})")]
    ShortWrite { written: usize, expected: usize },
    #[error("Invalid CAN frame: {0}")]
    InvalidFrame(#[from] FrameError),
}

impl CanError {
    pub fn acquire(stage: AcquireStage, interface: impl Into<String>, source: io::Error) -> Self {
        Self::Acquire {
            stage,
            interface: interface.into(),
            source,
        }
    }

    /// 获取失败时所处的子步骤
    pub fn acquire_stage(&self) -> Option<AcquireStage> {
        match self {
            Self::Acquire { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// 循环内错误：记录后继续，不终止 IO 线程
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Acquire { .. })
    }
}

/// 已打开、已绑定、非阻塞的通道端点
///
/// 两个 IO 线程共享同一个端点（RX 只读，TX 只写），因此所有方法都取 `&self`。
/// 实现必须保证并发调用 `read_frame` 与 `write_frame` 是安全的。
pub trait Endpoint: Send + Sync + 'static {
    /// 等待可读，最多等待 `timeout`
    ///
    /// - `Ok(true)`: 可读（可能是虚假就绪，随后的读取会返回 `WouldBlock`）
    /// - `Ok(false)`: 超时或被信号中断
    fn wait_readable(&self, timeout: Duration) -> Result<bool, CanError>;

    /// 读取恰好一个帧大小的单元
    fn read_frame(&self) -> Result<Frame, CanError>;

    /// 写出一帧；写出字节数不足时返回 `CanError::ShortWrite`
    fn write_frame(&self, frame: &Frame) -> Result<(), CanError>;
}

/// 端点工厂：按接口名完成全部获取子步骤
pub trait Connector: Send + Sync + 'static {
    type Endpoint: Endpoint;

    fn connect(&self, interface: &str) -> Result<Self::Endpoint, CanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_error_display() {
        let err = CanError::acquire(
            AcquireStage::Bind,
            "vcan9",
            io::Error::from(io::ErrorKind::AddrNotAvailable),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to bind socket for CAN interface 'vcan9'"));
        assert_eq!(err.acquire_stage(), Some(AcquireStage::Bind));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_loop_errors_are_transient() {
        let errors = [
            CanError::WouldBlock,
            CanError::ShortRead {
                read: 4,
                expected: FRAME_SIZE,
            },
            CanError::ShortWrite {
                written: 0,
                expected: FRAME_SIZE,
            },
            CanError::Io(io::Error::other("poll failed")),
            CanError::InvalidFrame(FrameError::InvalidDlc { dlc: 15 }),
        ];
        for err in errors {
            assert!(err.is_transient(), "{err} should be transient");
            assert_eq!(err.acquire_stage(), None);
        }
    }

    #[test]
    fn test_from_frame_error() {
        let err: CanError = FrameError::InvalidDlc { dlc: 9 }.into();
        assert!(matches!(
            err,
            CanError::InvalidFrame(FrameError::InvalidDlc { dlc: 9 })
        ));
    }
}
