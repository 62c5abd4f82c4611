//! SocketCAN 通道端点实现
//!
//! 基于 [`socketcan`] crate 的原始 CAN socket（`CanSocket`）。
//!
//! ## 获取步骤
//!
//! 1. 校验接口名并解析为接口索引
//! 2. 创建 socket 并绑定到接口（`CanSocket::open_iface`）
//! 3. 设置非阻塞模式
//!
//! 任一步骤失败，已创建的 socket 随 `CanSocket` drop 自动关闭，不会残留资源。
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率与 UP 状态由系统工具（`ip link`）完成，不在应用层设置
//! - **仅经典 CAN**：每次读写恰好一个 16 字节的 `struct can_frame`

use crate::{AcquireStage, CanError, Connector, Endpoint, Frame, FrameError};
use canlink_frame::{CAN_EFF_FLAG, CAN_ERR_FLAG, CAN_MAX_DLEN, CAN_RTR_FLAG};
use nix::errno::Errno;
use nix::net::if_::if_nametoindex;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socketcan::{
    CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame as SocketCanFrame, Socket, StandardId,
};
use std::io;
use std::os::fd::AsFd;
use std::time::Duration;
use tracing::{trace, warn};

mod interface_check;

pub use interface_check::{MAX_IFACE_NAME_LEN, check_interface_status, validate_interface_name};

/// SocketCAN 端点
///
/// 持有已绑定、非阻塞的 `CanSocket`。socket 在端点 drop 时关闭。
///
/// # 示例
///
/// ```no_run
/// use canlink_can::{Endpoint, Frame, SocketCanEndpoint};
///
/// let endpoint = SocketCanEndpoint::open("vcan0").unwrap();
/// endpoint
///     .write_frame(&Frame::new_standard(0x123, &[1, 2, 3, 4]).unwrap())
///     .unwrap();
/// ```
pub struct SocketCanEndpoint {
    socket: CanSocket,
    interface: String,
    ifindex: u32,
}

impl SocketCanEndpoint {
    /// 打开并绑定 CAN 接口
    ///
    /// # 错误
    /// - `CanError::Acquire { stage, .. }`: 指明失败的子步骤
    pub fn open(interface: &str) -> Result<Self, CanError> {
        let acquire = |stage, source| CanError::acquire(stage, interface, source);

        // 1. 解析接口索引
        validate_interface_name(interface)
            .map_err(|e| acquire(AcquireStage::ResolveInterface, e))?;
        let ifindex = if_nametoindex(interface)
            .map_err(|e| acquire(AcquireStage::ResolveInterface, io::Error::from(e)))?;

        // 2. 创建并绑定
        let socket = CanSocket::open_iface(ifindex).map_err(|e| acquire(open_stage(&e), e))?;

        // 3. 非阻塞模式
        socket
            .set_nonblocking(true)
            .map_err(|e| acquire(AcquireStage::SetNonBlocking, e))?;

        // 接口状态只做提示，DOWN 不阻止启动
        match check_interface_status(interface) {
            Ok(true) => {},
            Ok(false) => warn!(
                "CAN interface '{}' is DOWN; frames will not reach the bus until it is brought up:\n  sudo ip link set up {}",
                interface, interface
            ),
            Err(e) => trace!("Could not query status of '{}': {}", interface, e),
        }

        trace!(
            "SocketCAN interface '{}' (ifindex {}) opened in non-blocking mode",
            interface, ifindex
        );

        Ok(Self {
            socket,
            interface: interface.to_string(),
            ifindex,
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取接口索引
    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }
}

impl std::fmt::Debug for SocketCanEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketCanEndpoint")
            .field("interface", &self.interface)
            .field("ifindex", &self.ifindex)
            .finish_non_exhaustive()
    }
}

/// `open_iface` 把 socket 创建与 bind 合在一起，按 errno 区分失败的子步骤
fn open_stage(err: &io::Error) -> AcquireStage {
    match err.raw_os_error() {
        Some(libc::ENODEV | libc::ENXIO | libc::EADDRNOTAVAIL | libc::EADDRINUSE | libc::ENETDOWN) => {
            AcquireStage::Bind
        },
        _ => AcquireStage::Open,
    }
}

/// 转换 CanFrame -> Frame，保留 EFF/RTR/ERR 标志位
fn from_can_frame(can_frame: &CanFrame) -> Result<Frame, FrameError> {
    let dlc = can_frame.dlc().min(CAN_MAX_DLEN);
    let mut data = [0u8; CAN_MAX_DLEN];
    let payload = can_frame.data();
    let n = payload.len().min(dlc);
    data[..n].copy_from_slice(&payload[..n]);
    Frame::new(can_frame.id_word(), &data[..dlc])
}

/// 转换 Frame -> CanFrame
///
/// 错误帧不能发送；没有 EFF 标志但 ID 超过 11 位的帧同样被拒绝。
fn to_can_frame(frame: &Frame) -> Result<CanFrame, FrameError> {
    let invalid = || FrameError::InvalidId { id: frame.id() };
    if frame.is_error() {
        return Err(invalid());
    }

    let id = frame.id() & !(CAN_EFF_FLAG | CAN_RTR_FLAG | CAN_ERR_FLAG);
    let can_frame = if frame.is_extended() {
        let id = ExtendedId::new(id).ok_or_else(invalid)?;
        if frame.is_remote() {
            CanFrame::new_remote(id, frame.len())
        } else {
            CanFrame::new(id, frame.data())
        }
    } else {
        let id = u16::try_from(id)
            .ok()
            .and_then(StandardId::new)
            .ok_or_else(invalid)?;
        if frame.is_remote() {
            CanFrame::new_remote(id, frame.len())
        } else {
            CanFrame::new(id, frame.data())
        }
    };
    can_frame.ok_or_else(invalid)
}

impl Endpoint for SocketCanEndpoint {
    fn wait_readable(&self, timeout: Duration) -> Result<bool, CanError> {
        let mut fds = [PollFd::new(self.socket.as_fd(), PollFlags::POLLIN)];

        // PollTimeout::from(u16)，最大 65535ms
        let timeout_ms = timeout.as_millis().min(u16::MAX as u128) as u16;
        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(fds[0]
                .revents()
                .is_some_and(|revents| revents.contains(PollFlags::POLLIN))),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(CanError::Io(io::Error::from(e))),
        }
    }

    fn read_frame(&self) -> Result<Frame, CanError> {
        let can_frame = self.socket.read_frame().map_err(|e| match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => CanError::WouldBlock,
            _ => CanError::Io(e),
        })?;
        Ok(from_can_frame(&can_frame)?)
    }

    fn write_frame(&self, frame: &Frame) -> Result<(), CanError> {
        let can_frame = to_can_frame(frame)?;
        self.socket.write_frame(&can_frame).map_err(CanError::Io)?;
        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.bus_id(), frame.len());
        Ok(())
    }
}

impl Drop for SocketCanEndpoint {
    fn drop(&mut self) {
        trace!(
            "[Auto-Drop] SocketCAN interface '{}' closed",
            self.interface
        );
    }
}

/// SocketCAN 端点工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketCanConnector;

impl Connector for SocketCanConnector {
    type Endpoint = SocketCanEndpoint;

    fn connect(&self, interface: &str) -> Result<Self::Endpoint, CanError> {
        SocketCanEndpoint::open(interface)
    }
}
