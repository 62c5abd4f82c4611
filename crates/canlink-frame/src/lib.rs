//! # canlink Frame
//!
//! 经典 CAN 2.0 帧的定长表示（无硬件依赖）
//!
//! ## 线格式
//!
//! `Frame` 与 `<linux/can.h>` 中的 `struct can_frame` 逐字节一致（16 字节）：
//!
//! ```text
//! offset  size  field
//! 0       4     can_id   (本机字节序，含 EFF/RTR/ERR 标志位)
//! 4       1     can_dlc  (0-8)
//! 5       1     __pad
//! 6       1     __res0
//! 7       1     len8_dlc
//! 8       8     data
//! ```
//!
//! 编码时填充字节与 `dlc` 之后的数据字节写 0；解码时忽略填充字节，
//! 并把 `dlc` 之后的数据字节清零，保证 `Eq` 只比较有效内容。

use std::fmt;
use thiserror::Error;

/// 经典 CAN 帧的最大数据长度
pub const CAN_MAX_DLEN: usize = 8;

/// 线格式帧大小（`sizeof(struct can_frame)`）
pub const FRAME_SIZE: usize = 16;

/// 扩展帧标志位（29-bit ID）
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
/// 远程帧标志位
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
/// 错误帧标志位
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;
/// 标准帧 ID 掩码（11-bit）
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
/// 扩展帧 ID 掩码（29-bit）
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

const DLC_OFFSET: usize = 4;
const DATA_OFFSET: usize = 8;

/// 帧构造/解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload too long: {len} bytes (max {CAN_MAX_DLEN})")]
    PayloadTooLong { len: usize },

    #[error("Invalid DLC: {dlc} (max {CAN_MAX_DLEN})")]
    InvalidDlc { dlc: u8 },

    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidId { id: u32 },
}

/// 总线上交换的定长数据单元
///
/// # 设计特性
///
/// - **Copy trait**：按值穿过发送队列，无堆分配
/// - **不可变**：字段私有，只能通过构造器或 [`Frame::from_wire`] 创建，
///   因此 `len <= 8` 在任何时刻都成立
/// - **不解释负载**：`id` 保存原始 `can_id`（包括标志位），驱动层原样收发
///
/// # 示例
///
/// ```rust
/// use canlink_frame::Frame;
///
/// let frame = Frame::new_standard(0x123, &[1, 2, 3, 4]).unwrap();
/// assert_eq!(frame.id(), 0x123);
/// assert_eq!(frame.data(), &[1, 2, 3, 4]);
///
/// let wire = frame.to_wire();
/// assert_eq!(Frame::from_wire(&wire).unwrap(), frame);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "FrameRepr", into = "FrameRepr"))]
pub struct Frame {
    /// 原始 CAN ID（含 EFF/RTR/ERR 标志位）
    id: u32,
    /// 有效数据长度 (0-8)
    len: u8,
    /// 帧数据（固定 8 字节，未使用部分为 0）
    data: [u8; CAN_MAX_DLEN],
}

impl Frame {
    /// 通用构造器，`id` 按原始 `can_id` 解释（不做掩码检查）
    pub fn new(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > CAN_MAX_DLEN {
            return Err(FrameError::PayloadTooLong { len: data.len() });
        }

        let mut fixed = [0u8; CAN_MAX_DLEN];
        fixed[..data.len()].copy_from_slice(data);

        Ok(Self {
            id,
            len: data.len() as u8,
            data: fixed,
        })
    }

    /// 创建标准帧（11-bit ID）
    pub fn new_standard(id: u16, data: &[u8]) -> Result<Self, FrameError> {
        let id = u32::from(id);
        if id > CAN_SFF_MASK {
            return Err(FrameError::InvalidId { id });
        }
        Self::new(id, data)
    }

    /// 创建扩展帧（29-bit ID），自动设置 EFF 标志位
    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        if id > CAN_EFF_MASK {
            return Err(FrameError::InvalidId { id });
        }
        Self::new(id | CAN_EFF_FLAG, data)
    }

    /// 原始 CAN ID（与线格式中的 `can_id` 相同）
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 去除标志位后的总线 ID
    pub fn bus_id(&self) -> u32 {
        if self.is_extended() {
            self.id & CAN_EFF_MASK
        } else {
            self.id & CAN_SFF_MASK
        }
    }

    pub fn is_extended(&self) -> bool {
        self.id & CAN_EFF_FLAG != 0
    }

    pub fn is_remote(&self) -> bool {
        self.id & CAN_RTR_FLAG != 0
    }

    pub fn is_error(&self) -> bool {
        self.id & CAN_ERR_FLAG != 0
    }

    /// 数据长度码 (0-8)
    pub fn dlc(&self) -> u8 {
        self.len
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取完整数据（8 字节固定数组）
    pub fn payload(&self) -> &[u8; CAN_MAX_DLEN] {
        &self.data
    }

    /// 编码为 `struct can_frame` 的字节表示
    pub fn to_wire(&self) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        buf[..DLC_OFFSET].copy_from_slice(&self.id.to_ne_bytes());
        buf[DLC_OFFSET] = self.len;
        buf[DATA_OFFSET..].copy_from_slice(&self.data);
        buf
    }

    /// 从 `struct can_frame` 的字节表示解码
    ///
    /// # 错误
    /// - `FrameError::InvalidLength`: 输入不是恰好 [`FRAME_SIZE`] 字节
    /// - `FrameError::InvalidDlc`: `can_dlc` 大于 8
    pub fn from_wire(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_SIZE {
            return Err(FrameError::InvalidLength {
                expected: FRAME_SIZE,
                actual: bytes.len(),
            });
        }

        let dlc = bytes[DLC_OFFSET];
        if dlc as usize > CAN_MAX_DLEN {
            return Err(FrameError::InvalidDlc { dlc });
        }

        let mut id_bytes = [0u8; 4];
        id_bytes.copy_from_slice(&bytes[..DLC_OFFSET]);

        Self::new(
            u32::from_ne_bytes(id_bytes),
            &bytes[DATA_OFFSET..DATA_OFFSET + dlc as usize],
        )
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID=0x{:X}, DLC={}, Data=[", self.bus_id(), self.len)?;
        for (i, byte) in self.data().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        f.write_str("]")
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct FrameRepr {
    id: u32,
    data: Vec<u8>,
}

#[cfg(feature = "serde")]
impl TryFrom<FrameRepr> for Frame {
    type Error = FrameError;

    fn try_from(repr: FrameRepr) -> Result<Self, Self::Error> {
        Frame::new(repr.id, &repr.data)
    }
}

#[cfg(feature = "serde")]
impl From<Frame> for FrameRepr {
    fn from(frame: Frame) -> Self {
        Self {
            id: frame.id,
            data: frame.data().to_vec(),
        }
    }
}
