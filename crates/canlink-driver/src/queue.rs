//! 有界发送队列
//!
//! 多生产者（`submit()` 调用方）单消费者（TX 线程）的 FIFO。
//! 满时拒绝新帧，已入队的帧不会被覆盖或丢弃。

use crate::error::DriverError;
use canlink_can::Frame;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

/// 默认发送队列容量
pub const MAX_QUEUE_SIZE: usize = 10_000;

/// 有界发送队列
///
/// 队列随 Driver 创建一次，跨多次 start/stop 复用；stop 时清空。
#[derive(Debug)]
pub struct TransmitQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    capacity: usize,
}

impl TransmitQueue {
    /// 创建容量为 `capacity`（至少为 1）的队列
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// 非阻塞入队，满时返回 [`DriverError::QueueFull`]
    pub fn try_push(&self, frame: Frame) -> Result<(), DriverError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            // 队列自身持有 Receiver，Disconnected 不会出现
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                Err(DriverError::QueueFull {
                    capacity: self.capacity,
                })
            },
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 消费端句柄（交给 TX 线程）
    pub fn receiver(&self) -> Receiver<Frame> {
        self.rx.clone()
    }

    /// 清空队列，返回丢弃的帧数
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}
