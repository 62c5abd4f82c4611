//! 驱动运行指标
//!
//! 原子计数器，IO 线程写入，任意线程读取快照，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// Driver 实时指标
///
/// 跨多次 start/stop 累计，不随 stop 清零。
///
/// # 使用示例
///
/// ```rust
/// use canlink_driver::DriverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DriverMetrics::new();
/// metrics.rx_frames.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_frames, 1);
/// ```
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 成功接收并交给 handler 的帧数
    pub rx_frames: AtomicU64,

    /// 读取失败次数（短读、非法帧、IO 错误）
    pub rx_errors: AtomicU64,

    /// 就绪后读取返回 EAGAIN 的次数（正常现象）
    pub rx_would_block: AtomicU64,

    /// 等待可读失败次数
    pub rx_poll_errors: AtomicU64,

    /// 成功写出的帧数
    pub tx_frames: AtomicU64,

    /// 写失败后丢弃的帧数（不重试）
    pub tx_dropped: AtomicU64,

    /// 队列满导致 `submit()` 被拒绝的次数
    pub submit_rejected_full: AtomicU64,

    /// 未运行导致 `submit()` 被拒绝的次数
    pub submit_rejected_stopped: AtomicU64,

    /// stop 时仍在队列中、未写出即被丢弃的帧数
    pub tx_discarded_on_stop: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 各计数器分别读取（`Ordering::Relaxed`），不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            rx_would_block: self.rx_would_block.load(Ordering::Relaxed),
            rx_poll_errors: self.rx_poll_errors.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_dropped: self.tx_dropped.load(Ordering::Relaxed),
            submit_rejected_full: self.submit_rejected_full.load(Ordering::Relaxed),
            submit_rejected_stopped: self.submit_rejected_stopped.load(Ordering::Relaxed),
            tx_discarded_on_stop: self.tx_discarded_on_stop.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub rx_frames: u64,
    pub rx_errors: u64,
    pub rx_would_block: u64,
    pub rx_poll_errors: u64,
    pub tx_frames: u64,
    pub tx_dropped: u64,
    pub submit_rejected_full: u64,
    pub submit_rejected_stopped: u64,
    pub tx_discarded_on_stop: u64,
}

impl MetricsSnapshot {
    /// 被 `submit()` 拒绝的帧总数
    pub fn submit_rejected(&self) -> u64 {
        self.submit_rejected_full + self.submit_rejected_stopped
    }

    /// 已入队但最终没有写到总线上的帧数
    pub fn tx_lost(&self) -> u64 {
        self.tx_dropped + self.tx_discarded_on_stop
    }
}
