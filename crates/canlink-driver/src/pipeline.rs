//! IO 线程主循环
//!
//! RX 与 TX 各占一个线程，共享同一个端点（`Arc<E>`），互不阻塞：
//! - RX：短超时等待可读，读一帧，同步调用 handler
//! - TX：阻塞等待队列或停止信号，逐帧写出

use crate::handler::FrameHandler;
use crate::metrics::DriverMetrics;
use canlink_can::{CanError, Endpoint, Frame};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{trace, warn};

#[cfg(feature = "realtime")]
fn raise_thread_priority(label: &str) {
    use thread_priority::*;
    use tracing::info;

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => {
            info!("{} thread priority set to MAX (realtime)", label);
        },
        Err(e) => {
            warn!(
                "Failed to set {} thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                label, e
            );
        },
    }
}

/// RX 线程主循环
///
/// 每次迭代先检查运行标志，因此 stop 后最多一个 `poll_timeout` 即退出。
/// 所有读取错误都只记录并计数，循环继续。
///
/// # 参数
/// - `endpoint`: 共享端点
/// - `handler`: 接收回调，每帧调用一次
/// - `poll_timeout`: 等待可读的超时
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 运行指标
pub fn rx_loop<E: Endpoint>(
    endpoint: Arc<E>,
    handler: Arc<dyn FrameHandler>,
    poll_timeout: Duration,
    is_running: Arc<AtomicBool>,
    metrics: Arc<DriverMetrics>,
) {
    #[cfg(feature = "realtime")]
    raise_thread_priority("RX");

    loop {
        // Acquire: 看到 false 时必然看到 stop 之前的所有写入
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        match endpoint.wait_readable(poll_timeout) {
            Ok(true) => {},
            Ok(false) => continue,
            Err(e) => {
                DriverMetrics::incr(&metrics.rx_poll_errors);
                warn!("RX thread: poll error: {}", e);
                continue;
            },
        }

        match endpoint.read_frame() {
            Ok(frame) => {
                DriverMetrics::incr(&metrics.rx_frames);
                trace!("RX thread: received {}", frame);
                handler.on_frame(frame);
            },
            Err(CanError::WouldBlock) => {
                DriverMetrics::incr(&metrics.rx_would_block);
            },
            Err(e) => {
                DriverMetrics::incr(&metrics.rx_errors);
                warn!("RX thread: read error: {}", e);
            },
        }
    }

    trace!("RX thread: loop exited");
}

/// TX 线程主循环
///
/// 阻塞等待队列中的帧或停止信号（`shutdown` 的发送端被 drop）。
/// 写操作在取出帧之后执行，不持有任何队列同步原语。
/// 写失败的帧记录后丢弃，不重试。
///
/// # 参数
/// - `endpoint`: 共享端点
/// - `queue`: 发送队列消费端
/// - `shutdown`: 停止信号（只用于唤醒，不传递数据）
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 运行指标
pub fn tx_loop<E: Endpoint>(
    endpoint: Arc<E>,
    queue: Receiver<Frame>,
    shutdown: Receiver<()>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<DriverMetrics>,
) {
    #[cfg(feature = "realtime")]
    raise_thread_priority("TX");

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        let frame = crossbeam_channel::select! {
            recv(queue) -> msg => match msg {
                Ok(frame) => frame,
                Err(_) => {
                    trace!("TX thread: transmit queue disconnected");
                    break;
                },
            },
            recv(shutdown) -> _ => {
                // 发送端被 drop，回到循环顶部检查运行标志
                continue;
            },
        };

        match endpoint.write_frame(&frame) {
            Ok(()) => {
                DriverMetrics::incr(&metrics.tx_frames);
                trace!("TX thread: sent {}", frame);
            },
            Err(e) => {
                DriverMetrics::incr(&metrics.tx_dropped);
                warn!("TX thread: frame 0x{:X} dropped: {}", frame.id(), e);
            },
        }
    }

    trace!("TX thread: loop exited");
}
