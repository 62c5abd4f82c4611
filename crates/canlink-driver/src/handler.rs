//! 接收回调
//!
//! RX 线程对每一帧成功接收的帧同步调用一次 [`FrameHandler::on_frame`]，
//! 调用顺序即接收顺序。
//!
//! # 使用示例
//!
//! ```rust
//! use canlink_driver::{Frame, FrameHandler};
//! use crossbeam_channel::unbounded;
//!
//! // 闭包
//! let handler = |frame: Frame| println!("{frame}");
//! handler.on_frame(Frame::new_standard(0x100, &[1]).unwrap());
//!
//! // Channel：把帧转交给其他线程处理
//! let (tx, rx) = unbounded::<Frame>();
//! tx.on_frame(Frame::new_standard(0x101, &[2]).unwrap());
//! assert_eq!(rx.recv().unwrap().id(), 0x101);
//! ```

use canlink_can::Frame;
use crossbeam_channel::Sender;

/// 帧接收回调 Trait
///
/// 在 RX 线程上执行。实现耗时越长，后续帧的接收延迟越大。
///
/// 不要在回调中调用同一个 Driver 的 `stop()`：`stop()` 会等待 RX 线程退出。
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, frame: Frame);
}

impl<F> FrameHandler for F
where
    F: Fn(Frame) + Send + Sync,
{
    fn on_frame(&self, frame: Frame) {
        self(frame)
    }
}

/// 阻塞发送；接收端已关闭时静默丢弃
impl FrameHandler for Sender<Frame> {
    fn on_frame(&self, frame: Frame) {
        let _ = self.send(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let handler: Arc<dyn FrameHandler> = Arc::new(move |_frame: Frame| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        for id in 0..3u16 {
            handler.on_frame(Frame::new_standard(id, &[]).unwrap());
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sender_handler_ignores_disconnected() {
        let (tx, rx) = bounded::<Frame>(1);
        drop(rx);
        // 不应 panic
        tx.on_frame(Frame::new_standard(0x1, &[]).unwrap());
    }
}
