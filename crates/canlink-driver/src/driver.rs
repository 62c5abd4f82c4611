//! Driver 模块
//!
//! 单一 CAN 接口的生命周期管理：`start()` 获取端点并启动 RX/TX 线程，
//! `stop()` 通知线程退出、join、清空发送队列并释放端点。

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::handler::FrameHandler;
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::pipeline::{rx_loop, tx_loop};
use crate::queue::TransmitQueue;
use crate::state::DriverState;
use canlink_can::{Connector, Frame};
#[cfg(target_os = "linux")]
use canlink_can::SocketCanConnector;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const RX_THREAD_NAME: &str = "canlink-rx";
const TX_THREAD_NAME: &str = "canlink-tx";

/// SocketCAN 上的 Driver
#[cfg(target_os = "linux")]
pub type SocketCanDriver = Driver<SocketCanConnector>;

/// 一次 start..stop 期间持有的资源
struct Session<E> {
    endpoint: Arc<E>,
    /// drop 即唤醒阻塞中的 TX 线程
    shutdown_tx: Sender<()>,
    rx_thread: JoinHandle<()>,
    tx_thread: JoinHandle<()>,
}

/// CAN 驱动
///
/// - 状态只有 `Stopped` / `Running`，`start()` / `stop()` 均幂等
/// - `Running` 时持有恰好一个端点和两个 IO 线程；`Stopped` 时一个都不持有
/// - `submit()` 非阻塞：未运行或队列满时立即拒绝
/// - drop 时自动 `stop()`
///
/// 所有方法都接受 `&self`，可以放进 `Arc` 在多个线程间共享。
///
/// # 使用示例
///
/// ```rust
/// use canlink_can::mock::MockBus;
/// use canlink_driver::{Driver, Frame};
///
/// let bus = MockBus::new();
/// let driver = Driver::with_connector("mock0", bus.connector(), |frame: Frame| {
///     println!("received {frame}");
/// });
///
/// driver.start()?;
/// driver.submit(Frame::new_standard(0x123, &[0xAA, 0xBB])?)?;
/// driver.stop();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Driver<C: Connector> {
    interface: String,
    connector: C,
    config: DriverConfig,
    handler: Arc<dyn FrameHandler>,
    queue: TransmitQueue,
    is_running: Arc<AtomicBool>,
    /// submit 持读锁检查运行标志并入队；stop 持写锁翻转运行标志
    submit_gate: RwLock<()>,
    /// 生命周期锁，同时也是 `Running` 状态的资源
    session: Mutex<Option<Session<C::Endpoint>>>,
    metrics: Arc<DriverMetrics>,
}

#[cfg(target_os = "linux")]
impl Driver<SocketCanConnector> {
    /// 创建 SocketCAN 驱动（`Stopped` 状态，不触碰接口）
    pub fn new(interface: impl Into<String>, handler: impl FrameHandler + 'static) -> Self {
        Self::with_connector(interface, SocketCanConnector, handler)
    }
}

impl<C: Connector> Driver<C> {
    /// 使用自定义端点工厂创建驱动（默认配置）
    pub fn with_connector(
        interface: impl Into<String>,
        connector: C,
        handler: impl FrameHandler + 'static,
    ) -> Self {
        Self::build(interface.into(), connector, DriverConfig::default(), Arc::new(handler))
    }

    /// 使用自定义端点工厂和配置创建驱动
    ///
    /// # 错误
    /// - `DriverError::InvalidConfig`: 配置无效
    pub fn with_config(
        interface: impl Into<String>,
        connector: C,
        config: DriverConfig,
        handler: impl FrameHandler + 'static,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self::build(interface.into(), connector, config, Arc::new(handler)))
    }

    fn build(
        interface: String,
        connector: C,
        config: DriverConfig,
        handler: Arc<dyn FrameHandler>,
    ) -> Self {
        Self {
            interface,
            connector,
            queue: TransmitQueue::new(config.queue_capacity),
            config,
            handler,
            is_running: Arc::new(AtomicBool::new(false)),
            submit_gate: RwLock::new(()),
            session: Mutex::new(None),
            metrics: Arc::new(DriverMetrics::new()),
        }
    }

    /// 启动驱动
    ///
    /// 已在运行时直接返回 `Ok(())`，不获取第二个端点。
    /// 任何一步失败都会完整回滚，驱动保持 `Stopped`，之后可以再次 `start()`。
    ///
    /// # 错误
    /// - `DriverError::Can`: 端点获取失败（携带失败的子步骤）
    /// - `DriverError::Spawn`: IO 线程创建失败
    pub fn start(&self) -> Result<(), DriverError> {
        let mut session = self.session.lock();
        if session.is_some() {
            debug!("Driver on '{}' already running", self.interface);
            return Ok(());
        }

        let endpoint = match self.connector.connect(&self.interface) {
            Ok(endpoint) => Arc::new(endpoint),
            Err(e) => {
                error!("Failed to start driver on '{}': {}", self.interface, e);
                return Err(e.into());
            },
        };

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        // Release: 线程启动前的所有写入对 IO 线程可见
        self.is_running.store(true, Ordering::Release);

        let rx_thread = {
            let endpoint = endpoint.clone();
            let handler = self.handler.clone();
            let poll_timeout = self.config.poll_timeout;
            let is_running = self.is_running.clone();
            let metrics = self.metrics.clone();
            thread::Builder::new().name(RX_THREAD_NAME.into()).spawn(move || {
                rx_loop(endpoint, handler, poll_timeout, is_running, metrics);
            })
        };
        let rx_thread = match rx_thread {
            Ok(handle) => handle,
            Err(source) => {
                self.is_running.store(false, Ordering::Release);
                error!("Failed to spawn {} thread: {}", RX_THREAD_NAME, source);
                return Err(DriverError::Spawn {
                    name: RX_THREAD_NAME,
                    source,
                });
            },
        };

        let tx_thread = {
            let endpoint = endpoint.clone();
            let queue = self.queue.receiver();
            let is_running = self.is_running.clone();
            let metrics = self.metrics.clone();
            thread::Builder::new().name(TX_THREAD_NAME.into()).spawn(move || {
                tx_loop(endpoint, queue, shutdown_rx, is_running, metrics);
            })
        };
        let tx_thread = match tx_thread {
            Ok(handle) => handle,
            Err(source) => {
                self.is_running.store(false, Ordering::Release);
                if rx_thread.join().is_err() {
                    error!("RX thread panicked during rollback");
                }
                error!("Failed to spawn {} thread: {}", TX_THREAD_NAME, source);
                return Err(DriverError::Spawn {
                    name: TX_THREAD_NAME,
                    source,
                });
            },
        };

        *session = Some(Session {
            endpoint,
            shutdown_tx,
            rx_thread,
            tx_thread,
        });
        info!("Driver started on '{}'", self.interface);
        Ok(())
    }

    /// 停止驱动
    ///
    /// 未运行时为空操作。返回时两个 IO 线程均已退出，端点已释放，
    /// 之后不会再有 handler 调用；队列中未写出的帧被丢弃并计数。
    ///
    /// 不要在 handler 内调用，RX 线程无法 join 自己。
    pub fn stop(&self) {
        let mut session = self.session.lock();
        let Some(Session {
            endpoint,
            shutdown_tx,
            rx_thread,
            tx_thread,
        }) = session.take()
        else {
            return;
        };

        {
            // 等待正在进行的 submit 完成，之后的 submit 都会看到 false
            let _gate = self.submit_gate.write();
            self.is_running.store(false, Ordering::Release);
        }

        // 必须在 join 之前 drop，否则 TX 线程不会被唤醒
        drop(shutdown_tx);

        if rx_thread.join().is_err() {
            error!("RX thread panicked");
        }
        if tx_thread.join().is_err() {
            error!("TX thread panicked");
        }

        let discarded = self.queue.clear();
        if discarded > 0 {
            self.metrics
                .tx_discarded_on_stop
                .fetch_add(discarded as u64, Ordering::Relaxed);
            warn!(
                "Discarded {} queued frame(s) on stop of '{}'",
                discarded, self.interface
            );
        }

        // IO 线程已退出，这是最后一个引用
        drop(endpoint);
        info!("Driver stopped on '{}'", self.interface);
    }

    /// 提交一帧待发送（非阻塞）
    ///
    /// 成功只表示帧已入队，不代表已写到总线上。
    ///
    /// # 错误
    /// - `DriverError::NotRunning`: 驱动未运行，帧被丢弃
    /// - `DriverError::QueueFull`: 队列已满，帧被丢弃，已入队的帧不受影响
    pub fn submit(&self, frame: Frame) -> Result<(), DriverError> {
        let _gate = self.submit_gate.read();
        if !self.is_running.load(Ordering::Acquire) {
            DriverMetrics::incr(&self.metrics.submit_rejected_stopped);
            return Err(DriverError::NotRunning);
        }
        self.queue
            .try_push(frame)
            .inspect_err(|_| DriverMetrics::incr(&self.metrics.submit_rejected_full))
    }

    pub fn state(&self) -> DriverState {
        DriverState::from(self.is_running())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 运行中且两个 IO 线程都还活着
    pub fn is_healthy(&self) -> bool {
        match self.session.lock().as_ref() {
            Some(session) => {
                !session.rx_thread.is_finished() && !session.tx_thread.is_finished()
            },
            None => false,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// 队列中等待发送的帧数
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<C: Connector> Drop for Driver<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<C: Connector> std::fmt::Debug for Driver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("interface", &self.interface)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canlink_can::AcquireStage;
    use canlink_can::mock::{MockBus, MockConnector};
    use std::time::Duration;

    fn frame(id: u16) -> Frame {
        Frame::new_standard(id, &[0x01, 0x02]).unwrap()
    }

    fn driver(bus: &Arc<MockBus>) -> Driver<MockConnector> {
        Driver::with_connector("mock0", bus.connector(), |_f: Frame| {})
    }

    #[test]
    fn test_new_driver_is_stopped() {
        let bus = MockBus::new();
        let driver = driver(&bus);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(!driver.is_healthy());
        assert_eq!(driver.interface(), "mock0");
        assert_eq!(bus.connects(), 0);
    }

    #[test]
    fn test_with_config_rejects_zero_capacity() {
        let bus = MockBus::new();
        let config = DriverConfig {
            queue_capacity: 0,
            ..DriverConfig::default()
        };
        let result = Driver::with_config("mock0", bus.connector(), config, |_f: Frame| {});
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }

    #[test]
    fn test_start_is_idempotent() {
        let bus = MockBus::new();
        let driver = driver(&bus);

        driver.start().unwrap();
        driver.start().unwrap();
        assert!(driver.is_running());
        assert!(driver.is_healthy());
        assert_eq!(bus.connects(), 1);
        assert_eq!(bus.live_endpoints(), 1);
        assert_eq!(bus.last_interface().as_deref(), Some("mock0"));

        driver.stop();
        driver.stop();
        assert_eq!(driver.state(), DriverState::Stopped);
        assert_eq!(bus.live_endpoints(), 0);
    }

    #[test]
    fn test_start_failure_rolls_back() {
        let bus = MockBus::new();
        let driver = driver(&bus);

        bus.fail_connect_at(Some(AcquireStage::Bind));
        let err = driver.start().unwrap_err();
        match err {
            DriverError::Can(e) => assert_eq!(e.acquire_stage(), Some(AcquireStage::Bind)),
            other => panic!("Expected Can error, got {other:?}"),
        }
        assert_eq!(driver.state(), DriverState::Stopped);
        assert_eq!(bus.live_endpoints(), 0);
        assert!(matches!(driver.submit(frame(1)), Err(DriverError::NotRunning)));

        bus.fail_connect_at(None);
        driver.start().unwrap();
        assert!(driver.is_running());
    }

    #[test]
    fn test_submit_rejected_while_stopped() {
        let bus = MockBus::new();
        let driver = driver(&bus);

        for id in 0x100..=0x102 {
            assert!(matches!(driver.submit(frame(id)), Err(DriverError::NotRunning)));
        }
        assert_eq!(driver.queued(), 0);
        assert_eq!(driver.metrics().submit_rejected_stopped, 3);
    }

    #[test]
    fn test_submitted_frames_are_written() {
        let bus = MockBus::new();
        let driver = driver(&bus);
        driver.start().unwrap();

        for id in 0x200..0x205 {
            driver.submit(frame(id)).unwrap();
        }
        assert!(bus.wait_for_written(5, Duration::from_secs(2)));
        driver.stop();

        let ids: Vec<u32> = bus.written().iter().map(|f| f.id()).collect();
        assert_eq!(ids, (0x200..0x205).collect::<Vec<u32>>());
        assert_eq!(driver.metrics().tx_frames, 5);
    }

    #[test]
    fn test_drop_stops_driver() {
        let bus = MockBus::new();
        {
            let driver = driver(&bus);
            driver.start().unwrap();
            assert_eq!(bus.live_endpoints(), 1);
        }
        assert_eq!(bus.live_endpoints(), 0);
    }

    #[test]
    fn test_debug_output() {
        let bus = MockBus::new();
        let driver = driver(&bus);
        let debug = format!("{driver:?}");
        assert!(debug.contains("mock0"));
        assert!(debug.contains("Stopped"));
    }
}
