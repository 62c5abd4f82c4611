//! 驱动层模块
//!
//! 本模块提供单一 CAN 接口的收发驱动，包括：
//! - 端点获取与释放（任一子步骤失败完整回滚）
//! - RX 线程：短超时轮询，逐帧同步回调
//! - TX 线程：有界发送队列，写操作在队列同步之外执行
//! - start/stop 状态机：幂等，stop 返回前 join 两个线程
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use canlink_driver::{Driver, Frame};
//!
//! let driver = Driver::new("can0", |frame: Frame| println!("{frame}"));
//! driver.start()?;
//! driver.submit(Frame::new_standard(0x123, &[1, 2, 3])?)?;
//! driver.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod driver;
mod error;
pub mod handler;
pub mod metrics;
pub mod pipeline;
pub mod queue;
mod state;

pub use canlink_can::{AcquireStage, CanError, Connector, Endpoint, Frame, FrameError};
#[cfg(target_os = "linux")]
pub use canlink_can::{SocketCanConnector, SocketCanEndpoint};

pub use config::DriverConfig;
#[cfg(target_os = "linux")]
pub use driver::SocketCanDriver;
pub use driver::Driver;
pub use error::DriverError;
pub use handler::FrameHandler;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pipeline::{rx_loop, tx_loop};
pub use queue::{MAX_QUEUE_SIZE, TransmitQueue};
pub use state::DriverState;
