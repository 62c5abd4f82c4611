use crate::error::DriverError;
use crate::queue::MAX_QUEUE_SIZE;
use std::time::Duration;

/// Driver 配置
///
/// 控制 IO 线程的行为。默认值即标准行为：10ms 轮询超时，10,000 帧发送队列。
///
/// # Example
///
/// ```
/// use canlink_driver::DriverConfig;
/// use std::time::Duration;
///
/// let config = DriverConfig::default();
/// assert_eq!(config.poll_timeout, Duration::from_millis(10));
///
/// let config = DriverConfig {
///     poll_timeout: Duration::from_millis(2),
///     ..DriverConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    /// RX 线程等待可读的超时
    ///
    /// 同时决定 handler 调用的最坏延迟，以及 RX 线程观察到 stop 信号的最长时间。
    pub poll_timeout: Duration,
    /// 发送队列容量（至少为 1）
    pub queue_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(10),
            queue_capacity: MAX_QUEUE_SIZE,
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.queue_capacity == 0 {
            return Err(DriverError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_timeout.is_zero() {
            return Err(DriverError::InvalidConfig(
                "poll_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
