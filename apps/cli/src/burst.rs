//! 发送测试帧并监听总线

use anyhow::Result;
use canlink_frame::{CAN_EFF_MASK, CAN_SFF_MASK, Frame, FrameError};

/// 发送参数
#[derive(Debug, Clone)]
pub struct BurstArgs {
    pub interface: String,
    pub count: u32,
    pub interval_ms: u64,
    pub base_id: u32,
}

/// 每轮发送循环使用的 ID 个数（`base .. base + 9`）
pub const BURST_ID_SPAN: u32 = 10;

/// 解析十六进制起始 CAN ID（`0x123` / `123`）
///
/// 整轮循环的最大 ID `base + 9` 也必须在 29 位以内。
pub fn parse_can_id(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let id = u32::from_str_radix(digits, 16).map_err(|e| format!("invalid CAN ID '{}': {}", s, e))?;
    if id > CAN_EFF_MASK {
        return Err(format!("CAN ID 0x{:X} exceeds 29 bits", id));
    }
    let max_base = CAN_EFF_MASK - (BURST_ID_SPAN - 1);
    if id > max_base {
        return Err(format!(
            "base CAN ID 0x{:X} is too large: burst uses IDs up to base + {} (max base 0x{:X})",
            id,
            BURST_ID_SPAN - 1,
            max_base
        ));
    }
    Ok(id)
}

/// 第 `i` 帧：ID 为 `base + i % 10`，8 字节数据 `i + j`
pub fn burst_frame(base_id: u32, i: u32) -> Result<Frame, FrameError> {
    let id = base_id + i % BURST_ID_SPAN;
    let data: [u8; 8] = std::array::from_fn(|j| (i as u8).wrapping_add(j as u8));
    if id <= CAN_SFF_MASK {
        Frame::new_standard(id as u16, &data)
    } else {
        Frame::new_extended(id, &data)
    }
}

#[cfg(target_os = "linux")]
pub fn run(args: BurstArgs) -> Result<()> {
    use anyhow::Context;
    use canlink_driver::{Driver, DriverError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use tracing::{info, warn};

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        println!("\n收到退出信号，正在关闭...");
    })?;

    let driver = Driver::new(args.interface.as_str(), |frame: Frame| {
        println!("{}", frame);
    });
    driver
        .start()
        .with_context(|| format!("failed to start driver on '{}'", args.interface))?;
    println!("✅ 已启动: {}", args.interface);

    let interval = Duration::from_millis(args.interval_ms);
    let mut accepted = 0u32;
    let mut rejected = 0u32;
    for i in 0..args.count {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match driver.submit(burst_frame(args.base_id, i)?) {
            Ok(()) => accepted += 1,
            Err(e @ (DriverError::QueueFull { .. } | DriverError::NotRunning)) => {
                warn!("Frame {} rejected: {}", i, e);
                rejected += 1;
            },
            Err(e) => return Err(e.into()),
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    info!(
        "Burst complete: {} accepted, {} rejected",
        accepted, rejected
    );
    println!("发送完成，按 Ctrl+C 退出");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    driver.stop();

    let m = driver.metrics();
    println!("📊 统计:");
    println!("  RX 帧数:       {}", m.rx_frames);
    println!("  RX 错误:       {}", m.rx_errors + m.rx_poll_errors);
    println!("  TX 帧数:       {}", m.tx_frames);
    println!("  TX 写失败丢弃: {}", m.tx_dropped);
    println!("  stop 时丢弃:   {}", m.tx_discarded_on_stop);
    println!("  提交被拒绝:    {}", m.submit_rejected());
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn run(args: BurstArgs) -> Result<()> {
    anyhow::bail!(
        "SocketCAN is only available on Linux (interface '{}')",
        args.interface
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_can_id() {
        assert_eq!(parse_can_id("0x123"), Ok(0x123));
        assert_eq!(parse_can_id("7FF"), Ok(0x7FF));
        assert_eq!(parse_can_id("0X1FFFFFF6"), Ok(0x1FFF_FFF6));
        assert!(parse_can_id("0x20000000").is_err());
        assert!(parse_can_id("zz").is_err());
    }

    #[test]
    fn test_parse_can_id_rejects_base_that_overflows_burst() {
        assert!(parse_can_id("1FFFFFF7").is_err());
        assert!(parse_can_id("0x1FFFFFFF").is_err());

        // 允许的最大起始 ID，整轮循环都能构造成扩展帧
        let base = parse_can_id("0x1FFFFFF6").unwrap();
        for i in 0..BURST_ID_SPAN {
            let frame = burst_frame(base, i).unwrap();
            assert_eq!(frame.bus_id(), base + i);
        }
    }

    #[test]
    fn test_burst_frame_pattern() {
        let frame = burst_frame(0x123, 13).unwrap();
        assert_eq!(frame.id(), 0x126);
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.data(), &[13, 14, 15, 16, 17, 18, 19, 20]);

        let frame = burst_frame(0x123, 255).unwrap();
        assert_eq!(frame.data()[1], 0);
    }

    #[test]
    fn test_burst_frame_switches_to_extended() {
        let frame = burst_frame(0x7FE, 3).unwrap();
        assert!(frame.is_extended());
        assert_eq!(frame.bus_id(), 0x801);
    }
}
