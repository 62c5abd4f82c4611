//! # canlink CLI
//!
//! 向 CAN 接口发送一段测试帧，同时打印收到的所有帧，Ctrl+C 退出。
//!
//! ```bash
//! # 准备虚拟接口
//! sudo modprobe vcan
//! sudo ip link add dev vcan0 type vcan
//! sudo ip link set up vcan0
//!
//! # 发送 1000 帧（ID 0x123..0x12C 循环），每帧间隔 1ms
//! canlink-cli --interface vcan0
//!
//! # 另一个终端观察
//! candump vcan0
//! ```

use anyhow::Result;
use clap::Parser;

mod burst;

/// canlink CLI - CAN 收发工具
#[derive(Parser, Debug)]
#[command(name = "canlink-cli")]
#[command(about = "Send a burst of CAN frames and print every received frame", long_about = None)]
#[command(version)]
struct Cli {
    /// CAN 接口名
    #[arg(short, long, default_value = "can0")]
    interface: String,

    /// 发送帧数
    #[arg(short, long, default_value_t = 1000)]
    count: u32,

    /// 帧间隔（毫秒）
    #[arg(long, default_value_t = 1)]
    interval_ms: u64,

    /// 起始 CAN ID（十六进制，可带 0x 前缀）
    #[arg(long, default_value = "0x123", value_parser = burst::parse_can_id)]
    base_id: u32,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("canlink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    burst::run(burst::BurstArgs {
        interface: cli.interface,
        count: cli.count,
        interval_ms: cli.interval_ms,
        base_id: cli.base_id,
    })
}
