//! 内存总线（Mock 模式，无硬件依赖）
//!
//! [`MockBus`] 同时扮演总线和内核 socket：测试向它注入待读取的帧或读错误，
//! 检查驱动写出的帧，并可以在任意获取子步骤注入失败。
//!
//! ```rust
//! use canlink_can::mock::MockBus;
//! use canlink_can::{Connector, Endpoint, Frame};
//! use std::time::Duration;
//!
//! let bus = MockBus::new();
//! let endpoint = bus.connector().connect("mock0").unwrap();
//!
//! bus.push_frame(Frame::new_standard(0x42, &[1]).unwrap());
//! assert!(endpoint.wait_readable(Duration::from_millis(10)).unwrap());
//! assert_eq!(endpoint.read_frame().unwrap().id(), 0x42);
//! ```

use crate::{AcquireStage, CanError, Connector, Endpoint, FRAME_SIZE, Frame, FrameError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 注入到读取队列中的一次读取结果
#[derive(Debug, Clone)]
pub enum MockRead {
    Frame(Frame),
    /// 只读到 `n` 字节
    Short(usize),
    /// 就绪但读取返回 EAGAIN（虚假就绪）
    WouldBlock,
    /// 读到 DLC 非法的帧
    InvalidDlc(u8),
    Error(io::ErrorKind),
}

/// 注入的写故障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    Error,
    /// 只写出 `n` 字节
    Short(usize),
}

#[derive(Debug)]
struct BusState {
    inbound: VecDeque<MockRead>,
    written: Vec<Frame>,
    write_attempts: usize,
    write_faults: VecDeque<WriteFault>,
    write_gate_open: bool,
    blocked_writers: usize,
    wait_failures: usize,
    connect_failure: Option<AcquireStage>,
    connects: usize,
    live_endpoints: usize,
    last_interface: Option<String>,
}

/// 内存总线
#[derive(Debug)]
pub struct MockBus {
    state: Mutex<BusState>,
    cond: Condvar,
}

impl MockBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BusState {
                inbound: VecDeque::new(),
                written: Vec::new(),
                write_attempts: 0,
                write_faults: VecDeque::new(),
                write_gate_open: true,
                blocked_writers: 0,
                wait_failures: 0,
                connect_failure: None,
                connects: 0,
                live_endpoints: 0,
                last_interface: None,
            }),
            cond: Condvar::new(),
        })
    }

    pub fn connector(self: &Arc<Self>) -> MockConnector {
        MockConnector { bus: self.clone() }
    }

    /// 模拟总线投递一帧
    pub fn push_frame(&self, frame: Frame) {
        self.push_read(MockRead::Frame(frame));
    }

    pub fn push_read(&self, read: MockRead) {
        self.state.lock().inbound.push_back(read);
        self.cond.notify_all();
    }

    pub fn pending_reads(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// 接下来的 `count` 次写入按 `fault` 失败
    pub fn fail_next_writes(&self, fault: WriteFault, count: usize) {
        let mut state = self.state.lock();
        state.write_faults.extend(std::iter::repeat_n(fault, count));
    }

    /// 接下来的 `count` 次 `wait_readable` 返回错误
    pub fn fail_next_waits(&self, count: usize) {
        self.state.lock().wait_failures += count;
    }

    /// 让后续 `connect` 在指定子步骤失败；`None` 恢复正常
    pub fn fail_connect_at(&self, stage: Option<AcquireStage>) {
        self.state.lock().connect_failure = stage;
    }

    /// 关闭写闸门：后续写入阻塞，直到 [`MockBus::open_write_gate`]
    pub fn close_write_gate(&self) {
        self.state.lock().write_gate_open = false;
    }

    pub fn open_write_gate(&self) {
        self.state.lock().write_gate_open = true;
        self.cond.notify_all();
    }

    /// 等待至少一个写入方阻塞在闸门上
    pub fn wait_for_blocked_writer(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.blocked_writers == 0 {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.blocked_writers > 0;
            }
        }
        true
    }

    /// 等待成功写出的帧数达到 `count`
    pub fn wait_for_written(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.written.len() < count {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.written.len() >= count;
            }
        }
        true
    }

    /// 已成功写到总线的帧（按写入顺序）
    pub fn written(&self) -> Vec<Frame> {
        self.state.lock().written.clone()
    }

    /// 写入尝试次数（包括失败的写入，不包括仍阻塞在闸门上的写入）
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// 当前存活的端点（含获取过程中的半成品）
    pub fn live_endpoints(&self) -> usize {
        self.state.lock().live_endpoints
    }

    pub fn last_interface(&self) -> Option<String> {
        self.state.lock().last_interface.clone()
    }
}

/// 内存总线的端点工厂
#[derive(Debug, Clone)]
pub struct MockConnector {
    bus: Arc<MockBus>,
}

impl MockConnector {
    pub fn bus(&self) -> &Arc<MockBus> {
        &self.bus
    }
}

impl Connector for MockConnector {
    type Endpoint = MockEndpoint;

    fn connect(&self, interface: &str) -> Result<Self::Endpoint, CanError> {
        let failure = {
            let mut state = self.bus.state.lock();
            state.connects += 1;
            state.last_interface = Some(interface.to_string());
            state.connect_failure
        };

        if failure == Some(AcquireStage::Open) {
            return Err(CanError::acquire(
                AcquireStage::Open,
                interface,
                io::Error::other("injected open failure"),
            ));
        }

        // 后续子步骤失败时，半成品端点随 Err 返回一起 drop
        let endpoint = MockEndpoint::new(self.bus.clone());
        if let Some(stage) = failure {
            return Err(CanError::acquire(
                stage,
                interface,
                io::Error::other(format!("injected {} failure", stage)),
            ));
        }
        Ok(endpoint)
    }
}

/// 内存总线端点
#[derive(Debug)]
pub struct MockEndpoint {
    bus: Arc<MockBus>,
}

impl MockEndpoint {
    fn new(bus: Arc<MockBus>) -> Self {
        bus.state.lock().live_endpoints += 1;
        Self { bus }
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.bus.state.lock().live_endpoints -= 1;
        self.bus.cond.notify_all();
    }
}

impl Endpoint for MockEndpoint {
    fn wait_readable(&self, timeout: Duration) -> Result<bool, CanError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.bus.state.lock();

        if state.wait_failures > 0 {
            state.wait_failures -= 1;
            return Err(CanError::Io(io::Error::other("injected poll failure")));
        }

        while state.inbound.is_empty() {
            if self.bus.cond.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        Ok(!state.inbound.is_empty())
    }

    fn read_frame(&self) -> Result<Frame, CanError> {
        let read = self.bus.state.lock().inbound.pop_front();
        match read {
            Some(MockRead::Frame(frame)) => Ok(frame),
            Some(MockRead::Short(read)) => Err(CanError::ShortRead {
                read,
                expected: FRAME_SIZE,
            }),
            Some(MockRead::InvalidDlc(dlc)) => Err(FrameError::InvalidDlc { dlc }.into()),
            Some(MockRead::Error(kind)) => Err(CanError::Io(kind.into())),
            Some(MockRead::WouldBlock) | None => Err(CanError::WouldBlock),
        }
    }

    fn write_frame(&self, frame: &Frame) -> Result<(), CanError> {
        let mut state = self.bus.state.lock();

        if !state.write_gate_open {
            state.blocked_writers += 1;
            self.bus.cond.notify_all();
            while !state.write_gate_open {
                self.bus.cond.wait(&mut state);
            }
            state.blocked_writers -= 1;
        }

        state.write_attempts += 1;
        let result = match state.write_faults.pop_front() {
            Some(WriteFault::Error) => Err(CanError::Io(io::Error::other("injected write failure"))),
            Some(WriteFault::Short(written)) => Err(CanError::ShortWrite {
                written,
                expected: FRAME_SIZE,
            }),
            None => {
                state.written.push(*frame);
                Ok(())
            },
        };
        self.bus.cond.notify_all();
        result
    }
}
