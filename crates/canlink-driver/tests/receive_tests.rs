//! 接收路径测试
//!
//! 验证 RX 线程：
//! 1. 每帧恰好一次 handler 调用，顺序即接收顺序
//! 2. 短读、非法帧、虚假就绪、等待失败都不会终止 RX 线程
//! 3. RX 与 TX 互不阻塞

use canlink_can::mock::{MockBus, MockRead};
use canlink_driver::{Driver, Frame};
use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn frame(id: u16) -> Frame {
    Frame::new_standard(id, &[(id & 0xFF) as u8, 0x55]).unwrap()
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn test_handler_called_once_per_frame_in_order() {
    let bus = MockBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    let driver = Driver::with_connector("vcan-test", bus.connector(), move |f: Frame| {
        received_clone.lock().push(f);
    });
    driver.start().unwrap();

    let sent: Vec<Frame> = (0..200).map(|i| frame(0x400 + i)).collect();
    for f in &sent {
        bus.push_frame(*f);
    }

    assert!(wait_until(WAIT, || received.lock().len() >= sent.len()));
    driver.stop();

    assert_eq!(*received.lock(), sent);
    assert_eq!(driver.metrics().rx_frames, 200);
}

#[test]
fn test_channel_handler() {
    let bus = MockBus::new();
    let (tx, rx) = unbounded::<Frame>();
    let driver = Driver::with_connector("vcan-test", bus.connector(), tx);
    driver.start().unwrap();

    bus.push_frame(frame(0x123));
    bus.push_frame(frame(0x124));

    assert_eq!(rx.recv_timeout(WAIT).unwrap().id(), 0x123);
    assert_eq!(rx.recv_timeout(WAIT).unwrap().id(), 0x124);
    driver.stop();
}

#[test]
fn test_read_errors_do_not_stop_receiving() {
    let bus = MockBus::new();
    let (tx, rx) = unbounded::<Frame>();
    let driver = Driver::with_connector("vcan-test", bus.connector(), tx);
    driver.start().unwrap();

    bus.push_read(MockRead::Short(4));
    bus.push_read(MockRead::InvalidDlc(9));
    bus.push_read(MockRead::Error(io::ErrorKind::Other));
    bus.push_read(MockRead::WouldBlock);
    bus.push_frame(frame(0x321));

    assert_eq!(rx.recv_timeout(WAIT).unwrap().id(), 0x321);
    assert!(rx.try_recv().is_err());

    let snapshot = driver.metrics();
    assert_eq!(snapshot.rx_errors, 3);
    assert_eq!(snapshot.rx_would_block, 1);
    assert_eq!(snapshot.rx_frames, 1);
    assert!(driver.is_healthy());
}

#[test]
fn test_poll_failures_are_tolerated() {
    let bus = MockBus::new();
    let (tx, rx) = unbounded::<Frame>();
    let driver = Driver::with_connector("vcan-test", bus.connector(), tx);

    bus.fail_next_waits(3);
    driver.start().unwrap();
    bus.push_frame(frame(0x77));

    assert_eq!(rx.recv_timeout(WAIT).unwrap().id(), 0x77);
    assert_eq!(driver.metrics().rx_poll_errors, 3);
    assert!(driver.is_healthy());
}

#[test]
fn test_rx_continues_while_tx_is_stalled() {
    let bus = MockBus::new();
    let (tx, rx) = unbounded::<Frame>();
    let driver = Driver::with_connector("vcan-test", bus.connector(), tx);
    driver.start().unwrap();

    bus.close_write_gate();
    driver.submit(frame(0x600)).unwrap();
    assert!(bus.wait_for_blocked_writer(WAIT));

    for id in 0..10 {
        bus.push_frame(frame(id));
    }
    for id in 0..10u32 {
        assert_eq!(rx.recv_timeout(WAIT).unwrap().id(), id);
    }

    bus.open_write_gate();
    assert!(bus.wait_for_written(1, WAIT));
    driver.stop();
}

#[test]
fn test_slow_handler_delays_but_keeps_order() {
    let bus = MockBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    let driver = Driver::with_connector("vcan-test", bus.connector(), move |f: Frame| {
        thread::sleep(Duration::from_millis(2));
        received_clone.lock().push(f.id());
    });
    driver.start().unwrap();

    for id in 0..20 {
        bus.push_frame(frame(id));
    }
    assert!(wait_until(WAIT, || received.lock().len() == 20));
    driver.stop();

    assert_eq!(*received.lock(), (0..20).collect::<Vec<u32>>());
}
