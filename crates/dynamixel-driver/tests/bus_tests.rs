//! 总线协调器集成测试（模拟舵机总线）

use dynamixel_driver::{Bus, BusBuilder, BusConfig, CancellationToken, DriverError, Servo};
use dynamixel_protocol::{
    DeviceId, Instruction, ProtocolError, S_MODEL, StatusError, StatusPacket,
};
use dynamixel_serial::mock::SimulatedBus;
use dynamixel_serial::{SerialTransport, TransportError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn bus_with(sim: &SimulatedBus, read_timeout: Duration) -> Arc<Bus> {
    BusBuilder::new()
        .read_timeout(read_timeout)
        .poll_interval(Duration::from_millis(5))
        .build_with_transport(sim.clone())
}

/// 按脚本返回字节的传输层：每次写入后把下一段应答放进接收缓冲
struct ScriptedTransport {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Vec<u8>>) -> Self {
        Self {
            replies: replies.into(),
            rx: VecDeque::new(),
        }
    }
}

impl SerialTransport for ScriptedTransport {
    fn write_all(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.rx.is_empty() {
            thread::sleep(Duration::from_millis(1));
            return Err(TransportError::Timeout);
        }
        let n = buf.len().min(self.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

fn ack(id: u8) -> Vec<u8> {
    StatusPacket::ack(DeviceId(id)).encode().unwrap()
}

#[test]
fn test_concurrent_transactions_never_interleave() {
    let sim = SimulatedBus::with_servos(&[1, 2, 3, 4]);
    sim.set_latency(Duration::from_micros(500));
    let bus = bus_with(&sim, Duration::from_millis(200));

    let handles: Vec<_> = (1..=4u8)
        .flat_map(|id| [id, id])
        .map(|id| {
            let bus = bus.clone();
            thread::spawn(move || {
                let servo = Servo::new(bus, id).unwrap();
                let token = CancellationToken::new();
                for i in 0..20u32 {
                    servo.move_to(f64::from(i * 10), &token).unwrap();
                    servo.angle(&token).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(sim.overlaps(), 0);
    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.transactions, 8 * 40);
    assert_eq!(snapshot.timeouts, 0);
}

#[test]
fn test_silent_servo_times_out_within_bound() {
    let sim = SimulatedBus::with_servos(&[1]);
    sim.set_muted(true);
    let bus = bus_with(&sim, Duration::from_millis(50));

    let start = Instant::now();
    let err = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &CancellationToken::new())
        .unwrap_err();
    let elapsed = start.elapsed();

    match err {
        DriverError::Timeout { id, waited } => {
            assert_eq!(id, DeviceId(1));
            assert!(waited >= Duration::from_millis(50));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(50 + 200), "took {elapsed:?}");
    assert_eq!(bus.metrics().snapshot().timeouts, 1);
}

#[test]
fn test_cancel_while_waiting_for_reply() {
    let sim = SimulatedBus::with_servos(&[1]);
    sim.set_muted(true);
    let bus = bus_with(&sim, Duration::from_secs(5));
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            token.cancel();
        })
    };

    let start = Instant::now();
    let err = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &token)
        .unwrap_err();
    canceller.join().unwrap();

    assert!(err.is_cancelled());
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(bus.metrics().snapshot().cancelled, 1);
}

#[test]
fn test_cancel_while_queued_for_bus() {
    let sim = SimulatedBus::with_servos(&[1]);
    sim.set_muted(true);
    let bus = bus_with(&sim, Duration::from_millis(800));

    // 占住总线
    let holder = {
        let bus = bus.clone();
        thread::spawn(move || {
            bus.transact(DeviceId(1), Instruction::Ping, &[], &CancellationToken::new())
        })
    };
    thread::sleep(Duration::from_millis(20));

    let token = CancellationToken::new();
    let queued = {
        let bus = bus.clone();
        let token = token.clone();
        thread::spawn(move || {
            let start = Instant::now();
            let result = bus.transact(DeviceId(1), Instruction::Ping, &[], &token);
            (result, start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(20));
    token.cancel();

    let (result, elapsed) = queued.join().unwrap();
    assert!(matches!(result, Err(DriverError::Cancelled)));
    assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");

    // 排队者从未写过总线
    assert!(holder.join().unwrap().unwrap_err().is_timeout());
    assert_eq!(sim.write_count(), 1);
}

#[test]
fn test_echo_frame_is_filtered() {
    let sim = SimulatedBus::with_servos(&[1]);
    sim.set_echo(true);
    let bus = bus_with(&sim, Duration::from_millis(100));

    let status = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &CancellationToken::new())
        .unwrap();
    assert_eq!(status, StatusPacket::ack(DeviceId(1)));

    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.rx_echo_filtered, 1);
    assert_eq!(snapshot.rx_frames, 2);
}

#[test]
fn test_partial_reads_are_reassembled() {
    let sim = SimulatedBus::with_servos(&[1]);
    sim.set_chunk_size(1);
    let bus = bus_with(&sim, Duration::from_millis(100));
    let servo = Servo::new(bus, 1).unwrap();
    assert_eq!(servo.angle(&CancellationToken::new()).unwrap(), 180.0);
}

#[test]
fn test_foreign_frames_and_noise_are_skipped() {
    let mut reply = vec![0x00, 0x13];
    reply.extend(ack(2));
    reply.extend(ack(1));
    let bus = Arc::new(Bus::new(ScriptedTransport::new(vec![reply])));

    let status = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &CancellationToken::new())
        .unwrap();
    assert_eq!(status.id, DeviceId(1));
    assert_eq!(bus.metrics().snapshot().rx_foreign, 1);
}

#[test]
fn test_noise_with_oversized_length_does_not_hide_reply() {
    // 噪声看起来像帧头，但 LEN = 0xF0 远超 PING 应答
    let mut reply = vec![0xFF, 0xFF, 0x01, 0xF0];
    reply.extend(ack(1));
    let bus = Arc::new(Bus::with_config(
        ScriptedTransport::new(vec![reply]),
        BusConfig {
            read_timeout: Duration::from_millis(200),
            ..BusConfig::default()
        },
    ));

    let start = Instant::now();
    let status = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &CancellationToken::new())
        .unwrap();
    assert_eq!(status.id, DeviceId(1));
    assert!(start.elapsed() < Duration::from_millis(150));
    assert_eq!(bus.metrics().snapshot().timeouts, 0);
}

#[test]
fn test_bus_debug_shows_config() {
    let bus = Bus::new(ScriptedTransport::new(Vec::new()));
    let text = format!("{bus:?}");
    assert!(text.starts_with("Bus"));
    assert!(text.contains("read_timeout"));
}

#[test]
fn test_corrupted_reply_reports_checksum_error() {
    let sim = SimulatedBus::with_servos(&[1]);
    sim.corrupt_next_replies(1);
    let bus = bus_with(&sim, Duration::from_millis(100));
    let token = CancellationToken::new();

    let err = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &token)
        .unwrap_err();
    assert!(matches!(err, DriverError::Protocol(ProtocolError::Checksum { .. })));
    assert_eq!(bus.metrics().snapshot().checksum_errors, 1);

    // 不自动重试；下一次请求正常
    assert_eq!(sim.write_count(), 1);
    bus.transact(DeviceId(1), Instruction::Ping, &[], &token)
        .unwrap();
}

#[test]
fn test_status_error_is_surfaced() {
    let sim = SimulatedBus::with_servos(&[1]);
    let mut flags = StatusError::default();
    flags.set_overheating(true);
    sim.fail_write(1, &S_MODEL.led, None, 1, flags);
    let bus = bus_with(&sim, Duration::from_millis(100));
    let servo = Servo::new(bus.clone(), 1).unwrap();

    let err = servo.set_led(true, &CancellationToken::new()).unwrap_err();
    match err.root() {
        DriverError::Status { id, error } => {
            assert_eq!(*id, DeviceId(1));
            assert!(error.overheating());
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bus.metrics().snapshot().status_errors, 1);
}

#[test]
fn test_transact_to_broadcast_is_rejected() {
    let sim = SimulatedBus::with_servos(&[1]);
    let bus = bus_with(&sim, Duration::from_millis(100));
    let err = bus
        .transact(DeviceId::BROADCAST, Instruction::Ping, &[], &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, DriverError::InvalidInput(_)));
    assert_eq!(sim.write_count(), 0);
}

#[test]
fn test_sync_write_moves_several_servos_in_one_frame() {
    let sim = SimulatedBus::with_servos(&[1, 2]);
    let bus = bus_with(&sim, Duration::from_millis(100));
    bus.sync_write(
        &S_MODEL.goal_position,
        &[(DeviceId(1), 1024), (DeviceId(2), 3072)],
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(sim.write_count(), 1);
    assert_eq!(sim.register(1, &S_MODEL.present_position), Some(1024));
    assert_eq!(sim.register(2, &S_MODEL.present_position), Some(3072));

    let err = bus
        .sync_write(&S_MODEL.moving, &[(DeviceId(1), 1)], &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, DriverError::InvalidInput(_)));
}

#[test]
fn test_reg_move_waits_for_action() {
    let sim = SimulatedBus::with_servos(&[1, 2]);
    let bus = bus_with(&sim, Duration::from_millis(100));
    let token = CancellationToken::new();
    let a = Servo::new(bus.clone(), 1).unwrap();
    let b = Servo::new(bus.clone(), 2).unwrap();

    a.reg_move_to(90.0, &token).unwrap();
    b.reg_move_to(270.0, &token).unwrap();
    assert_eq!(a.angle(&token).unwrap(), 180.0);

    bus.action(&token).unwrap();
    assert_eq!(a.angle(&token).unwrap(), 90.0);
    assert_eq!(b.angle(&token).unwrap(), 270.0);
}

#[test]
fn test_scan_finds_present_servos() {
    let sim = SimulatedBus::with_servos(&[1, 5]);
    let bus = Arc::new(Bus::with_config(
        sim.clone(),
        BusConfig {
            scan_timeout: Duration::from_millis(5),
            poll_interval: Duration::from_millis(1),
            ..BusConfig::default()
        },
    ));
    let found = bus.scan(0..8, &CancellationToken::new()).unwrap();
    assert_eq!(found, vec![DeviceId(1), DeviceId(5)]);
}

#[test]
fn test_close_rejects_later_io() {
    let sim = SimulatedBus::with_servos(&[1]);
    let bus = bus_with(&sim, Duration::from_millis(100));
    let token = CancellationToken::new();
    bus.close(&token).unwrap();
    assert!(sim.is_closed());

    let err = bus
        .transact(DeviceId(1), Instruction::Ping, &[], &token)
        .unwrap_err();
    assert!(matches!(err, DriverError::Transport(TransportError::Closed)));
}
