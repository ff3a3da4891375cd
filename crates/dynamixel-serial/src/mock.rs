//! 模拟舵机总线
//!
//! 用于测试的内存总线：主机写入的指令包由模拟舵机解析并回复状态包，
//! 每个舵机持有一份控制表内存。可以注入静默、回显、校验和损坏、
//! 指定寄存器写入失败和应答延迟。
//!
//! `SimulatedBus` 可以 `clone`，所有克隆共享同一份状态：
//! 一份交给总线协调器作为传输，另一份留在测试中检查事件日志。

use crate::{SerialTransport, TransportError};
use dynamixel_protocol::{
    DeviceId, Instruction, InstructionPacket, Register, S_MODEL, StatusError, StatusPacket,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 每个模拟舵机的控制表内存大小
const MEMORY_SIZE: usize = 64;

/// 总线事件（按发生顺序记录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// 主机写入的完整字节序列
    Write(Vec<u8>),
    /// 主机一次 `read` 取走的字节
    Read(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Fault {
    id: u8,
    address: u8,
    value: Option<Vec<u8>>,
    remaining: usize,
    error: StatusError,
}

impl Fault {
    fn matches(&self, packet: &InstructionPacket) -> bool {
        if packet.id.get() != self.id || packet.instruction != Instruction::Write {
            return false;
        }
        match packet.params.split_first() {
            Some((address, data)) if *address == self.address => match &self.value {
                Some(value) => data == value.as_slice(),
                None => true,
            },
            _ => false,
        }
    }
}

struct SimServo {
    memory: [u8; MEMORY_SIZE],
    pending: Option<(u8, Vec<u8>)>,
}

impl SimServo {
    fn new(id: u8) -> Self {
        let mut servo = Self {
            memory: [0; MEMORY_SIZE],
            pending: None,
        };
        let table = &S_MODEL;
        servo.put(&table.model_number, 29);
        servo.put(&table.firmware_version, 36);
        servo.put(&table.id, id as u16);
        servo.put(&table.baud_rate, 1);
        servo.put(&table.ccw_angle_limit, 4095);
        servo.put(&table.torque_limit, 1023);
        servo.put(&table.goal_position, 2048);
        servo.put(&table.present_position, 2048);
        servo.put(&table.present_voltage, 120);
        servo.put(&table.present_temperature, 35);
        servo
    }

    fn put(&mut self, register: &Register, raw: u16) {
        let start = register.address as usize;
        let bytes = raw.to_le_bytes();
        let width = register.width as usize;
        self.memory[start..start + width].copy_from_slice(&bytes[..width]);
    }

    fn get(&self, register: &Register) -> u16 {
        let start = register.address as usize;
        match register.width {
            1 => self.memory[start] as u16,
            _ => u16::from_le_bytes([self.memory[start], self.memory[start + 1]]),
        }
    }

    fn read(&self, address: u8, len: u8) -> Option<Vec<u8>> {
        let start = address as usize;
        let end = start + len as usize;
        (end <= MEMORY_SIZE).then(|| self.memory[start..end].to_vec())
    }

    /// 写入控制表；写目标位置时当前位置立即跟随
    fn write(&mut self, address: u8, data: &[u8]) -> bool {
        let start = address as usize;
        let end = start + data.len();
        if end > MEMORY_SIZE {
            return false;
        }
        self.memory[start..end].copy_from_slice(data);

        let goal = &S_MODEL.goal_position;
        let goal_start = goal.address as usize;
        if start < goal_start + goal.width as usize && goal_start < end {
            let raw = self.get(goal);
            self.put(&S_MODEL.present_position, raw);
        }
        true
    }

    fn apply_pending(&mut self) -> bool {
        match self.pending.take() {
            Some((address, data)) => self.write(address, &data),
            None => false,
        }
    }
}

struct SimState {
    servos: BTreeMap<u8, SimServo>,
    rx: VecDeque<u8>,
    ready_at: Instant,
    events: Vec<BusEvent>,
    faults: Vec<Fault>,
    muted: bool,
    echo: bool,
    corrupt_replies: usize,
    latency: Duration,
    chunk_size: usize,
    read_timeout: Duration,
    awaiting_reply: bool,
    overlaps: usize,
    closed: bool,
}

impl SimState {
    fn new() -> Self {
        Self {
            servos: BTreeMap::new(),
            rx: VecDeque::new(),
            ready_at: Instant::now(),
            events: Vec::new(),
            faults: Vec::new(),
            muted: false,
            echo: false,
            corrupt_replies: 0,
            latency: Duration::ZERO,
            chunk_size: usize::MAX,
            read_timeout: crate::DEFAULT_READ_TIMEOUT,
            awaiting_reply: false,
            overlaps: 0,
            closed: false,
        }
    }

    /// 上一条指令的应答还没被取走就开始下一轮通信，说明两条指令交错了
    fn check_overlap(&mut self) {
        if self.awaiting_reply && !self.rx.is_empty() {
            self.overlaps += 1;
        }
    }

    fn take_fault(&mut self, packet: &InstructionPacket) -> Option<StatusError> {
        let index = self.faults.iter().position(|f| f.matches(packet))?;
        let fault = &mut self.faults[index];
        let error = fault.error;
        fault.remaining -= 1;
        if fault.remaining == 0 {
            self.faults.remove(index);
        }
        Some(error)
    }

    fn process(&mut self, packet: &InstructionPacket) -> Option<StatusPacket> {
        if packet.id.is_broadcast() {
            match packet.instruction {
                Instruction::Action => {
                    for servo in self.servos.values_mut() {
                        servo.apply_pending();
                    }
                },
                Instruction::SyncWrite => self.apply_sync_write(&packet.params),
                Instruction::Write => {
                    if let Some((address, data)) = packet.params.split_first() {
                        for servo in self.servos.values_mut() {
                            servo.write(*address, data);
                        }
                    }
                },
                _ => {},
            }
            return None;
        }

        if !self.servos.contains_key(&packet.id.get()) {
            return None;
        }
        if let Some(error) = self.take_fault(packet) {
            return Some(StatusPacket::new(packet.id, error, Vec::new()));
        }

        let servo = self.servos.get_mut(&packet.id.get())?;
        let ok = StatusPacket::ack(packet.id);
        let reply = match packet.instruction {
            Instruction::Ping => ok,
            Instruction::Read => match packet.params.as_slice() {
                [address, len] => match servo.read(*address, *len) {
                    Some(data) => StatusPacket::new(packet.id, StatusError::default(), data),
                    None => range_error(packet.id),
                },
                _ => range_error(packet.id),
            },
            Instruction::Write => match packet.params.split_first() {
                Some((address, data)) if servo.write(*address, data) => ok,
                _ => range_error(packet.id),
            },
            Instruction::RegWrite => match packet.params.split_first() {
                Some((address, data)) => {
                    servo.pending = Some((*address, data.to_vec()));
                    ok
                },
                None => range_error(packet.id),
            },
            Instruction::Reset => {
                *servo = SimServo::new(packet.id.get());
                ok
            },
            Instruction::Action | Instruction::SyncWrite => {
                let mut error = StatusError::default();
                error.set_instruction(true);
                StatusPacket::new(packet.id, error, Vec::new())
            },
        };
        Some(reply)
    }

    fn apply_sync_write(&mut self, params: &[u8]) {
        let [address, width, entries @ ..] = params else {
            return;
        };
        let stride = *width as usize + 1;
        if stride == 1 {
            return;
        }
        for entry in entries.chunks_exact(stride) {
            if let Some(servo) = self.servos.get_mut(&entry[0]) {
                servo.write(*address, &entry[1..]);
            }
        }
    }
}

fn range_error(id: DeviceId) -> StatusPacket {
    let mut error = StatusError::default();
    error.set_range(true);
    StatusPacket::new(id, error, Vec::new())
}

/// 模拟舵机总线
#[derive(Clone)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// 空总线（没有任何舵机）
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    /// 挂载指定 ID 的舵机
    pub fn with_servos(ids: &[u8]) -> Self {
        let bus = Self::new();
        for id in ids {
            bus.add_servo(*id);
        }
        bus
    }

    pub fn add_servo(&self, id: u8) {
        self.state.lock().servos.insert(id, SimServo::new(id));
    }

    pub fn remove_servo(&self, id: u8) {
        self.state.lock().servos.remove(&id);
    }

    /// 静默：所有舵机都不再应答
    pub fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    /// 回显：写入的字节原样出现在接收端（部分半双工转换器的行为）
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// 应答延迟
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// 每次 `read` 最多交付的字节数
    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.state.lock().chunk_size = chunk_size.max(1);
    }

    /// 损坏接下来 `count` 个应答的校验和
    pub fn corrupt_next_replies(&self, count: usize) {
        self.state.lock().corrupt_replies = count;
    }

    /// 对 `id` 写入 `register` 的接下来 `times` 次请求回复错误状态（不执行写入）
    ///
    /// `value` 为 `Some` 时只匹配写入该原始值的请求。
    pub fn fail_write(
        &self,
        id: u8,
        register: &Register,
        value: Option<u16>,
        times: usize,
        error: StatusError,
    ) {
        if times == 0 {
            return;
        }
        let value = value.map(|raw| raw.to_le_bytes()[..register.width as usize].to_vec());
        self.state.lock().faults.push(Fault {
            id,
            address: register.address,
            value,
            remaining: times,
            error,
        });
    }

    /// 读取模拟舵机的寄存器
    pub fn register(&self, id: u8, register: &Register) -> Option<u16> {
        self.state.lock().servos.get(&id).map(|s| s.get(register))
    }

    /// 直接设置模拟舵机的寄存器（不触发位置跟随）
    pub fn set_register(&self, id: u8, register: &Register, raw: u16) {
        if let Some(servo) = self.state.lock().servos.get_mut(&id) {
            servo.put(register, raw);
        }
    }

    /// 所有事件
    pub fn events(&self) -> Vec<BusEvent> {
        self.state.lock().events.clone()
    }

    /// 主机写入的指令包（按顺序解码，无法解码的帧被跳过）
    pub fn writes(&self) -> Vec<InstructionPacket> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Write(bytes) => InstructionPacket::decode(bytes).ok(),
                BusEvent::Read(_) => None,
            })
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| matches!(e, BusEvent::Write(_)))
            .count()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// 检测到的指令交错次数
    pub fn overlaps(&self) -> usize {
        self.state.lock().overlaps
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl SerialTransport for SimulatedBus {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut s = self.state.lock();
        if s.closed {
            return Err(TransportError::Closed);
        }
        s.check_overlap();
        s.events.push(BusEvent::Write(bytes.to_vec()));
        if s.echo {
            s.rx.extend(bytes.iter().copied());
        }

        let Ok(packet) = InstructionPacket::decode(bytes) else {
            return Ok(());
        };
        let reply = match s.process(&packet) {
            Some(reply) if !s.muted => reply,
            _ => return Ok(()),
        };

        let mut frame = reply
            .encode()
            .map_err(|e| TransportError::Device(e.to_string().into()))?;
        if s.corrupt_replies > 0 {
            s.corrupt_replies -= 1;
            let last = frame.len() - 1;
            frame[last] ^= 0xFF;
        }
        s.rx.extend(frame);
        s.ready_at = Instant::now() + s.latency;
        s.awaiting_reply = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let timeout = self.state.lock().read_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut s = self.state.lock();
                if s.closed {
                    return Err(TransportError::Closed);
                }
                if !s.rx.is_empty() && Instant::now() >= s.ready_at {
                    let n = buf.len().min(s.chunk_size).min(s.rx.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = s.rx.pop_front().unwrap_or_default();
                    }
                    s.events.push(BusEvent::Read(buf[..n].to_vec()));
                    if s.rx.is_empty() {
                        s.awaiting_reply = false;
                    }
                    return Ok(n);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout);
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(1)));
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.state.lock().read_timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        let mut s = self.state.lock();
        s.check_overlap();
        s.rx.clear();
        s.awaiting_reply = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(bus: &mut SimulatedBus, packet: InstructionPacket) -> Result<StatusPacket, TransportError> {
        bus.write_all(&packet.encode().unwrap())?;
        let mut buf = [0u8; 64];
        let n = bus.read_timeout(&mut buf, Duration::from_millis(20))?;
        Ok(StatusPacket::decode(&buf[..n]).unwrap())
    }

    #[test]
    fn test_ping_present_and_absent() {
        let mut bus = SimulatedBus::with_servos(&[1]);
        let reply = exchange(&mut bus, InstructionPacket::ping(DeviceId(1))).unwrap();
        assert_eq!(reply, StatusPacket::ack(DeviceId(1)));

        let err = exchange(&mut bus, InstructionPacket::ping(DeviceId(2))).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_goal_write_moves_present_position() {
        let mut bus = SimulatedBus::with_servos(&[1]);
        let params = S_MODEL.goal_position.write_params(1024).unwrap();
        exchange(&mut bus, InstructionPacket::new(DeviceId(1), Instruction::Write, params)).unwrap();
        assert_eq!(bus.register(1, &S_MODEL.present_position), Some(1024));

        let reply = exchange(
            &mut bus,
            InstructionPacket::read(DeviceId(1), S_MODEL.present_position.address, 2),
        )
        .unwrap();
        assert_eq!(reply.value(2).unwrap(), 1024);
    }

    #[test]
    fn test_fault_injection_matches_value() {
        let mut bus = SimulatedBus::with_servos(&[1]);
        let mut error = StatusError::default();
        error.set_overload(true);
        bus.fail_write(1, &S_MODEL.torque_enable, Some(0), 1, error);

        let enable = S_MODEL.torque_enable.write_params(1).unwrap();
        let disable = S_MODEL.torque_enable.write_params(0).unwrap();

        let reply = exchange(&mut bus, InstructionPacket::new(DeviceId(1), Instruction::Write, enable)).unwrap();
        assert!(reply.error.is_ok());

        let reply = exchange(
            &mut bus,
            InstructionPacket::new(DeviceId(1), Instruction::Write, disable.clone()),
        )
        .unwrap();
        assert!(reply.error.overload());

        // 故障只触发一次
        let reply = exchange(&mut bus, InstructionPacket::new(DeviceId(1), Instruction::Write, disable)).unwrap();
        assert!(reply.error.is_ok());
        assert_eq!(bus.register(1, &S_MODEL.torque_enable), Some(0));
    }

    #[test]
    fn test_reg_write_waits_for_action() {
        let mut bus = SimulatedBus::with_servos(&[1, 2]);
        let data = S_MODEL.goal_position.encode(100).unwrap();
        exchange(
            &mut bus,
            InstructionPacket::reg_write(DeviceId(2), S_MODEL.goal_position.address, &data),
        )
        .unwrap();
        assert_eq!(bus.register(2, &S_MODEL.goal_position), Some(2048));

        bus.write_all(&InstructionPacket::action().encode().unwrap()).unwrap();
        assert_eq!(bus.register(2, &S_MODEL.goal_position), Some(100));
        assert_eq!(bus.register(1, &S_MODEL.goal_position), Some(2048));
    }

    #[test]
    fn test_sync_write_updates_every_listed_servo() {
        let mut bus = SimulatedBus::with_servos(&[1, 2, 3]);
        let packet = InstructionPacket::sync_write(
            S_MODEL.goal_position.address,
            2,
            &[(DeviceId(1), vec![0x10, 0x00]), (DeviceId(3), vec![0x20, 0x00])],
        )
        .unwrap();
        bus.write_all(&packet.encode().unwrap()).unwrap();
        assert_eq!(bus.register(1, &S_MODEL.goal_position), Some(0x10));
        assert_eq!(bus.register(2, &S_MODEL.goal_position), Some(2048));
        assert_eq!(bus.register(3, &S_MODEL.goal_position), Some(0x20));
    }

    #[test]
    fn test_muted_bus_times_out() {
        let mut bus = SimulatedBus::with_servos(&[1]);
        bus.set_muted(true);
        let start = Instant::now();
        let err = exchange(&mut bus, InstructionPacket::ping(DeviceId(1))).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_overlap_detection() {
        let mut bus = SimulatedBus::with_servos(&[1]);
        let ping = InstructionPacket::ping(DeviceId(1)).encode().unwrap();
        bus.write_all(&ping).unwrap();
        bus.write_all(&ping).unwrap();
        assert_eq!(bus.overlaps(), 1);
    }

    #[test]
    fn test_closed_bus_rejects_io() {
        let mut bus = SimulatedBus::with_servos(&[1]);
        bus.close().unwrap();
        assert!(bus.is_closed());
        assert!(matches!(bus.write_all(&[0xFF]), Err(TransportError::Closed)));
    }
}
