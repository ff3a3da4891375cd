//! 总线协调器
//!
//! 一条物理总线上同一时刻只允许一对“指令-应答”在途。`Bus` 持有传输层，
//! 互斥锁覆盖完整的“写指令 → 读应答”周期；所有舵机句柄通过 `Arc<Bus>`
//! 共享同一条总线。

use crate::cancel::CancellationToken;
use crate::error::DriverError;
use crate::metrics::BusMetrics;
use dynamixel_protocol::{
    DeviceId, Instruction, MIN_FRAME_LEN, ProtocolError, Register, StatusPacket, encode, find_header,
    frame_len,
};
use dynamixel_serial::{SerialTransport, TransportError};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 总线时序配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// 等待一个状态包的截止时间
    pub read_timeout: Duration,
    /// 单次传输层读取的最长时间（取消令牌的最大观测延迟）
    pub poll_interval: Duration,
    /// 排队等锁时每次尝试的时长
    pub lock_slice: Duration,
    /// `scan` 中每个 ID 的 PING 截止时间
    pub scan_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            lock_slice: Duration::from_millis(10),
            scan_timeout: Duration::from_millis(20),
        }
    }
}

type Transport = Box<dyn SerialTransport>;

/// 总线协调器
pub struct Bus {
    transport: Mutex<Transport>,
    config: BusConfig,
    metrics: Arc<BusMetrics>,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

impl Bus {
    pub fn new(transport: impl SerialTransport + 'static) -> Self {
        Self::with_config(transport, BusConfig::default())
    }

    pub fn with_config(transport: impl SerialTransport + 'static, config: BusConfig) -> Self {
        Self {
            transport: Mutex::new(Box::new(transport)),
            config,
            metrics: Arc::new(BusMetrics::new()),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    /// 发送一条指令并等待目标舵机的状态包（使用默认读截止时间）
    ///
    /// # Errors
    /// - `Cancelled`: 排队或等待期间令牌被触发
    /// - `Timeout`: 截止时间内没有收到 `id` 的有效状态包
    /// - `Protocol`: 应答校验和错误或帧结构错误
    /// - `Status`: 舵机在状态包中报告了错误
    /// - `Transport`: 串口读写失败
    pub fn transact(
        &self,
        id: DeviceId,
        instruction: Instruction,
        params: &[u8],
        token: &CancellationToken,
    ) -> Result<StatusPacket, DriverError> {
        self.transact_with_timeout(id, instruction, params, self.config.read_timeout, token)
    }

    /// 与 [`transact`](Self::transact) 相同，但使用指定的读截止时间
    pub fn transact_with_timeout(
        &self,
        id: DeviceId,
        instruction: Instruction,
        params: &[u8],
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<StatusPacket, DriverError> {
        if id.is_broadcast() {
            return Err(DriverError::InvalidInput(format!(
                "{} to broadcast id never gets a reply; use Bus::broadcast",
                instruction.name()
            )));
        }
        let frame = encode(id, instruction, params)?;
        BusMetrics::incr(&self.metrics.transactions);

        let result = self.exchange(id, &frame, reply_len(instruction, params), timeout, token);
        self.record(&result);
        if let Err(e) = &result {
            debug!("{} to servo {} failed: {}", instruction.name(), id, e);
        }
        result
    }

    /// 广播一条指令（设备不会应答，不等待）
    pub fn broadcast(
        &self,
        instruction: Instruction,
        params: &[u8],
        token: &CancellationToken,
    ) -> Result<(), DriverError> {
        let frame = encode(DeviceId::BROADCAST, instruction, params)?;
        let result = self.send_only(&frame, token);
        self.record(&result);
        result
    }

    /// SYNC WRITE：一帧广播把同一寄存器写到多个舵机
    pub fn sync_write(
        &self,
        register: &Register,
        values: &[(DeviceId, u16)],
        token: &CancellationToken,
    ) -> Result<(), DriverError> {
        if !register.is_writable() {
            return Err(DriverError::InvalidInput(format!(
                "register {} is read-only",
                register.name
            )));
        }
        let mut params = Vec::with_capacity(2 + values.len() * (register.width as usize + 1));
        params.push(register.address);
        params.push(register.width);
        for (id, raw) in values {
            if id.is_broadcast() {
                return Err(DriverError::InvalidInput(
                    "sync write entries need addressable ids".into(),
                ));
            }
            params.push(id.get());
            params.extend(register.encode(*raw)?);
        }
        self.broadcast(Instruction::SyncWrite, &params, token)
    }

    /// 广播 ACTION，执行所有舵机上暂存的 REG WRITE
    pub fn action(&self, token: &CancellationToken) -> Result<(), DriverError> {
        self.broadcast(Instruction::Action, &[], token)
    }

    /// 依次 PING 每个 ID，返回有应答的设备
    ///
    /// 舵机报告了错误状态也说明它在线，同样计入结果。
    pub fn scan(
        &self,
        ids: impl IntoIterator<Item = u8>,
        token: &CancellationToken,
    ) -> Result<Vec<DeviceId>, DriverError> {
        let mut found = Vec::new();
        for raw in ids {
            let Ok(id) = DeviceId::new(raw) else {
                continue;
            };
            match self.transact_with_timeout(
                id,
                Instruction::Ping,
                &[],
                self.config.scan_timeout,
                token,
            ) {
                Ok(_) | Err(DriverError::Status { .. }) => {
                    debug!("Found servo {id}");
                    found.push(id);
                },
                Err(e) if e.is_timeout() => {},
                Err(DriverError::Cancelled) => return Err(DriverError::Cancelled),
                Err(DriverError::Protocol(e)) => warn!("Garbled reply while scanning id {id}: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// 关闭传输层（之后的 IO 返回 `Transport(Closed)`）
    pub fn close(&self, token: &CancellationToken) -> Result<(), DriverError> {
        let mut transport = self.lock(token)?;
        transport.close()?;
        Ok(())
    }

    /// 分片等锁，使排队中的调用者也能观测到取消
    fn lock(&self, token: &CancellationToken) -> Result<MutexGuard<'_, Transport>, DriverError> {
        loop {
            token.check()?;
            if let Some(guard) = self.transport.try_lock_for(self.config.lock_slice) {
                return Ok(guard);
            }
        }
    }

    fn send_only(&self, frame: &[u8], token: &CancellationToken) -> Result<(), DriverError> {
        let mut transport = self.lock(token)?;
        transport.clear_input()?;
        transport.write_all(frame)?;
        BusMetrics::incr(&self.metrics.tx_frames);
        trace!("TX {:02X?}", frame);
        Ok(())
    }

    fn exchange(
        &self,
        id: DeviceId,
        frame: &[u8],
        reply_len: usize,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<StatusPacket, DriverError> {
        let mut transport = self.lock(token)?;
        transport.clear_input()?;
        transport.write_all(frame)?;
        BusMetrics::incr(&self.metrics.tx_frames);
        trace!("TX {:02X?}", frame);

        let status = self.receive(&mut transport, id, frame, reply_len, timeout, token)?;
        if !status.error.is_ok() {
            return Err(DriverError::Status {
                id,
                error: status.error,
            });
        }
        Ok(status)
    }

    /// 读取直到收到 `id` 的状态包、截止时间到达或令牌被触发
    ///
    /// 声明长度超过 `reply_len`（且不是回显）的帧头视为噪声。
    fn receive(
        &self,
        transport: &mut Transport,
        id: DeviceId,
        sent: &[u8],
        reply_len: usize,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<StatusPacket, DriverError> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut pending: Vec<u8> = Vec::with_capacity(32);
        let mut chunk = [0u8; 64];
        let mut echo_seen = false;
        let max_len = reply_len.max(sent.len());

        loop {
            while let Some(frame) = next_frame(&mut pending, max_len)? {
                BusMetrics::incr(&self.metrics.rx_frames);
                trace!("RX {:02X?}", frame);
                if !echo_seen && frame == sent {
                    echo_seen = true;
                    BusMetrics::incr(&self.metrics.rx_echo_filtered);
                    continue;
                }
                let status = StatusPacket::decode(&frame)?;
                if status.id != id {
                    BusMetrics::incr(&self.metrics.rx_foreign);
                    warn!("Discarding status packet from servo {} (waiting for {})", status.id, id);
                    continue;
                }
                return Ok(status);
            }

            token.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Err(DriverError::Timeout {
                    id,
                    waited: now - start,
                });
            }
            let slice = (deadline - now).min(self.config.poll_interval);
            match transport.read_timeout(&mut chunk, slice) {
                Ok(n) => pending.extend_from_slice(&chunk[..n]),
                Err(TransportError::Timeout) => {},
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn record<T>(&self, result: &Result<T, DriverError>) {
        let Err(e) = result else {
            return;
        };
        let counter = match e.root() {
            DriverError::Timeout { .. } => &self.metrics.timeouts,
            DriverError::Cancelled => &self.metrics.cancelled,
            DriverError::Status { .. } => &self.metrics.status_errors,
            DriverError::Protocol(p) if p.is_checksum() => &self.metrics.checksum_errors,
            DriverError::Protocol(p) if p.is_frame() => &self.metrics.frame_errors,
            _ => return,
        };
        BusMetrics::incr(counter);
    }
}

/// 一条指令的状态包最大长度（READ 带回请求的字节数，其余无参数）
fn reply_len(instruction: Instruction, params: &[u8]) -> usize {
    let data = match instruction {
        Instruction::Read => params.get(1).copied().map_or(0, usize::from),
        _ => 0,
    };
    MIN_FRAME_LEN + data
}

/// 从缓冲区中切出下一帧完整字节；帧头之前的噪声被丢弃
///
/// 声明长度超过 `max_len` 的帧头不可能是应答，跳过它的首字节重新同步。
fn next_frame(pending: &mut Vec<u8>, max_len: usize) -> Result<Option<Vec<u8>>, ProtocolError> {
    loop {
        match find_header(pending) {
            Some(0) => {},
            Some(start) => {
                debug!("Skipping {start} bytes of line noise");
                pending.drain(..start);
            },
            None => {
                // 末尾单个 0xFF 可能是下一帧头的前半部分
                let keep = usize::from(pending.last() == Some(&0xFF));
                let skip = pending.len() - keep;
                if skip > 0 {
                    debug!("Skipping {skip} bytes of line noise");
                    pending.drain(..skip);
                }
                return Ok(None);
            },
        }

        match frame_len(pending) {
            Ok(Some(total)) if total > max_len => {
                debug!("Skipping header with oversized length {total} (max {max_len})");
                pending.drain(..1);
            },
            Ok(Some(total)) if pending.len() >= total => {
                return Ok(Some(pending.drain(..total).collect()));
            },
            Ok(_) => return Ok(None),
            Err(e) => {
                pending.clear();
                return Err(e);
            },
        }
    }
}
