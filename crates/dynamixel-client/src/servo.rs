//! 舵机控制器

use crate::command::{CommandMap, ServoCommand, success_map};
use crate::config::ServoConfig;
use crate::error::ServoError;
use dynamixel_driver::{Bus, BusBuilder, BusMetricsSnapshot, CancellationToken, DriverError, Servo};
use dynamixel_protocol::DeviceId;
use dynamixel_serial::SerialTransport;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 调用方附带的扩展参数（目前不解释）
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// 位置执行器
///
/// 所有方法都取 `&self`，可以从多个线程并发调用；总线上的通信由
/// 驱动层串行化。
pub trait Actuator: Send + Sync {
    fn name(&self) -> &str;

    /// 移动到 `angle` 度（舵机应答后返回，不等待运动完成）
    fn move_to(&self, angle: u32, extra: &Extra) -> Result<(), ServoError>;

    /// 当前位置（四舍五入到整数度）
    fn position(&self, extra: &Extra) -> Result<u32, ServoError>;

    /// 扭矩先失能再使能，让舵机停在当前位置
    fn stop(&self, extra: &Extra) -> Result<(), ServoError>;

    fn is_moving(&self) -> Result<bool, ServoError>;

    /// 扩展命令，见 [`ServoCommand`]
    fn do_command(&self, command: &CommandMap) -> Result<CommandMap, ServoError>;

    /// 关闭；可重复调用
    fn close(&self) -> Result<(), ServoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Closed,
}

/// Dynamixel 舵机控制器
///
/// 构造时 PING 舵机并使能扭矩；任何一步失败都不会返回句柄。
///
/// `close()` 先触发内部取消令牌（正在等待的调用以 `Cancelled` 返回），
/// 再用一个新的令牌执行一次停止；之后的调用都返回 [`ServoError::Closed`]，
/// 不产生总线 IO。
pub struct DynamixelServo {
    name: String,
    config: ServoConfig,
    servo: Servo,
    token: CancellationToken,
    state: Mutex<State>,
    /// 由本控制器打开的总线在关闭时一并关闭
    owns_bus: bool,
}

impl std::fmt::Debug for DynamixelServo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamixelServo")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl DynamixelServo {
    /// 打开配置中的串口并连接舵机
    ///
    /// # Errors
    /// - `ServoError::Config`: 配置无效
    /// - `ServoError::Connect`: 串口打开失败，或 PING/使能扭矩失败
    pub fn connect(name: impl Into<String>, config: ServoConfig) -> Result<Self, ServoError> {
        config.validate()?;
        let bus = BusBuilder::new()
            .port(config.port.as_str())
            .baud_rate(config.effective_baud_rate())
            .read_timeout(config.read_timeout())
            .build()
            .map_err(|e| ServoError::connect(&config.port, config.id, e))?;
        Self::start(name.into(), config, bus, true)
    }

    /// 使用调用方提供的传输层连接舵机
    pub fn with_transport(
        name: impl Into<String>,
        config: ServoConfig,
        transport: impl SerialTransport + 'static,
    ) -> Result<Self, ServoError> {
        config.validate()?;
        let bus = BusBuilder::new()
            .read_timeout(config.read_timeout())
            .build_with_transport(transport);
        Self::start(name.into(), config, bus, true)
    }

    /// 在一条已有的总线上连接舵机（多个控制器共享总线）
    ///
    /// 读截止时间由总线配置决定；关闭控制器不会关闭总线。
    pub fn on_bus(
        name: impl Into<String>,
        config: ServoConfig,
        bus: Arc<Bus>,
    ) -> Result<Self, ServoError> {
        config.validate()?;
        Self::start(name.into(), config, bus, false)
    }

    fn start(
        name: String,
        config: ServoConfig,
        bus: Arc<Bus>,
        owns_bus: bool,
    ) -> Result<Self, ServoError> {
        let servo = Servo::new(bus.clone(), config.id)?;
        let token = CancellationToken::new();

        let handshake = servo
            .ping(&token)
            .and_then(|()| servo.set_torque_enable(true, &token));
        if let Err(e) = handshake {
            if owns_bus {
                if let Err(close_err) = bus.close(&token) {
                    debug!("Closing bus after failed connect: {close_err}");
                }
            }
            return Err(ServoError::connect(&config.port, config.id, e));
        }

        info!(
            "Servo {} ({}) connected on {} @ {} baud",
            config.id,
            name,
            config.port,
            config.effective_baud_rate()
        );
        Ok(Self {
            name,
            config,
            servo,
            token,
            state: Mutex::new(State::Ready),
            owns_bus,
        })
    }

    pub fn config(&self) -> &ServoConfig {
        &self.config
    }

    pub fn device_id(&self) -> DeviceId {
        self.servo.id()
    }

    /// 底层舵机句柄（直接读写寄存器）
    pub fn servo(&self) -> &Servo {
        &self.servo
    }

    /// 总线指标快照
    pub fn metrics(&self) -> BusMetricsSnapshot {
        self.servo.bus().metrics().snapshot()
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == State::Closed
    }

    fn ensure_ready(&self) -> Result<(), ServoError> {
        match *self.state.lock() {
            State::Ready => Ok(()),
            State::Closed => Err(ServoError::Closed),
        }
    }

    /// 扭矩循环：两步都会执行，错误合并返回
    fn torque_cycle(&self, token: &CancellationToken) -> Result<(), ServoError> {
        let disable = self.servo.set_torque_enable(false, token);
        let enable = self.servo.set_torque_enable(true, token);
        let errors: Vec<ServoError> = [disable, enable]
            .into_iter()
            .filter_map(Result::err)
            .map(ServoError::from)
            .collect();
        match ServoError::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn execute(&self, command: ServoCommand) -> Result<(), DriverError> {
        match command {
            ServoCommand::SetTorque { enable } => self.servo.set_torque_enable(enable, &self.token),
            ServoCommand::Ping => self.servo.ping(&self.token),
        }
    }
}

impl Actuator for DynamixelServo {
    fn name(&self) -> &str {
        &self.name
    }

    fn move_to(&self, angle: u32, extra: &Extra) -> Result<(), ServoError> {
        self.ensure_ready()?;
        debug!("{}: move to {angle}°", self.name);
        if !extra.is_empty() {
            trace!("{}: ignoring extra {extra:?}", self.name);
        }
        Ok(self.servo.move_to(f64::from(angle), &self.token)?)
    }

    fn position(&self, _extra: &Extra) -> Result<u32, ServoError> {
        self.ensure_ready()?;
        let degrees = self.servo.angle(&self.token)?;
        // 359.91° 与 0° 只差一个量化步长
        Ok(degrees.round() as u32 % 360)
    }

    fn stop(&self, _extra: &Extra) -> Result<(), ServoError> {
        self.ensure_ready()?;
        debug!("{}: stop", self.name);
        self.torque_cycle(&self.token)
    }

    fn is_moving(&self) -> Result<bool, ServoError> {
        self.ensure_ready()?;
        Ok(self.servo.moving(&self.token)?)
    }

    fn do_command(&self, command: &CommandMap) -> Result<CommandMap, ServoError> {
        self.ensure_ready()?;
        let command = ServoCommand::decode(command)?;
        debug!("{}: do_command {}", self.name, command.name());
        match self.execute(command) {
            Ok(()) => Ok(success_map(true)),
            Err(e) => Err(ServoError::CommandFailed {
                result: success_map(false),
                source: Box::new(e.into()),
            }),
        }
    }

    fn close(&self) -> Result<(), ServoError> {
        {
            let mut state = self.state.lock();
            if *state == State::Closed {
                return Ok(());
            }
            *state = State::Closed;
        }
        self.token.cancel();

        let shutdown = CancellationToken::new();
        let result = self.torque_cycle(&shutdown);
        if let Err(e) = &result {
            warn!("{}: stop during close failed: {e}", self.name);
        }
        if self.owns_bus {
            if let Err(e) = self.servo.bus().close(&shutdown) {
                warn!("{}: closing serial port failed: {e}", self.name);
            }
        }
        info!("{}: closed", self.name);
        result
    }
}
