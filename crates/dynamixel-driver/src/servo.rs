//! 舵机模型：按设备 ID 寻址的寄存器操作

use crate::bus::Bus;
use crate::cancel::CancellationToken;
use crate::error::DriverError;
use dynamixel_protocol::{
    AngleScale, ControlTable, DeviceId, Instruction, POSITION_SCALE, ProtocolError, Register,
    S_MODEL,
};
use std::sync::Arc;
use tracing::debug;

/// 总线上的一个舵机
///
/// 句柄很轻：设备 ID、共享的控制表和共享的总线。同一条总线上可以有任意多个句柄。
///
/// 所有返回的错误都带有操作名和设备 ID（[`DriverError::Operation`]），
/// 用 [`DriverError::root`] 取得根因。
#[derive(Clone)]
pub struct Servo {
    bus: Arc<Bus>,
    id: DeviceId,
    table: &'static ControlTable,
}

impl std::fmt::Debug for Servo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Servo")
            .field("id", &self.id)
            .field("model", &self.table.model)
            .finish()
    }
}

impl Servo {
    /// 创建舵机句柄（不产生总线 IO）
    ///
    /// # Errors
    /// - `Protocol(InvalidDeviceId)`: `id` 是广播或保留地址
    pub fn new(bus: Arc<Bus>, id: u8) -> Result<Self, DriverError> {
        Ok(Self {
            bus,
            id: DeviceId::new(id)?,
            table: &S_MODEL,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn table(&self) -> &'static ControlTable {
        self.table
    }

    pub fn ping(&self, token: &CancellationToken) -> Result<(), DriverError> {
        self.bus
            .transact(self.id, Instruction::Ping, &[], token)
            .map(|_| ())
            .map_err(|e| e.with_context("ping", self.id))
    }

    /// 最多 PING `attempts` 次（至少一次），取消时立即返回
    pub fn ping_with_retries(
        &self,
        attempts: u32,
        token: &CancellationToken,
    ) -> Result<(), DriverError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ping(token) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_cancelled() || attempt >= attempts => return Err(e),
                Err(e) => {
                    debug!("Ping servo {} attempt {attempt}/{attempts} failed: {e}", self.id);
                    attempt += 1;
                },
            }
        }
    }

    /// 写入目标位置（舵机应答后立即返回，不等待运动完成）
    ///
    /// # Errors
    /// - `InvalidInput`: 角度不在 `0..=359.91°` 内
    pub fn move_to(&self, degrees: f64, token: &CancellationToken) -> Result<(), DriverError> {
        let result = self.goal_raw(degrees).and_then(|raw| {
            debug!("Servo {} goal position {raw} ({degrees}°)", self.id);
            self.write_raw(&self.table.goal_position, raw, token)
        });
        result.map_err(|e| e.with_context("move", self.id))
    }

    /// REG WRITE 目标位置，由之后的 [`Bus::action`] 统一触发
    pub fn reg_move_to(&self, degrees: f64, token: &CancellationToken) -> Result<(), DriverError> {
        let result = self.goal_raw(degrees).and_then(|raw| {
            let params = self.table.goal_position.write_params(raw)?;
            self.bus
                .transact(self.id, Instruction::RegWrite, &params, token)
                .map(|_| ())
        });
        result.map_err(|e| e.with_context("queue move", self.id))
    }

    /// 当前位置（度）
    pub fn angle(&self, token: &CancellationToken) -> Result<f64, DriverError> {
        let register = &self.table.present_position;
        self.read_raw(register, token)
            .map(|raw| angle_scale(register).raw_to_degrees(raw))
            .map_err(|e| e.with_context("read position", self.id))
    }

    /// 目标位置（度）
    pub fn goal_angle(&self, token: &CancellationToken) -> Result<f64, DriverError> {
        let register = &self.table.goal_position;
        self.read_raw(register, token)
            .map(|raw| angle_scale(register).raw_to_degrees(raw))
            .map_err(|e| e.with_context("read goal position", self.id))
    }

    pub fn set_torque_enable(
        &self,
        enable: bool,
        token: &CancellationToken,
    ) -> Result<(), DriverError> {
        let operation = if enable {
            "enable torque"
        } else {
            "disable torque"
        };
        self.write_raw(&self.table.torque_enable, enable as u16, token)
            .map_err(|e| e.with_context(operation, self.id))
    }

    pub fn torque_enabled(&self, token: &CancellationToken) -> Result<bool, DriverError> {
        self.read_raw(&self.table.torque_enable, token)
            .map(|raw| raw != 0)
            .map_err(|e| e.with_context("read torque enable", self.id))
    }

    /// 是否在运动（非零即真）
    pub fn moving(&self, token: &CancellationToken) -> Result<bool, DriverError> {
        self.read_raw(&self.table.moving, token)
            .map(|raw| raw != 0)
            .map_err(|e| e.with_context("read moving", self.id))
    }

    pub fn set_led(&self, on: bool, token: &CancellationToken) -> Result<(), DriverError> {
        self.write_raw(&self.table.led, on as u16, token)
            .map_err(|e| e.with_context("set led", self.id))
    }

    /// 运动速度（原始值，0 表示不限速）
    pub fn set_moving_speed(&self, raw: u16, token: &CancellationToken) -> Result<(), DriverError> {
        self.write_raw(&self.table.moving_speed, raw, token)
            .map_err(|e| e.with_context("set moving speed", self.id))
    }

    pub fn model_number(&self, token: &CancellationToken) -> Result<u16, DriverError> {
        self.read_raw(&self.table.model_number, token)
            .map_err(|e| e.with_context("read model number", self.id))
    }

    pub fn firmware_version(&self, token: &CancellationToken) -> Result<u8, DriverError> {
        self.read_raw(&self.table.firmware_version, token)
            .map(|raw| raw as u8)
            .map_err(|e| e.with_context("read firmware version", self.id))
    }

    /// 输入电压（V）
    pub fn voltage(&self, token: &CancellationToken) -> Result<f64, DriverError> {
        self.read_raw(&self.table.present_voltage, token)
            .map(|raw| raw as f64 / 10.0)
            .map_err(|e| e.with_context("read voltage", self.id))
    }

    /// 内部温度（°C）
    pub fn temperature(&self, token: &CancellationToken) -> Result<u8, DriverError> {
        self.read_raw(&self.table.present_temperature, token)
            .map(|raw| raw as u8)
            .map_err(|e| e.with_context("read temperature", self.id))
    }

    /// 读取任意寄存器的原始值
    pub fn read_register(
        &self,
        register: &Register,
        token: &CancellationToken,
    ) -> Result<u16, DriverError> {
        self.read_raw(register, token)
            .map_err(|e| e.with_context("read register", self.id))
    }

    /// 写入任意寄存器的原始值
    ///
    /// # Errors
    /// - `InvalidInput`: 只读寄存器，或值超出寄存器范围
    pub fn write_register(
        &self,
        register: &Register,
        raw: u16,
        token: &CancellationToken,
    ) -> Result<(), DriverError> {
        self.write_raw(register, raw, token)
            .map_err(|e| e.with_context("write register", self.id))
    }

    fn goal_raw(&self, degrees: f64) -> Result<u16, DriverError> {
        angle_scale(&self.table.goal_position)
            .degrees_to_raw(degrees)
            .map_err(invalid_input)
    }

    fn read_raw(&self, register: &Register, token: &CancellationToken) -> Result<u16, DriverError> {
        let status = self
            .bus
            .transact(self.id, Instruction::Read, &register.read_params(), token)?;
        Ok(register.decode(&status.params)?)
    }

    fn write_raw(
        &self,
        register: &Register,
        raw: u16,
        token: &CancellationToken,
    ) -> Result<(), DriverError> {
        if !register.is_writable() {
            return Err(DriverError::InvalidInput(format!(
                "register {} is read-only",
                register.name
            )));
        }
        if let Some(scale) = register.angle_scale() {
            if raw > scale.max_raw {
                return Err(invalid_input(ProtocolError::ValueOutOfRange {
                    register: register.name,
                    value: raw as u32,
                    max: scale.max_raw as u32,
                }));
            }
        }
        let params = register.write_params(raw).map_err(invalid_input)?;
        self.bus
            .transact(self.id, Instruction::Write, &params, token)
            .map(|_| ())
    }
}

fn angle_scale(register: &Register) -> AngleScale {
    register.angle_scale().unwrap_or(POSITION_SCALE)
}

fn invalid_input(err: ProtocolError) -> DriverError {
    DriverError::InvalidInput(err.to_string())
}
