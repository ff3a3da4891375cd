//! 控制表（寄存器映射）
//!
//! 每个寄存器在控制表中有固定地址和宽度。同一代协议的所有舵机共享同一张
//! 只读表，舵机句柄只持有 `&'static ControlTable`。

use crate::{ProtocolError, u16_from_le, u16_to_le};

/// 寄存器访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// 角度与原始单位的换算
///
/// 位置编码器每圈 `units_per_rev` 步，合法原始值为 `0..=max_raw`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleScale {
    pub units_per_rev: u32,
    pub max_raw: u16,
}

impl AngleScale {
    pub const fn new(units_per_rev: u32, max_raw: u16) -> Self {
        Self {
            units_per_rev,
            max_raw,
        }
    }

    /// 一个原始单位对应的角度（量化步长）
    pub fn step_degrees(&self) -> f64 {
        360.0 / self.units_per_rev as f64
    }

    /// 可表示的最大角度
    pub fn max_degrees(&self) -> f64 {
        self.raw_to_degrees(self.max_raw)
    }

    /// 角度 → 原始值（四舍五入到最近的步）
    pub fn degrees_to_raw(&self, degrees: f64) -> Result<u16, ProtocolError> {
        let max = self.max_degrees();
        if !degrees.is_finite() || degrees < 0.0 {
            return Err(ProtocolError::AngleOutOfRange { degrees, max });
        }
        let raw = (degrees / self.step_degrees()).round();
        if raw > self.max_raw as f64 {
            return Err(ProtocolError::AngleOutOfRange { degrees, max });
        }
        Ok(raw as u16)
    }

    /// 原始值 → 角度
    pub fn raw_to_degrees(&self, raw: u16) -> f64 {
        raw as f64 * self.step_degrees()
    }
}

/// 寄存器数值变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueTransform {
    /// 原样
    Raw,
    /// 0/1，读取时非零即真
    Boolean,
    /// 角度
    Angle(AngleScale),
}

/// 控制表中的一个寄存器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Register {
    pub name: &'static str,
    pub address: u8,
    /// 字节宽度（1 或 2）
    pub width: u8,
    pub access: Access,
    pub transform: ValueTransform,
}

impl Register {
    pub const fn new(
        name: &'static str,
        address: u8,
        width: u8,
        access: Access,
        transform: ValueTransform,
    ) -> Self {
        Self {
            name,
            address,
            width,
            access,
            transform,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// 按宽度可表示的最大原始值
    pub fn max_raw(&self) -> u16 {
        match self.width {
            1 => u8::MAX as u16,
            _ => u16::MAX,
        }
    }

    /// 原始值编码为寄存器字节（小端）
    pub fn encode(&self, raw: u16) -> Result<Vec<u8>, ProtocolError> {
        if raw > self.max_raw() {
            return Err(ProtocolError::ValueOutOfRange {
                register: self.name,
                value: raw as u32,
                max: self.max_raw() as u32,
            });
        }
        Ok(match self.width {
            1 => vec![raw as u8],
            _ => u16_to_le(raw).to_vec(),
        })
    }

    /// 寄存器字节解码为原始值
    pub fn decode(&self, bytes: &[u8]) -> Result<u16, ProtocolError> {
        if bytes.len() != self.width as usize {
            return Err(ProtocolError::InvalidLength {
                expected: self.width as usize,
                actual: bytes.len(),
            });
        }
        Ok(match self.width {
            1 => bytes[0] as u16,
            _ => u16_from_le([bytes[0], bytes[1]]),
        })
    }

    /// READ 指令参数
    pub fn read_params(&self) -> [u8; 2] {
        [self.address, self.width]
    }

    /// WRITE / REG WRITE 指令参数
    pub fn write_params(&self, raw: u16) -> Result<Vec<u8>, ProtocolError> {
        let mut params = Vec::with_capacity(1 + self.width as usize);
        params.push(self.address);
        params.extend(self.encode(raw)?);
        Ok(params)
    }

    /// 寄存器的角度换算（非角度寄存器返回 `None`）
    pub fn angle_scale(&self) -> Option<AngleScale> {
        match self.transform {
            ValueTransform::Angle(scale) => Some(scale),
            _ => None,
        }
    }
}

/// 协议 1.0 控制表
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTable {
    /// 型号名（用于日志）
    pub model: &'static str,
    pub model_number: Register,
    pub firmware_version: Register,
    pub id: Register,
    pub baud_rate: Register,
    pub return_delay_time: Register,
    pub cw_angle_limit: Register,
    pub ccw_angle_limit: Register,
    pub torque_enable: Register,
    pub led: Register,
    pub goal_position: Register,
    pub moving_speed: Register,
    pub torque_limit: Register,
    pub present_position: Register,
    pub present_speed: Register,
    pub present_load: Register,
    pub present_voltage: Register,
    pub present_temperature: Register,
    pub moving: Register,
}

/// 4096 步/圈的位置编码器
pub const POSITION_SCALE: AngleScale = AngleScale::new(4096, 4095);

use Access::{ReadOnly, ReadWrite};
use ValueTransform::{Angle, Boolean, Raw};

/// S 型舵机控制表（协议 1.0，12 位位置编码器）
pub static S_MODEL: ControlTable = ControlTable {
    model: "s-model",
    model_number: Register::new("model_number", 0, 2, ReadOnly, Raw),
    firmware_version: Register::new("firmware_version", 2, 1, ReadOnly, Raw),
    id: Register::new("id", 3, 1, ReadWrite, Raw),
    baud_rate: Register::new("baud_rate", 4, 1, ReadWrite, Raw),
    return_delay_time: Register::new("return_delay_time", 5, 1, ReadWrite, Raw),
    cw_angle_limit: Register::new("cw_angle_limit", 6, 2, ReadWrite, Angle(POSITION_SCALE)),
    ccw_angle_limit: Register::new("ccw_angle_limit", 8, 2, ReadWrite, Angle(POSITION_SCALE)),
    torque_enable: Register::new("torque_enable", 24, 1, ReadWrite, Boolean),
    led: Register::new("led", 25, 1, ReadWrite, Boolean),
    goal_position: Register::new("goal_position", 30, 2, ReadWrite, Angle(POSITION_SCALE)),
    moving_speed: Register::new("moving_speed", 32, 2, ReadWrite, Raw),
    torque_limit: Register::new("torque_limit", 34, 2, ReadWrite, Raw),
    present_position: Register::new("present_position", 36, 2, ReadOnly, Angle(POSITION_SCALE)),
    present_speed: Register::new("present_speed", 38, 2, ReadOnly, Raw),
    present_load: Register::new("present_load", 40, 2, ReadOnly, Raw),
    present_voltage: Register::new("present_voltage", 42, 1, ReadOnly, Raw),
    present_temperature: Register::new("present_temperature", 43, 1, ReadOnly, Raw),
    moving: Register::new("moving", 46, 1, ReadOnly, Boolean),
};

impl ControlTable {
    /// 全部寄存器（按地址升序）
    pub fn registers(&self) -> [&Register; 18] {
        [
            &self.model_number,
            &self.firmware_version,
            &self.id,
            &self.baud_rate,
            &self.return_delay_time,
            &self.cw_angle_limit,
            &self.ccw_angle_limit,
            &self.torque_enable,
            &self.led,
            &self.goal_position,
            &self.moving_speed,
            &self.torque_limit,
            &self.present_position,
            &self.present_speed,
            &self.present_load,
            &self.present_voltage,
            &self.present_temperature,
            &self.moving,
        ]
    }

    /// 按名称查找寄存器
    pub fn by_name(&self, name: &str) -> Option<&Register> {
        self.registers().into_iter().find(|r| r.name == name)
    }

    /// 按地址查找寄存器
    pub fn by_address(&self, address: u8) -> Option<&Register> {
        self.registers().into_iter().find(|r| r.address == address)
    }

    /// 控制表覆盖的字节数
    pub fn len(&self) -> usize {
        self.registers()
            .iter()
            .map(|r| r.address as usize + r.width as usize)
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
