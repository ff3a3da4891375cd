//! # Dynamixel Protocol
//!
//! Dynamixel 协议 1.0 串口帧定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `codec`: 帧编码/解码、校验和、流式读取辅助函数
//! - `instruction`: 指令码与指令包
//! - `status`: 状态包与错误位域
//! - `control_table`: 寄存器表与数值变换
//!
//! ## 帧格式
//!
//! ```text
//! [0xFF][0xFF][ID][LEN][INSTR/ERROR][PARAM 0..N][CHECKSUM]
//! ```
//!
//! - `LEN = N + 2`
//! - `CHECKSUM = !(ID + LEN + INSTR + PARAM...)`（截断为低 8 位后取反）
//!
//! ## 字节序
//!
//! 多字节寄存器值使用 Intel 小端字节序（低字节在前）。
//! 本模块提供了字节序转换工具函数。

pub mod codec;
pub mod control_table;
pub mod instruction;
pub mod status;

// 重新导出常用类型
pub use codec::*;
pub use control_table::*;
pub use instruction::*;
pub use status::*;

use std::fmt;
use thiserror::Error;

/// 总线上的设备地址
///
/// - `0..=253`: 可寻址的单个舵机
/// - `254` (`0xFE`): 广播地址，设备不会回复状态包
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub u8);

impl DeviceId {
    /// 广播地址
    pub const BROADCAST: DeviceId = DeviceId(0xFE);

    /// 最大可寻址 ID
    pub const MAX: u8 = 0xFD;

    /// 创建可寻址的设备 ID（拒绝广播地址和保留地址）
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if id > Self::MAX {
            return Err(ProtocolError::InvalidDeviceId { id });
        }
        Ok(Self(id))
    }

    /// 原始 ID 值
    pub fn get(self) -> u8 {
        self.0
    }

    /// 是否为广播地址
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// 协议解析错误类型
///
/// 校验和错误（`Checksum`）与帧结构错误（头部、长度、截断）区分开，
/// 由上层决定重试还是失败。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid frame header: {found:02X?}")]
    InvalidHeader { found: [u8; 2] },

    #[error("Truncated frame: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Length field mismatch: declared {declared}, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Checksum { expected: u8, actual: u8 },

    #[error("Unknown instruction: 0x{code:02X}")]
    UnknownInstruction { code: u8 },

    #[error("Parameter block too long: {len} bytes (max {max})")]
    ParamsTooLong { len: usize, max: usize },

    #[error("Invalid device id: {id}")]
    InvalidDeviceId { id: u8 },

    #[error("Value {value} out of range for register {register} (max {max})")]
    ValueOutOfRange {
        register: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Angle {degrees}° out of range (0..={max}°)")]
    AngleOutOfRange { degrees: f64, max: f64 },
}

impl ProtocolError {
    /// 是否为校验和错误
    pub fn is_checksum(&self) -> bool {
        matches!(self, ProtocolError::Checksum { .. })
    }

    /// 是否为帧结构错误（头部错误、截断、长度不一致等）
    pub fn is_frame(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidLength { .. }
                | ProtocolError::InvalidHeader { .. }
                | ProtocolError::Truncated { .. }
                | ProtocolError::LengthMismatch { .. }
                | ProtocolError::UnknownInstruction { .. }
        )
    }
}

/// 字节序转换工具函数
///
/// 控制表中的 2 字节寄存器使用小端字节序（低字节在前）。
///
/// 小端字节序转 u16
pub fn u16_from_le(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// u16 转小端字节序
pub fn u16_to_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u16_from_le() {
        assert_eq!(u16_from_le([0x34, 0x12]), 0x1234);
        assert_eq!(u16_from_le([0xFF, 0x0F]), 4095);
    }

    #[test]
    fn test_u16_to_le() {
        assert_eq!(u16_to_le(0x1234), [0x34, 0x12]);
        assert_eq!(u16_to_le(2048), [0x00, 0x08]);
    }

    #[test]
    fn test_device_id_bounds() {
        assert_eq!(DeviceId::new(0).unwrap().get(), 0);
        assert_eq!(DeviceId::new(253).unwrap().get(), 253);
        assert_eq!(
            DeviceId::new(254),
            Err(ProtocolError::InvalidDeviceId { id: 254 })
        );
        assert!(DeviceId::BROADCAST.is_broadcast());
        assert!(!DeviceId(1).is_broadcast());
    }

    #[test]
    fn test_error_classification() {
        let checksum = ProtocolError::Checksum {
            expected: 0x10,
            actual: 0x11,
        };
        assert!(checksum.is_checksum());
        assert!(!checksum.is_frame());

        let header = ProtocolError::InvalidHeader { found: [0x00, 0xFF] };
        assert!(header.is_frame());
        assert!(!header.is_checksum());
        assert_eq!(header.to_string(), "Invalid frame header: [00, FF]");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_device_id_serde() {
        let json = serde_json::to_string(&DeviceId(7)).unwrap();
        assert_eq!(json, "7");
        let id: DeviceId = serde_json::from_str("12").unwrap();
        assert_eq!(id, DeviceId(12));
    }
}
