//! 状态包与错误位域

use crate::codec::{decode_frame, encode_frame};
use crate::{DeviceId, ProtocolError, u16_from_le};
use bilge::prelude::*;
use std::fmt;

// ============================================================================
// 位域结构定义（使用 bilge）
// ============================================================================

/// 状态包错误位域（第 5 字节）
///
/// - Bit 0: 输入电压超限
/// - Bit 1: 目标位置超出角度限位
/// - Bit 2: 过热
/// - Bit 3: 指令参数超出范围
/// - Bit 4: 指令包校验和错误
/// - Bit 5: 过载（负载超过扭矩限制）
/// - Bit 6: 未定义指令 / 未 REG WRITE 就收到 ACTION
/// - Bit 7: 未定义
///
/// bilge 默认使用 LSB first 位序，与协议一致。
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusError {
    pub input_voltage: bool, // Bit 0
    pub angle_limit: bool,   // Bit 1
    pub overheating: bool,   // Bit 2
    pub range: bool,         // Bit 3
    pub checksum: bool,      // Bit 4
    pub overload: bool,      // Bit 5
    pub instruction: bool,   // Bit 6
    pub undefined: bool,     // Bit 7
}

impl StatusError {
    /// 无任何错误位
    pub fn is_ok(&self) -> bool {
        u8::from(*self) == 0
    }

    /// 已置位的错误名称
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.input_voltage() {
            flags.push("input voltage");
        }
        if self.angle_limit() {
            flags.push("angle limit");
        }
        if self.overheating() {
            flags.push("overheating");
        }
        if self.range() {
            flags.push("range");
        }
        if self.checksum() {
            flags.push("checksum");
        }
        if self.overload() {
            flags.push("overload");
        }
        if self.instruction() {
            flags.push("instruction");
        }
        if self.undefined() {
            flags.push("undefined");
        }
        flags
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "none");
        }
        write!(f, "{} (0x{:02X})", self.flags().join(", "), u8::from(*self))
    }
}

// ============================================================================
// 状态包
// ============================================================================

/// 状态包（设备对指令的应答）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: DeviceId,
    pub error: StatusError,
    pub params: Vec<u8>,
}

impl StatusPacket {
    /// 创建状态包
    pub fn new(id: DeviceId, error: StatusError, params: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            error,
            params: params.into(),
        }
    }

    /// 无错误、无参数的应答
    pub fn ack(id: DeviceId) -> Self {
        Self::new(id, StatusError::default(), Vec::new())
    }

    /// 编码为线上字节
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self.id.get(), self.error.into(), &self.params)
    }

    /// 从线上字节解码
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw = decode_frame(bytes)?;
        Ok(Self {
            id: DeviceId(raw.id),
            error: StatusError::from(raw.code),
            params: raw.params,
        })
    }

    /// 按寄存器宽度解析参数中的数值（小端）
    ///
    /// 参数长度必须恰好等于 `width`（1 或 2）。
    pub fn value(&self, width: u8) -> Result<u16, ProtocolError> {
        if self.params.len() != width as usize {
            return Err(ProtocolError::InvalidLength {
                expected: width as usize,
                actual: self.params.len(),
            });
        }
        match width {
            1 => Ok(self.params[0] as u16),
            2 => Ok(u16_from_le([self.params[0], self.params[1]])),
            _ => Err(ProtocolError::InvalidLength {
                expected: 2,
                actual: width as usize,
            }),
        }
    }
}

impl TryFrom<&[u8]> for StatusPacket {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}
