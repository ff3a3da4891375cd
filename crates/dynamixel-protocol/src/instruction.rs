//! 指令码与指令包

use crate::codec::{MAX_PARAMS, decode_frame, encode_frame};
use crate::{DeviceId, ProtocolError};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 协议 1.0 指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Instruction {
    /// 存活检测，无参数，仅回复状态包
    Ping = 0x01,
    /// 读取控制表：`[address, length]`
    Read = 0x02,
    /// 写入控制表：`[address, data...]`
    Write = 0x03,
    /// 延迟写入，等待 `Action` 触发：`[address, data...]`
    RegWrite = 0x04,
    /// 执行此前 `RegWrite` 暂存的写入
    Action = 0x05,
    /// 恢复出厂设置
    Reset = 0x06,
    /// 同步写多个设备（仅广播）：`[address, width, (id, data...)...]`
    SyncWrite = 0x83,
}

impl Instruction {
    /// 全部指令码
    pub const ALL: [Instruction; 7] = [
        Instruction::Ping,
        Instruction::Read,
        Instruction::Write,
        Instruction::RegWrite,
        Instruction::Action,
        Instruction::Reset,
        Instruction::SyncWrite,
    ];

    /// 指令名称（用于日志）
    pub fn name(self) -> &'static str {
        match self {
            Instruction::Ping => "ping",
            Instruction::Read => "read",
            Instruction::Write => "write",
            Instruction::RegWrite => "reg_write",
            Instruction::Action => "action",
            Instruction::Reset => "reset",
            Instruction::SyncWrite => "sync_write",
        }
    }
}

/// 指令包
///
/// 每次请求新建，发送后不再修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPacket {
    pub id: DeviceId,
    pub instruction: Instruction,
    pub params: Vec<u8>,
}

impl InstructionPacket {
    /// 通用构造器
    pub fn new(id: DeviceId, instruction: Instruction, params: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            instruction,
            params: params.into(),
        }
    }

    /// PING
    pub fn ping(id: DeviceId) -> Self {
        Self::new(id, Instruction::Ping, Vec::new())
    }

    /// READ `len` 字节，起始地址 `address`
    pub fn read(id: DeviceId, address: u8, len: u8) -> Self {
        Self::new(id, Instruction::Read, vec![address, len])
    }

    /// WRITE `data` 到 `address`
    pub fn write(id: DeviceId, address: u8, data: &[u8]) -> Self {
        let mut params = Vec::with_capacity(data.len() + 1);
        params.push(address);
        params.extend_from_slice(data);
        Self::new(id, Instruction::Write, params)
    }

    /// REG WRITE `data` 到 `address`
    pub fn reg_write(id: DeviceId, address: u8, data: &[u8]) -> Self {
        let mut packet = Self::write(id, address, data);
        packet.instruction = Instruction::RegWrite;
        packet
    }

    /// 广播 ACTION
    pub fn action() -> Self {
        Self::new(DeviceId::BROADCAST, Instruction::Action, Vec::new())
    }

    /// RESET
    pub fn reset(id: DeviceId) -> Self {
        Self::new(id, Instruction::Reset, Vec::new())
    }

    /// 广播 SYNC WRITE
    ///
    /// 每个条目的数据长度必须等于 `width`。
    pub fn sync_write(
        address: u8,
        width: u8,
        entries: &[(DeviceId, Vec<u8>)],
    ) -> Result<Self, ProtocolError> {
        let mut params = Vec::with_capacity(2 + entries.len() * (width as usize + 1));
        params.push(address);
        params.push(width);
        for (id, data) in entries {
            if data.len() != width as usize {
                return Err(ProtocolError::InvalidLength {
                    expected: width as usize,
                    actual: data.len(),
                });
            }
            params.push(id.get());
            params.extend_from_slice(data);
        }
        if params.len() > MAX_PARAMS {
            return Err(ProtocolError::ParamsTooLong {
                len: params.len(),
                max: MAX_PARAMS,
            });
        }
        Ok(Self::new(DeviceId::BROADCAST, Instruction::SyncWrite, params))
    }

    /// 该指令是否会收到状态包
    ///
    /// 广播指令（包括 SYNC WRITE）永远不会回复。
    pub fn expects_reply(&self) -> bool {
        !self.id.is_broadcast()
    }

    /// 编码为线上字节
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self.id.get(), self.instruction.into(), &self.params)
    }

    /// 从线上字节解码
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw = decode_frame(bytes)?;
        let instruction = Instruction::try_from(raw.code)
            .map_err(|_| ProtocolError::UnknownInstruction { code: raw.code })?;
        Ok(Self {
            id: DeviceId(raw.id),
            instruction,
            params: raw.params,
        })
    }
}

impl TryFrom<&[u8]> for InstructionPacket {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_codes() {
        assert_eq!(u8::from(Instruction::Ping), 0x01);
        assert_eq!(u8::from(Instruction::SyncWrite), 0x83);
        assert_eq!(Instruction::try_from(0x05u8).unwrap(), Instruction::Action);
        assert!(Instruction::try_from(0x07u8).is_err());
    }

    #[test]
    fn test_ping_packet_bytes() {
        let bytes = InstructionPacket::ping(DeviceId(1)).encode().unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
    }

    #[test]
    fn test_write_packet_layout() {
        let packet = InstructionPacket::write(DeviceId(2), 30, &[0x00, 0x08]);
        assert_eq!(packet.params, vec![30, 0x00, 0x08]);
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes[3], 5);
        assert_eq!(InstructionPacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_reg_write_and_action() {
        let packet = InstructionPacket::reg_write(DeviceId(2), 30, &[0x00, 0x08]);
        assert_eq!(packet.instruction, Instruction::RegWrite);
        assert!(packet.expects_reply());

        let action = InstructionPacket::action();
        assert!(action.id.is_broadcast());
        assert!(!action.expects_reply());
    }

    #[test]
    fn test_sync_write_layout() {
        let packet = InstructionPacket::sync_write(
            30,
            2,
            &[(DeviceId(1), vec![0x10, 0x00]), (DeviceId(2), vec![0x20, 0x01])],
        )
        .unwrap();
        assert_eq!(packet.params, vec![30, 2, 1, 0x10, 0x00, 2, 0x20, 0x01]);
        assert!(!packet.expects_reply());
    }

    #[test]
    fn test_sync_write_rejects_width_mismatch() {
        let err = InstructionPacket::sync_write(30, 2, &[(DeviceId(1), vec![0x10])]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_decode_unknown_instruction() {
        let bytes = encode_frame(1, 0x7F, &[]).unwrap();
        let err = InstructionPacket::try_from(bytes.as_slice()).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownInstruction { code: 0x7F });
    }
}
