//! 帧编码/解码
//!
//! 纯函数实现，不涉及任何 IO。指令包与状态包共享同一帧结构，
//! 区别只在第 5 个字节的含义（指令码 / 错误位域）。

use crate::{DeviceId, Instruction, InstructionPacket, ProtocolError, StatusPacket};

/// 帧头
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// 帧头 + ID + LEN 的字节数（读取 LEN 之前必须收到的前缀长度）
pub const PREFIX_LEN: usize = 4;

/// 最短帧长度：帧头(2) + ID + LEN + 指令/错误 + 校验和
pub const MIN_FRAME_LEN: usize = 6;

/// 单帧最多携带的参数字节数（LEN 字段最大 255 = 参数 + 2）
pub const MAX_PARAMS: usize = 253;

/// 未经语义解释的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// 设备 ID
    pub id: u8,
    /// 指令码（指令包）或错误位域（状态包）
    pub code: u8,
    /// 参数字节
    pub params: Vec<u8>,
}

/// 计算校验和
///
/// `body` 为 ID 到最后一个参数字节（不含帧头和校验和本身）。
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 编码一帧（不检查 code 的语义）
pub fn encode_frame(id: u8, code: u8, params: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if params.len() > MAX_PARAMS {
        return Err(ProtocolError::ParamsTooLong {
            len: params.len(),
            max: MAX_PARAMS,
        });
    }

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + params.len());
    frame.extend_from_slice(&HEADER);
    frame.push(id);
    frame.push((params.len() + 2) as u8);
    frame.push(code);
    frame.extend_from_slice(params);
    let sum = checksum(&frame[HEADER.len()..]);
    frame.push(sum);
    Ok(frame)
}

/// 编码指令包
///
/// # 示例
///
/// ```rust
/// use dynamixel_protocol::{DeviceId, Instruction, encode};
///
/// let frame = encode(DeviceId(1), Instruction::Ping, &[]).unwrap();
/// assert_eq!(frame, vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
/// ```
pub fn encode(
    id: DeviceId,
    instruction: Instruction,
    params: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(id.get(), instruction.into(), params)
}

/// 解码一帧完整的字节序列
///
/// 输入必须恰好是一帧：多余或缺失的字节都会被视为帧错误。
pub fn decode_frame(bytes: &[u8]) -> Result<RawFrame, ProtocolError> {
    let total = match frame_len(bytes)? {
        Some(total) => total,
        None => {
            return Err(ProtocolError::Truncated {
                needed: MIN_FRAME_LEN,
                actual: bytes.len(),
            });
        },
    };

    if bytes.len() < total {
        return Err(ProtocolError::Truncated {
            needed: total,
            actual: bytes.len(),
        });
    }
    if bytes.len() > total {
        return Err(ProtocolError::LengthMismatch {
            declared: total - PREFIX_LEN,
            actual: bytes.len() - PREFIX_LEN,
        });
    }

    let expected = checksum(&bytes[HEADER.len()..total - 1]);
    let actual = bytes[total - 1];
    if expected != actual {
        return Err(ProtocolError::Checksum { expected, actual });
    }

    Ok(RawFrame {
        id: bytes[2],
        code: bytes[4],
        params: bytes[5..total - 1].to_vec(),
    })
}

/// 解码状态包
pub fn decode_status(bytes: &[u8]) -> Result<StatusPacket, ProtocolError> {
    StatusPacket::decode(bytes)
}

/// 解码指令包
pub fn decode_instruction(bytes: &[u8]) -> Result<InstructionPacket, ProtocolError> {
    InstructionPacket::decode(bytes)
}

/// 流式读取辅助：根据已收到的前缀计算整帧长度
///
/// - `Ok(None)`: 前缀不足 4 字节，需要继续读取
/// - `Ok(Some(n))`: 整帧共 `n` 字节
/// - `Err(..)`: 帧头或 LEN 字段非法
pub fn frame_len(prefix: &[u8]) -> Result<Option<usize>, ProtocolError> {
    for (i, byte) in prefix.iter().take(HEADER.len()).enumerate() {
        if *byte != HEADER[i] {
            let mut found = [0u8; 2];
            let n = prefix.len().min(2);
            found[..n].copy_from_slice(&prefix[..n]);
            return Err(ProtocolError::InvalidHeader { found });
        }
    }

    if prefix.len() < PREFIX_LEN {
        return Ok(None);
    }

    let len = prefix[3] as usize;
    if len < 2 {
        return Err(ProtocolError::InvalidLength {
            expected: 2,
            actual: len,
        });
    }
    Ok(Some(PREFIX_LEN + len))
}

/// 在缓冲区中查找下一个帧头的位置
///
/// 连续的 `0xFF` 填充会被跳过（ID 不可能为 `0xFF`），
/// 返回的下标总是指向紧邻 ID 的那对 `0xFF`。
pub fn find_header(bytes: &[u8]) -> Option<usize> {
    let mut start = bytes.windows(2).position(|w| w == HEADER)?;
    while start + 2 < bytes.len() && bytes[start + 2] == 0xFF {
        start += 1;
    }
    Some(start)
}
