//! 驱动层错误类型定义

use dynamixel_protocol::{DeviceId, ProtocolError, StatusError};
use dynamixel_serial::TransportError;
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误
    #[error("Serial transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议解析错误（校验和、帧结构、参数编码）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 读截止时间内没有收到目标舵机的状态包
    #[error("No response from servo {id} within {waited:?}")]
    Timeout { id: DeviceId, waited: Duration },

    /// 舵机在状态包中报告了错误
    #[error("Servo {id} reported error: {error}")]
    Status { id: DeviceId, error: StatusError },

    /// 取消令牌已触发
    #[error("Operation cancelled")]
    Cancelled,

    /// 无效输入（角度越界、写只读寄存器等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 带操作名和设备 ID 的上下文包装
    #[error("{operation} on servo {id} failed: {source}")]
    Operation {
        operation: &'static str,
        id: DeviceId,
        source: Box<DriverError>,
    },
}

impl DriverError {
    /// 附加操作上下文（错误类别不变）
    pub fn with_context(self, operation: &'static str, id: DeviceId) -> Self {
        DriverError::Operation {
            operation,
            id,
            source: Box::new(self),
        }
    }

    /// 穿透所有上下文包装，返回根因
    pub fn root(&self) -> &DriverError {
        let mut current = self;
        while let DriverError::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.root(),
            DriverError::Timeout { .. } | DriverError::Transport(TransportError::Timeout)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), DriverError::Cancelled)
    }
}
