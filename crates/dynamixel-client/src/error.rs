//! 错误类型体系
//!
//! 驱动层错误按根因归类为调用方关心的类别：配置、连接、帧损坏、超时、
//! 设备报错、参数、未知命令、取消、已关闭。
//!
//! # 示例
//!
//! ```rust
//! use dynamixel_client::ServoError;
//!
//! fn handle_error(err: ServoError) {
//!     if err.is_retryable() {
//!         eprintln!("可重试错误: {}", err);
//!     } else if err.is_config_error() {
//!         eprintln!("参数错误: {}", err);
//!     } else {
//!         eprintln!("错误: {}", err);
//!     }
//! }
//! ```

use crate::command::CommandMap;
use dynamixel_driver::DriverError;
use dynamixel_protocol::{ProtocolError, StatusError};
use dynamixel_serial::TransportError;
use std::time::Duration;
use thiserror::Error;

/// 舵机控制器错误类型
#[derive(Debug, Error)]
pub enum ServoError {
    // ==================== Construction ====================
    /// 构造参数错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 打开串口或初始握手失败
    #[error("Failed to connect to servo {id} on {port}: {source}")]
    Connect {
        port: String,
        id: u8,
        #[source]
        source: DriverError,
    },

    // ==================== Wire ====================
    /// 帧结构错误
    #[error("Malformed frame: {0}")]
    Frame(ProtocolError),

    /// 校验和错误
    #[error("Checksum error: {0}")]
    Checksum(ProtocolError),

    /// 截止时间内没有应答
    #[error("Servo {id} did not respond within {waited:?}")]
    Timeout { id: u8, waited: Duration },

    /// 舵机在状态包中报告了错误
    #[error("Servo {id} reported error: {error}")]
    Protocol { id: u8, error: StatusError },

    /// 串口读写失败
    #[error("Serial transport error: {0}")]
    Transport(TransportError),

    // ==================== Caller ====================
    /// 参数缺失或类型错误
    #[error("Invalid parameter: {0}")]
    Parameter(String),

    /// 未知的 do_command 命令
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    /// 因关闭或取消而中止
    #[error("Operation cancelled")]
    Cancelled,

    /// 控制器已关闭
    #[error("Servo is closed")]
    Closed,

    // ==================== Aggregates ====================
    /// 多个独立步骤都失败了
    #[error("Multiple errors: {}", join_messages(.0))]
    Multiple(Vec<ServoError>),

    /// do_command 执行失败；`result` 仍是返回给调用方的结果表
    #[error("Command failed: {source}")]
    CommandFailed {
        result: CommandMap,
        #[source]
        source: Box<ServoError>,
    },
}

fn join_messages(errors: &[ServoError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ServoError {
    /// 合并多个错误：空则 `None`，一个则原样返回，多个则 `Multiple`
    pub fn join(mut errors: Vec<ServoError>) -> Option<ServoError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ServoError::Multiple(errors)),
        }
    }

    /// 连接失败（附带端口和设备 ID）
    pub(crate) fn connect(port: &str, id: u8, source: DriverError) -> Self {
        ServoError::Connect {
            port: port.to_string(),
            id,
            source,
        }
    }

    /// 是否可重试（重新执行操作可能成功）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Checksum(_) | Self::Frame(_)
        )
    }

    /// 是否为调用方输入错误
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Parameter(_) | Self::UnknownCommand(_)
        )
    }

    /// do_command 失败时的结果表
    pub fn command_result(&self) -> Option<&CommandMap> {
        match self {
            Self::CommandFailed { result, .. } => Some(result),
            _ => None,
        }
    }
}

impl From<DriverError> for ServoError {
    /// 穿透操作上下文，按根因归类
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Operation { source, .. } => ServoError::from(*source),
            DriverError::Transport(e) => ServoError::Transport(e),
            DriverError::Protocol(e) if e.is_checksum() => ServoError::Checksum(e),
            DriverError::Protocol(ProtocolError::InvalidDeviceId { id }) => {
                ServoError::Config(format!("invalid device id {id}"))
            },
            DriverError::Protocol(e) => ServoError::Frame(e),
            DriverError::Timeout { id, waited } => ServoError::Timeout {
                id: id.get(),
                waited,
            },
            DriverError::Status { id, error } => ServoError::Protocol {
                id: id.get(),
                error,
            },
            DriverError::Cancelled => ServoError::Cancelled,
            DriverError::InvalidInput(message) => ServoError::Parameter(message),
        }
    }
}
