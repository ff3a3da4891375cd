//! # Dynamixel Serial Transport Layer
//!
//! 半双工串口传输抽象层，提供统一的字节流接口。
//!
//! - [`SerialTransport`]: 传输 trait（写入、带超时读取、清空输入缓冲）
//! - [`SerialPortTransport`]: 基于 `serialport` crate 的真实串口实现
//! - `mock::SimulatedBus`: 模拟舵机总线（需要 `mock` feature）
//!
//! 本层不理解帧结构，只负责字节搬运；帧的拼装与校验由上层总线协调器完成。

use std::time::Duration;
use thiserror::Error;

mod port;

#[cfg(feature = "mock")]
pub mod mock;

pub use port::SerialPortTransport;

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// 默认读超时（字节间超时）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// 串口传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: SerialDeviceError,
    },
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 设备不可恢复（拔出、无权限、不存在）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<serialport::Error> for SerialDeviceError {
    fn from(err: serialport::Error) -> Self {
        use std::io::ErrorKind as Io;
        let kind = match err.kind() {
            serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NoDevice,
            serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::UnsupportedConfig,
            serialport::ErrorKind::Io(Io::NotFound) => SerialDeviceErrorKind::NotFound,
            serialport::ErrorKind::Io(Io::PermissionDenied) => SerialDeviceErrorKind::AccessDenied,
            serialport::ErrorKind::Io(Io::ResourceBusy) => SerialDeviceErrorKind::Busy,
            serialport::ErrorKind::Io(_) => SerialDeviceErrorKind::Backend,
            _ => SerialDeviceErrorKind::Unknown,
        };
        Self::new(kind, err.description)
    }
}

/// 串口参数
///
/// 数据位 8、停止位 1、无校验、无流控是 Dynamixel 总线的固定要求；
/// 这里仍然保留字段，以便接入使用非标准转换器的总线。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 端口标识（如 "/dev/ttyUSB0"、"COM3"）
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 数据位（5-8）
    pub data_bits: u8,
    /// 停止位（1 或 2）
    pub stop_bits: u8,
    /// 读超时（字节间超时）
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// 半双工字节流传输
///
/// 所有方法都可能阻塞；`read` 在超时内没有任何字节到达时返回
/// [`TransportError::Timeout`]，不会返回 `Ok(0)`。
pub trait SerialTransport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<(), TransportError> {
        Ok(())
    }
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.set_read_timeout(timeout)?;
        self.read(buf)
    }
    fn try_read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        match self.read_timeout(buf, Duration::from_millis(1)) {
            Ok(n) => Ok(Some(n)),
            Err(TransportError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
    /// 丢弃输入缓冲区中尚未读取的字节（上一轮残留的应答）
    fn clear_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(bytes)
    }
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(buf)
    }
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        (**self).set_read_timeout(timeout)
    }
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read_timeout(buf, timeout)
    }
    fn try_read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        (**self).try_read(buf)
    }
    fn clear_input(&mut self) -> Result<(), TransportError> {
        (**self).clear_input()
    }
    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}
