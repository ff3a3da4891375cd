//! Builder 模式实现
//!
//! 提供链式构造 `Bus` 实例的便捷方式。

use crate::bus::{Bus, BusConfig};
use crate::error::DriverError;
use dynamixel_serial::{DEFAULT_BAUD_RATE, SerialConfig, SerialPortTransport, SerialTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Bus Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use dynamixel_driver::BusBuilder;
/// use std::time::Duration;
///
/// let bus = BusBuilder::new()
///     .port("/dev/ttyUSB0")
///     .baud_rate(57_600)
///     .read_timeout(Duration::from_millis(50))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct BusBuilder {
    /// 串口名称（"/dev/ttyUSB0"、"COM3" 等）
    port: Option<String>,
    /// 波特率（默认 1M）
    baud_rate: Option<u32>,
    config: BusConfig,
}

impl BusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 设置波特率（可选，默认 1M）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    /// 等待一个状态包的截止时间
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// 单次串口读取的最长时间
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// 完整替换时序配置
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// 打开串口并构建总线
    ///
    /// # Errors
    /// - `DriverError::InvalidInput`: 未指定串口
    /// - `DriverError::Transport`: 串口打开失败
    pub fn build(self) -> Result<Arc<Bus>, DriverError> {
        let port = self
            .port
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DriverError::InvalidInput("serial port not specified".into()))?;
        let serial = SerialConfig::new(port)
            .baud_rate(self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE))
            .read_timeout(self.config.poll_interval);
        let transport = SerialPortTransport::open(&serial)?;
        info!("Dynamixel bus ready on {} @ {} baud", serial.port, serial.baud_rate);
        Ok(self.build_with_transport(transport))
    }

    /// 使用任意传输层构建总线（测试、自定义转换器）
    pub fn build_with_transport(self, transport: impl SerialTransport + 'static) -> Arc<Bus> {
        Arc::new(Bus::with_config(transport, self.config))
    }
}
