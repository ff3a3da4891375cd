//! 舵机构造参数

use crate::error::ServoError;
use dynamixel_protocol::DeviceId;
use dynamixel_serial::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 舵机配置
///
/// 可以从 JSON/TOML 反序列化，缺省字段使用默认值：
///
/// ```toml
/// port = "/dev/ttyUSB0"
/// baud_rate = 57600
/// id = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// 串口名称（必填）
    pub port: String,
    /// 波特率，0 表示默认值 1 000 000
    pub baud_rate: u32,
    /// 舵机 ID（0..=253）
    pub id: u8,
    /// 等待一个状态包的截止时间（毫秒）
    pub read_timeout_ms: u64,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 0,
            id: 1,
            read_timeout_ms: 100,
        }
    }
}

impl ServoConfig {
    pub fn new(port: impl Into<String>, id: u8) -> Self {
        Self {
            port: port.into(),
            id,
            ..Self::default()
        }
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn read_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    /// 实际使用的波特率
    pub fn effective_baud_rate(&self) -> u32 {
        if self.baud_rate == 0 {
            DEFAULT_BAUD_RATE
        } else {
            self.baud_rate
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// 检查配置
    ///
    /// # Errors
    /// - `ServoError::Config`: 串口为空、ID 不可寻址或超时为 0
    pub fn validate(&self) -> Result<(), ServoError> {
        if self.port.trim().is_empty() {
            return Err(ServoError::Config("serial port is required".into()));
        }
        DeviceId::new(self.id).map_err(|e| ServoError::Config(e.to_string()))?;
        if self.read_timeout_ms == 0 {
            return Err(ServoError::Config(
                "read timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
