//! 基于 `serialport` crate 的真实串口传输

use crate::{SerialConfig, SerialDeviceError, SerialDeviceErrorKind, SerialTransport, TransportError};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// 真实串口
///
/// `close()` 之后所有 IO 返回 [`TransportError::Closed`]。
pub struct SerialPortTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    read_timeout: Duration,
}

impl SerialPortTransport {
    /// 按配置打开串口（8N1，无流控）
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let open_err = |source: SerialDeviceError| TransportError::Open {
            port: config.port.clone(),
            source,
        };

        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => {
                return Err(open_err(SerialDeviceError::new(
                    SerialDeviceErrorKind::UnsupportedConfig,
                    format!("unsupported data bits: {other}"),
                )));
            },
        };
        let stop_bits = match config.stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => {
                return Err(open_err(SerialDeviceError::new(
                    SerialDeviceErrorKind::UnsupportedConfig,
                    format!("unsupported stop bits: {other}"),
                )));
            },
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| open_err(e.into()))?;

        info!(
            "Serial port opened: {} @ {} baud (read timeout {:?})",
            config.port, config.baud_rate, config.read_timeout
        );

        Ok(Self {
            port: Some(port),
            name: config.port.clone(),
            read_timeout: config.read_timeout,
        })
    }

    /// 端口名称
    pub fn name(&self) -> &str {
        &self.name
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl SerialTransport for SerialPortTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        Write::write_all(port, bytes)?;
        Write::flush(port)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match Read::read(self.port_mut()?, buf) {
            Ok(0) => Err(TransportError::Timeout),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if timeout == self.read_timeout {
            return Ok(());
        }
        self.port_mut()?
            .set_timeout(timeout)
            .map_err(|e| TransportError::Device(e.into()))?;
        self.read_timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port_mut()?
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Device(e.into()))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            debug!("Serial port closed: {}", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let config = SerialConfig::new("/dev/definitely-not-a-dynamixel-port");
        match SerialPortTransport::open(&config) {
            Err(TransportError::Open { port, .. }) => {
                assert_eq!(port, "/dev/definitely-not-a-dynamixel-port")
            },
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a nonexistent port should fail"),
        }
    }

    #[test]
    fn test_open_rejects_bad_framing() {
        let mut config = SerialConfig::new("/dev/ttyUSB0");
        config.data_bits = 9;
        let err = SerialPortTransport::open(&config).err().unwrap();
        match err {
            TransportError::Open { source, .. } => {
                assert_eq!(source.kind, SerialDeviceErrorKind::UnsupportedConfig)
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
