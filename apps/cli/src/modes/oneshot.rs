//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 合并命令行参数与配置文件
//! 2. 连接舵机
//! 3. 执行操作
//! 4. 退出（不恢复扭矩，保留命令的效果）

use crate::commands::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use dynamixel_client::{DynamixelServo, ServoConfig};
use dynamixel_driver::{Bus, BusBuilder};
use std::sync::Arc;

/// 连接参数（优先于配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口（如 /dev/ttyUSB0、COM3）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率（默认 1000000）
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 舵机 ID
    #[arg(short, long)]
    pub id: Option<u8>,

    /// 读超时（毫秒）
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// One-shot 模式配置
#[derive(Debug, Clone)]
pub struct OneShotConfig {
    pub servo: ServoConfig,
}

impl OneShotConfig {
    /// 合并连接参数：命令行 > 配置文件 > 默认值
    pub fn resolve(args: &ConnectionArgs, file: &CliConfig) -> Result<Self> {
        let defaults = ServoConfig::default();
        let port = args
            .port
            .clone()
            .or_else(|| file.port.clone())
            .context("未指定串口：使用 --port 或 `config set --port`")?;

        let servo = ServoConfig {
            port,
            baud_rate: args.baud.or(file.baud_rate).unwrap_or(defaults.baud_rate),
            id: args.id.or(file.id).unwrap_or(defaults.id),
            read_timeout_ms: args
                .timeout_ms
                .or(file.read_timeout_ms)
                .unwrap_or(defaults.read_timeout_ms),
        };
        servo.validate()?;
        Ok(Self { servo })
    }

    /// 连接舵机（PING 并使能扭矩）
    ///
    /// 进度信息写到 stderr，stdout 只留给命令输出（如 JSON）。
    pub fn connect(&self) -> Result<DynamixelServo> {
        eprintln!("⏳ 连接舵机 {} ({})...", self.servo.id, self.servo.port);
        let servo = DynamixelServo::connect("dynamixel-cli", self.servo.clone())?;
        Ok(servo)
    }

    /// 只打开总线（不触碰舵机状态）
    pub fn open_bus(&self) -> Result<Arc<Bus>> {
        let bus = BusBuilder::new()
            .port(self.servo.port.as_str())
            .baud_rate(self.servo.effective_baud_rate())
            .read_timeout(self.servo.read_timeout())
            .build()
            .with_context(|| format!("打开串口失败: {}", self.servo.port))?;
        Ok(bus)
    }
}
