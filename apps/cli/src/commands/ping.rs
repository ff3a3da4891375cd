//! PING 命令
//!
//! 只检查舵机是否在线并读取型号信息，不改变扭矩状态

use crate::modes::oneshot::OneShotConfig;
use anyhow::Result;
use clap::Args;
use dynamixel_driver::{CancellationToken, Servo};

/// PING 命令参数
#[derive(Args, Debug)]
pub struct PingCommand {
    /// 最多尝试次数
    #[arg(short, long, default_value_t = 1)]
    pub retries: u32,
}

impl PingCommand {
    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let bus = config.open_bus()?;
        let servo = Servo::new(bus, config.servo.id)?;
        let token = CancellationToken::new();

        servo.ping_with_retries(self.retries, &token)?;
        println!("✅ 舵机 {} 在线", servo.id());
        println!("  型号: {}", servo.model_number(&token)?);
        println!("  固件版本: {}", servo.firmware_version(&token)?);
        println!("  电压: {:.1} V", servo.voltage(&token)?);
        println!("  温度: {} °C", servo.temperature(&token)?);
        println!("  扭矩: {}", if servo.torque_enabled(&token)? { "使能" } else { "失能" });
        Ok(())
    }
}
