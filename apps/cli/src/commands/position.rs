//! 位置查询命令

use crate::modes::oneshot::OneShotConfig;
use anyhow::Result;
use clap::{Args, ValueEnum};
use dynamixel_client::{Actuator, Extra};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// 位置查询命令参数
#[derive(Args, Debug)]
pub struct PositionCommand {
    /// 输出格式
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl PositionCommand {
    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let servo = config.connect()?;
        let position = servo.position(&Extra::new())?;
        let moving = servo.is_moving()?;

        match self.format {
            OutputFormat::Table => {
                println!("📊 舵机 {}:", servo.device_id());
                println!("  位置: {position}°");
                println!("  运动中: {}", if moving { "是" } else { "否" });
            },
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "id": servo.device_id().get(),
                    "position": position,
                    "moving": moving,
                });
                println!("{value}");
            },
        }
        Ok(())
    }
}
