//! 扭矩开关命令

use crate::modes::oneshot::OneShotConfig;
use crate::utils;
use anyhow::Result;
use clap::{Args, ValueEnum};
use dynamixel_client::{Actuator, ServoCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TorqueState {
    On,
    Off,
}

/// 扭矩命令参数
#[derive(Args, Debug)]
pub struct TorqueCommand {
    #[arg(value_enum)]
    pub state: TorqueState,

    /// 跳过确认提示
    #[arg(long)]
    pub force: bool,
}

impl TorqueCommand {
    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let enable = self.state == TorqueState::On;
        if !enable && !self.force {
            let confirmed =
                utils::prompt_confirmation("失能后舵机将失去保持力，确定要继续吗？", false)?;
            if !confirmed {
                println!("❌ 操作已取消");
                return Ok(());
            }
        }

        let servo = config.connect()?;
        servo.do_command(&ServoCommand::SetTorque { enable }.to_map())?;
        println!(
            "✅ 舵机 {} 扭矩已{}",
            servo.device_id(),
            if enable { "使能" } else { "失能" }
        );
        Ok(())
    }
}
