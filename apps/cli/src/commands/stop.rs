//! 停止命令
//!
//! 扭矩先失能再使能，舵机停在当前位置

use crate::modes::oneshot::OneShotConfig;
use anyhow::Result;
use clap::Args;
use dynamixel_client::{Actuator, Extra};

/// 停止命令参数
#[derive(Args, Debug)]
pub struct StopCommand {}

impl StopCommand {
    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let servo = config.connect()?;
        println!("🛑 停止舵机 {}...", servo.device_id());
        servo.stop(&Extra::new())?;
        println!("✅ 已停止");
        Ok(())
    }
}
