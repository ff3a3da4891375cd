//! 扩展命令（do_command）
//!
//! ```bash
//! dynamixel-cli command '{"command": "set_torque", "enable": true}'
//! ```

use crate::modes::oneshot::OneShotConfig;
use anyhow::{Context, Result};
use clap::Args;
use dynamixel_client::{Actuator, CommandMap, ServoCommand};

/// 扩展命令参数
#[derive(Args, Debug)]
pub struct DoCommand {
    /// JSON 对象，必须包含 "command" 字段
    pub json: String,
}

impl DoCommand {
    /// 解析并检查命令（不连接舵机）
    pub fn parse(&self) -> Result<CommandMap> {
        let map: CommandMap = serde_json::from_str(&self.json).context("命令必须是 JSON 对象")?;
        ServoCommand::decode(&map)?;
        Ok(map)
    }

    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let map = self.parse()?;
        let servo = config.connect()?;
        let result = match servo.do_command(&map) {
            Ok(result) => result,
            Err(e) => {
                if let Some(result) = e.command_result() {
                    println!("{}", serde_json::Value::Object(result.clone()));
                }
                return Err(e.into());
            },
        };
        println!("{}", serde_json::Value::Object(result));
        Ok(())
    }
}
