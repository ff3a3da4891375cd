//! `do_command` 的强类型命令
//!
//! 线上格式是一张 JSON 对象，必须包含字符串字段 `"command"`：
//!
//! ```json
//! {"command": "set_torque", "enable": true}
//! {"command": "ping"}
//! ```
//!
//! 在边界处一次性解码为 [`ServoCommand`]，之后按枚举分派。

use crate::error::ServoError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `do_command` 的输入/输出表
pub type CommandMap = serde_json::Map<String, Value>;

/// 已识别的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ServoCommand {
    /// 使能/失能扭矩
    SetTorque { enable: bool },
    /// 检查舵机是否在线
    Ping,
}

impl ServoCommand {
    /// 从命令表解码
    ///
    /// # Errors
    /// - `Parameter`: 缺少 `"command"` 字段，或命令所需字段缺失/类型错误
    /// - `UnknownCommand`: `"command"` 不是已识别的命令
    pub fn decode(map: &CommandMap) -> Result<Self, ServoError> {
        let name = match map.get("command") {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                return Err(ServoError::Parameter(format!(
                    "\"command\" must be a string, got {other}"
                )));
            },
            None => return Err(ServoError::Parameter("missing \"command\" field".into())),
        };

        match name {
            "set_torque" => match map.get("enable") {
                Some(Value::Bool(enable)) => Ok(ServoCommand::SetTorque { enable: *enable }),
                Some(other) => Err(ServoError::Parameter(format!(
                    "\"enable\" must be a boolean, got {other}"
                ))),
                None => Err(ServoError::Parameter(
                    "set_torque requires a boolean \"enable\" field".into(),
                )),
            },
            "ping" => Ok(ServoCommand::Ping),
            other => Err(ServoError::UnknownCommand(other.to_string())),
        }
    }

    /// 编码为命令表
    pub fn to_map(&self) -> CommandMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => CommandMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServoCommand::SetTorque { .. } => "set_torque",
            ServoCommand::Ping => "ping",
        }
    }
}

/// `{"success": <success>}`
pub fn success_map(success: bool) -> CommandMap {
    let mut map = CommandMap::new();
    map.insert("success".into(), Value::Bool(success));
    map
}
