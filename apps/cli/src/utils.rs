//! 用户交互工具

use anyhow::{Context, Result};
use inquire::Confirm;

/// 询问用户确认；非交互终端下返回错误
pub fn prompt_confirmation(message: &str, default: bool) -> Result<bool> {
    Confirm::new(message)
        .with_default(default)
        .prompt()
        .context("无法读取确认（非交互终端请使用 --force）")
}
