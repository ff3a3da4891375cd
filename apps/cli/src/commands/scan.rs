//! 总线扫描命令

use crate::modes::oneshot::OneShotConfig;
use anyhow::Result;
use clap::Args;
use dynamixel_driver::CancellationToken;
use dynamixel_protocol::DeviceId;

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// 起始 ID
    #[arg(long, default_value_t = 0)]
    pub start: u8,

    /// 结束 ID（包含）
    #[arg(long, default_value_t = DeviceId::MAX)]
    pub end: u8,
}

impl ScanCommand {
    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        if self.start > self.end {
            anyhow::bail!("起始 ID {} 大于结束 ID {}", self.start, self.end);
        }
        let bus = config.open_bus()?;

        println!("🔍 扫描 ID {}..={}", self.start, self.end);
        let found = bus.scan(self.start..=self.end, &CancellationToken::new())?;

        if found.is_empty() {
            println!("(未发现舵机)");
        } else {
            for id in &found {
                println!("  ✅ {id}");
            }
            println!("共发现 {} 个舵机", found.len());
        }
        Ok(())
    }
}
