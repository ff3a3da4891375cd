//! 监控命令
//!
//! 周期性打印位置和运动状态，Ctrl-C 退出

use crate::modes::oneshot::OneShotConfig;
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use dynamixel_client::{Actuator, Extra};
use std::time::Duration;

/// 监控命令参数
#[derive(Args, Debug)]
pub struct WatchCommand {
    /// 刷新间隔（毫秒）
    #[arg(short = 'n', long, default_value_t = 200)]
    pub interval_ms: u64,
}

impl WatchCommand {
    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let servo = config.connect()?;
        let extra = Extra::new();
        let interval = Duration::from_millis(self.interval_ms.max(10));

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })
        .context("安装 Ctrl-C 处理器失败")?;

        println!("👀 监控舵机 {}（Ctrl-C 退出）", servo.device_id());
        loop {
            match (servo.position(&extra), servo.is_moving()) {
                (Ok(position), Ok(moving)) => {
                    println!("  {position:>3}°  {}", if moving { "moving" } else { "idle" })
                },
                (Err(e), _) | (_, Err(e)) => tracing::warn!("读取失败: {e}"),
            }

            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let snapshot = servo.metrics();
        println!(
            "📈 事务 {}，超时 {}（{:.1}%），校验/帧错误 {}",
            snapshot.transactions,
            snapshot.timeouts,
            snapshot.timeout_rate(),
            snapshot.checksum_errors + snapshot.frame_errors
        );
        Ok(())
    }
}
