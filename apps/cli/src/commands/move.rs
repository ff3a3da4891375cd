//! 移动命令
//!
//! 移动舵机到目标角度，大幅移动需要确认

use crate::modes::oneshot::OneShotConfig;
use crate::utils;
use anyhow::Result;
use clap::Args;
use dynamixel_client::{Actuator, Extra};
use std::time::{Duration, Instant};

/// 超过该角度差的移动需要确认
const CONFIRM_THRESHOLD_DEG: u32 = 90;

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 目标角度（度，0-359）
    #[arg(value_parser = clap::value_parser!(u32).range(0..360))]
    pub angle: u32,

    /// 跳过确认提示
    #[arg(long)]
    pub force: bool,

    /// 等待运动结束
    #[arg(short, long)]
    pub wait: bool,

    /// 等待运动结束的最长时间（毫秒）
    #[arg(long, default_value_t = 5_000)]
    pub wait_timeout_ms: u64,
}

impl MoveCommand {
    /// 是否需要确认
    pub fn requires_confirmation(&self, current: u32) -> bool {
        !self.force && self.angle.abs_diff(current) > CONFIRM_THRESHOLD_DEG
    }

    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        let servo = config.connect()?;
        let extra = Extra::new();

        let current = servo.position(&extra)?;
        if self.requires_confirmation(current) {
            let confirmed = utils::prompt_confirmation(
                &format!("大幅移动检测（{current}° → {}°），确定要继续吗？", self.angle),
                false,
            )?;
            if !confirmed {
                println!("❌ 操作已取消");
                return Ok(());
            }
        }

        println!("🎯 移动到 {}°", self.angle);
        servo.move_to(self.angle, &extra)?;

        if self.wait {
            let deadline = Instant::now() + Duration::from_millis(self.wait_timeout_ms);
            while servo.is_moving()? {
                if Instant::now() >= deadline {
                    anyhow::bail!("等待运动结束超时（{} ms）", self.wait_timeout_ms);
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            println!("✅ 到达 {}°", servo.position(&extra)?);
        } else {
            println!("✅ 目标位置已写入");
        }
        Ok(())
    }
}
