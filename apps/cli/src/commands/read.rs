//! 寄存器读取命令

use crate::modes::oneshot::OneShotConfig;
use anyhow::Result;
use clap::Args;
use dynamixel_driver::{CancellationToken, Servo};
use dynamixel_protocol::{Access, S_MODEL, ValueTransform};

/// 寄存器读取命令参数
#[derive(Args, Debug)]
pub struct ReadCommand {
    /// 寄存器名称（如 present_position、present_temperature）
    #[arg(required_unless_present = "list")]
    pub register: Option<String>,

    /// 列出所有寄存器
    #[arg(short, long)]
    pub list: bool,
}

impl ReadCommand {
    /// `--list` 不需要连接
    pub fn needs_connection(&self) -> bool {
        !self.list
    }

    pub fn list_registers(&self) -> Result<()> {
        print_registers();
        Ok(())
    }

    pub fn execute(&self, config: &OneShotConfig) -> Result<()> {
        if self.list {
            return self.list_registers();
        }
        let name = self.register.as_deref().unwrap_or_default();
        let register = S_MODEL
            .by_name(name)
            .ok_or_else(|| anyhow::anyhow!("未知寄存器: {name}（使用 --list 查看全部）"))?;

        let bus = config.open_bus()?;
        let servo = Servo::new(bus, config.servo.id)?;
        let raw = servo.read_register(register, &CancellationToken::new())?;

        match register.transform {
            ValueTransform::Angle(scale) => {
                println!("{} = {raw} ({:.2}°)", register.name, scale.raw_to_degrees(raw))
            },
            ValueTransform::Boolean => println!("{} = {}", register.name, raw != 0),
            ValueTransform::Raw => println!("{} = {raw}", register.name),
        }
        Ok(())
    }
}

fn print_registers() {
    println!("{} 控制表:", S_MODEL.model);
    for register in S_MODEL.registers() {
        let access = match register.access {
            Access::ReadOnly => "R",
            Access::ReadWrite => "RW",
        };
        println!(
            "  {:>3}  {}B  {:<2}  {}",
            register.address, register.width, access, register.name
        );
    }
}
