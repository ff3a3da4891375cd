//! # Dynamixel CLI
//!
//! 串口舵机命令行工具
//!
//! ```bash
//! # 配置默认串口
//! dynamixel-cli config set --port /dev/ttyUSB0 --id 1
//!
//! # 执行操作（内部：连接 -> 执行 -> 退出）
//! dynamixel-cli ping
//! dynamixel-cli move 90 --wait
//! dynamixel-cli position --format json
//! dynamixel-cli --id 2 torque off --force
//! dynamixel-cli command '{"command": "ping"}'
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod modes;
mod utils;

use commands::{
    CliConfig, ConfigCommand, DoCommand, MoveCommand, PingCommand, PositionCommand, ReadCommand,
    ScanCommand, StopCommand, TorqueCommand, WatchCommand,
};
use dynamixel_client::Actuator;
use modes::oneshot::{ConnectionArgs, OneShotConfig};

/// Dynamixel CLI - 串口舵机命令行工具
#[derive(Parser, Debug)]
#[command(name = "dynamixel-cli")]
#[command(about = "Command-line interface for Dynamixel serial servos", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// 配置文件路径（默认 <config_dir>/dynamixel/config.toml）
    #[arg(long = "config", value_name = "PATH")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 检查舵机是否在线
    Ping(PingCommand),

    /// 扫描总线上的舵机
    Scan(ScanCommand),

    /// 移动到目标角度
    Move(MoveCommand),

    /// 查询当前位置
    Position(PositionCommand),

    /// 停止（扭矩失能再使能）
    Stop(StopCommand),

    /// 查询是否在运动
    Moving,

    /// 使能/失能扭矩
    Torque(TorqueCommand),

    /// 持续监控位置
    Watch(WatchCommand),

    /// 读取寄存器
    Read(ReadCommand),

    /// 执行扩展命令（JSON）
    Command(DoCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "dynamixel_cli=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_path = match cli.config_file {
        Some(path) => path,
        None => commands::config::default_config_file()?,
    };
    let connection = cli.connection;
    let resolve = || -> Result<OneShotConfig> {
        let file = CliConfig::load(&config_path)?;
        OneShotConfig::resolve(&connection, &file)
    };

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),
        Commands::Ping(args) => args.execute(&resolve()?),
        Commands::Scan(args) => args.execute(&resolve()?),
        Commands::Move(args) => args.execute(&resolve()?),
        Commands::Position(args) => args.execute(&resolve()?),
        Commands::Stop(args) => args.execute(&resolve()?),
        Commands::Moving => {
            let servo = resolve()?.connect()?;
            println!("{}", servo.is_moving()?);
            Ok(())
        },
        Commands::Torque(args) => args.execute(&resolve()?),
        Commands::Watch(args) => args.execute(&resolve()?),
        Commands::Read(args) if !args.needs_connection() => args.list_registers(),
        Commands::Read(args) => args.execute(&resolve()?),
        Commands::Command(args) => args.execute(&resolve()?),
    }
}
