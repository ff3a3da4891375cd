//! 命令定义和实现

pub mod command;
pub mod config;
pub mod r#move;
pub mod ping;
pub mod position;
pub mod read;
pub mod scan;
pub mod stop;
pub mod torque;
pub mod watch;

pub use command::DoCommand;
pub use config::{CliConfig, ConfigCommand};
pub use r#move::MoveCommand;
pub use ping::PingCommand;
pub use position::PositionCommand;
pub use read::ReadCommand;
pub use scan::ScanCommand;
pub use stop::StopCommand;
pub use torque::TorqueCommand;
pub use watch::WatchCommand;
