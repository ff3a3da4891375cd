//! 运行模式
//!
//! 每个命令独立连接、执行、退出（One-shot 模式）

pub mod oneshot;
