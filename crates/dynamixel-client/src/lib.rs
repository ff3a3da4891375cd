//! 客户端接口模块
//!
//! 单个 Dynamixel 舵机的执行器接口：
//! - [`Actuator`]：移动、读取位置、停止、运动状态、扩展命令、关闭
//! - [`DynamixelServo`]：`Ready → Closed` 状态机，自带取消令牌
//! - [`ServoConfig`]：可序列化的构造参数（JSON/TOML）
//! - [`ServoCommand`]：`do_command` 的强类型命令
//! - [`ServoError`]：面向调用方的错误分类
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。需要在一条总线上协调多个舵机、
//! 或直接读写寄存器时，使用 `dynamixel-driver`。
//!
//! ```no_run
//! use dynamixel_client::{Actuator, DynamixelServo, Extra, ServoConfig};
//!
//! let config = ServoConfig::new("/dev/ttyUSB0", 1);
//! let servo = DynamixelServo::connect("shoulder", config).unwrap();
//! servo.move_to(90, &Extra::new()).unwrap();
//! println!("at {}°", servo.position(&Extra::new()).unwrap());
//! servo.close().unwrap();
//! ```

pub mod command;
pub mod config;
pub mod error;
mod servo;

pub use command::{CommandMap, ServoCommand};
pub use config::ServoConfig;
pub use error::ServoError;
pub use servo::{Actuator, DynamixelServo, Extra};
