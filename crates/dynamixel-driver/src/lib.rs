//! 驱动层模块
//!
//! 本模块提供 Dynamixel 舵机的总线驱动功能，包括：
//! - 总线协调（一条总线同一时刻只有一对指令-应答在途）
//! - 截止时间和取消令牌感知的应答读取
//! - 回显过滤与总线指标
//! - 按设备 ID 寻址的寄存器操作（[`Servo`]）
//!
//! # 使用场景
//!
//! 适用于需要直接读写寄存器、或在一条总线上驱动多个舵机的场景。
//! 只控制单个舵机的用户应该使用 `dynamixel-client` 提供的更高级接口。
//!
//! ```no_run
//! use dynamixel_driver::{BusBuilder, CancellationToken, Servo};
//!
//! let bus = BusBuilder::new().port("/dev/ttyUSB0").build().unwrap();
//! let token = CancellationToken::new();
//! let servo = Servo::new(bus.clone(), 1).unwrap();
//! servo.move_to(90.0, &token).unwrap();
//! println!("at {:.1}°", servo.angle(&token).unwrap());
//! ```

mod builder;
pub mod bus;
mod cancel;
mod error;
pub mod metrics;
mod servo;

pub use builder::BusBuilder;
pub use bus::{Bus, BusConfig};
pub use cancel::CancellationToken;
pub use error::DriverError;
pub use metrics::{BusMetrics, BusMetricsSnapshot};
pub use servo::Servo;
