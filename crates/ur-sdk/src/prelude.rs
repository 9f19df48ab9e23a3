//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ur_sdk::prelude::*;
//! ```

// 驱动层入口
pub use crate::driver::{DriverHandle, DriverThread, UrBuilder, UrDriver};

// 请求、事件与状态
pub use crate::driver::{DriverEvent, MotionRequest, OperatingMode, RobotState};

// 配置
pub use crate::driver::{DriverConfig, TimeCheck};
pub use crate::protocol::VelocityLimits;

// 位姿
pub use crate::protocol::{CartesianPose, ProtocolVersion};

// 传输层（常用 Trait）
pub use crate::net::RtTransport;

// 错误类型
pub use crate::driver::DriverError;
pub use crate::net::NetError;
pub use crate::protocol::ProtocolError;
