//! UR SDK - Universal Robots 实时接口 Rust SDK
//!
//! 通过控制器实时接口（TCP 端口 30003）读取约 125Hz 的二进制反馈帧，
//! 并以 URScript 文本下发速度/位置/示教指令。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 帧长度对照表、字段偏移表、URScript 指令构建
//! - **传输层** (`net`): TCP 传输与测试用脚本化传输
//! - **驱动层** (`driver`): 帧重组、版本识别、状态快照、运动状态机
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ur_sdk::prelude::*;
//!
//! # fn main() -> Result<(), DriverError> {
//! ur_sdk::init_logger();
//! let mut driver = UrBuilder::new().host("192.168.1.10").build()?;
//! driver.connect()?;
//! let thread = driver.spawn()?;
//! let robot = thread.handle().clone();
//! robot.joint_velocity_move([0.05, 0.0, 0.0, 0.0, 0.0, 0.0])?;
//! println!("{:?}", robot.joint_position());
//! # Ok(())
//! # }
//! ```

mod logging;

pub mod prelude;

// 各层以模块路径访问
pub use ur_driver as driver;
pub use ur_net as net;
pub use ur_protocol as protocol;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

pub use logging::{DEFAULT_LOG_FILTER, init_logger, init_logger_with};

// 协议层常用类型
pub use ur_protocol::{
    CartesianPose, ProtocolError, ProtocolVersion, RobotMode, SafetyMode, ScriptCommand,
    VelocityLimits,
};

// 传输层
pub use ur_net::{NetError, RT_PORT, RtTransport, TcpTransport};

// 驱动层
pub use ur_driver::{
    DriverConfig, DriverError, DriverEvent, DriverHandle, DriverThread, MetricsSnapshot,
    MotionRequest, OperatingMode, RobotState, TimeCheck, UrBuilder, UrDriver,
};

/// TCP 连接的驱动
pub type TcpDriver = UrDriver<TcpTransport>;
