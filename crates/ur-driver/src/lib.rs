//! 驱动层模块
//!
//! 本模块提供 UR 控制器实时接口（端口 30003）的驱动功能，包括：
//! - 帧重组（单条 TCP 流按长度头切分）
//! - 协议版本识别（按帧长度累计证据，带迟滞切换）
//! - 状态同步（ArcSwap 整份快照，无锁读取）
//! - 运动状态机（速度/位置/示教模式与 URScript 指令发送）
//!
//! # 使用场景
//!
//! 驱动由单一线程推进（[`UrDriver::cycle`] / [`UrDriver::run`] /
//! [`UrDriver::spawn`]），其他线程通过 [`DriverHandle`] 交互。

mod builder;
mod decoder;
mod detector;
mod driver;
mod error;
mod event;
mod handle;
pub mod machine;
pub mod metrics;
pub mod mode;
pub mod pipeline;
pub mod reassembler;
pub mod state;

pub use builder::UrBuilder;
pub use decoder::{DecodeOutcome, FrameDecoder, NOMINAL_PERIOD, TimeCheck};
pub use detector::{Detection, VersionDetector};
pub use driver::{CycleOutcome, DriverThread, RequestOutcome, UrDriver};
pub use error::DriverError;
pub use event::DriverEvent;
pub use handle::DriverHandle;
pub use machine::{
    MotionConfig, MotionRequest, MotionSignal, MotionState, MotionStateMachine, PendingVelocity,
    Transition,
};
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use mode::{AtomicOperatingMode, OperatingMode};
pub use pipeline::{DriverConfig, FrameOutcome, Pipeline, Processed};
pub use reassembler::{FrameReassembler, Reassembly};
pub use state::{Diagnostics, DriverContext, RobotState};
