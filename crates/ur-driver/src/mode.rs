//! 运行模式定义
//!
//! `OperatingMode` 是运动状态机对外可见的模式标签，
//! 通过 [`AtomicOperatingMode`] 在驱动线程与调用方之间共享。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 驱动运行模式
///
/// # 模式说明
///
/// - **Disconnected**: 未连接，不发送任何周期指令
/// - **Idle**: 已连接，等待请求
/// - **VelocityMoving**: 每周期重发速度指令，超时后自动停止
/// - **PositionMoving**: 已发送位置指令，关节静止后回到 Idle
/// - **FreeDrive**: 每周期刷新 `freedrive_mode()`
/// - **PoweringOn / PoweringOff**: 保留，不存在进入或退出的转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OperatingMode {
    #[default]
    Disconnected = 0,
    Idle = 1,
    VelocityMoving = 2,
    PositionMoving = 3,
    FreeDrive = 4,
    PoweringOn = 5,
    PoweringOff = 6,
}

impl OperatingMode {
    /// 从 u8 转换
    ///
    /// 无效值返回 Disconnected。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Idle,
            2 => Self::VelocityMoving,
            3 => Self::PositionMoving,
            4 => Self::FreeDrive,
            5 => Self::PoweringOn,
            6 => Self::PoweringOff,
            _ => Self::Disconnected,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否已连接
    pub fn is_connected(self) -> bool {
        self != Self::Disconnected
    }

    /// 日志用名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Idle => "Idle",
            Self::VelocityMoving => "VelocityMoving",
            Self::PositionMoving => "PositionMoving",
            Self::FreeDrive => "FreeDrive",
            Self::PoweringOn => "PoweringOn",
            Self::PoweringOff => "PoweringOff",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 运行模式（原子版本，用于线程间共享）
///
/// 驱动周期在每次状态提交后写入，调用方随时读取。
#[derive(Debug, Default)]
pub struct AtomicOperatingMode {
    inner: AtomicU8,
}

impl AtomicOperatingMode {
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    /// 获取当前模式
    pub fn get(&self) -> OperatingMode {
        OperatingMode::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// 设置模式
    pub fn set(&self, mode: OperatingMode) {
        self.inner.store(mode.as_u8(), Ordering::Release);
    }
}
