//! URScript 指令构建
//!
//! 将运动目标格式化为控制器可执行的单行 URScript 文本（以 `\n` 结尾）。
//! 数值固定为 `{:6.4}` 格式（6 个值，4 位小数），加速度/速度参数为固定常量。
//! 编码本身不会失败，只有随后的发送可能失败。

use crate::pose::CartesianPose;
use std::fmt;

// ============================================================================
// 常量
// ============================================================================

/// 关节速度下限（0.001°/s，弧度）
pub const MIN_JOINT_VELOCITY: f64 = 0.001 * std::f64::consts::PI / 180.0;

/// 关节速度上限（12°/s，弧度）
pub const MAX_JOINT_VELOCITY: f64 = 12.0 * std::f64::consts::PI / 180.0;

/// `speedj` / `speedl` 加速度
pub const SPEED_ACCELERATION: f64 = 1.4;

/// `movej` 关节加速度（rad/s²）
pub const MOVEJ_ACCELERATION: f64 = 1.4;

/// `movej` 关节速度（rad/s）
pub const MOVEJ_VELOCITY: f64 = 0.2;

/// `movel` 工具加速度（m/s²）
pub const MOVEL_ACCELERATION: f64 = 1.2;

/// `movel` 工具速度（m/s）
pub const MOVEL_VELOCITY: f64 = 0.08;

/// `stopj` 减速度
pub const STOPJ_DECELERATION: f64 = 1.4;

/// 单条指令的最大长度（常规数值范围内）
pub const MAX_COMMAND_LEN: usize = 100;

/// 关节速度停止指令
pub const SPEEDJ_STOP: &str = "speedj([0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1.4, 0.0)\n";

/// 笛卡尔速度停止指令
pub const SPEEDL_STOP: &str = "speedl([0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1.4, 0.0)\n";

// ============================================================================
// 速度限幅
// ============================================================================

/// 关节速度限幅
///
/// 保留符号：幅值小于 `min` 的提升到 `min`，大于 `max` 的截断到 `max`。
/// 非正输入走负分支，因此 `0.0` 会变为 `-min`。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VelocityLimits {
    /// 幅值下限（rad/s）
    pub min: f64,
    /// 幅值上限（rad/s）
    pub max: f64,
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self {
            min: MIN_JOINT_VELOCITY,
            max: MAX_JOINT_VELOCITY,
        }
    }
}

impl VelocityLimits {
    /// 对单个分量限幅
    pub fn clamp(&self, v: f64) -> f64 {
        if v > 0.0 {
            v.clamp(self.min, self.max)
        } else {
            v.clamp(-self.max, -self.min)
        }
    }

    /// 对 6 个分量逐一限幅
    pub fn clamp_all(&self, v: [f64; 6]) -> [f64; 6] {
        v.map(|x| self.clamp(x))
    }
}

// ============================================================================
// 指令
// ============================================================================

/// 速度指令类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VelocitySpace {
    /// 关节空间（`speedj`）
    Joint,
    /// 笛卡尔空间（`speedl`）
    Cartesian,
}

impl VelocitySpace {
    /// 对应的停止指令
    pub fn stop_command(self) -> ScriptCommand {
        match self {
            VelocitySpace::Joint => ScriptCommand::SpeedJStop,
            VelocitySpace::Cartesian => ScriptCommand::SpeedLStop,
        }
    }
}

/// URScript 指令
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScriptCommand {
    /// `speedj(qd, a, t)`：关节速度
    SpeedJ {
        velocities: [f64; 6],
        acceleration: f64,
    },
    /// `speedl(xd, a, t)`：工具速度 [vx, vy, vz, wx, wy, wz]
    SpeedL {
        velocities: [f64; 6],
        acceleration: f64,
    },
    /// 关节速度归零
    SpeedJStop,
    /// 工具速度归零
    SpeedLStop,
    /// `movej(q, a, v)`：关节空间点到点
    MoveJ {
        positions: [f64; 6],
        acceleration: f64,
        velocity: f64,
    },
    /// `movel(pose, a, v)`：工具空间直线运动
    MoveL {
        pose: CartesianPose,
        acceleration: f64,
        velocity: f64,
    },
    /// `stopj(a)`：关节减速停止
    StopJ { deceleration: f64 },
    /// `freedrive_mode()`：需每周期刷新
    FreeDriveMode,
    /// `powerdown()`：断开电机电源
    PowerDown,
}

impl ScriptCommand {
    /// 关节速度指令（调用方负责限幅）
    pub fn speedj(velocities: [f64; 6]) -> Self {
        ScriptCommand::SpeedJ {
            velocities,
            acceleration: SPEED_ACCELERATION,
        }
    }

    /// 笛卡尔速度指令
    pub fn speedl(linear: [f64; 3], angular: [f64; 3]) -> Self {
        let [vx, vy, vz] = linear;
        let [wx, wy, wz] = angular;
        ScriptCommand::SpeedL {
            velocities: [vx, vy, vz, wx, wy, wz],
            acceleration: SPEED_ACCELERATION,
        }
    }

    /// 关节位置指令
    pub fn movej(positions: [f64; 6]) -> Self {
        ScriptCommand::MoveJ {
            positions,
            acceleration: MOVEJ_ACCELERATION,
            velocity: MOVEJ_VELOCITY,
        }
    }

    /// 笛卡尔位置指令
    pub fn movel(pose: CartesianPose) -> Self {
        ScriptCommand::MoveL {
            pose,
            acceleration: MOVEL_ACCELERATION,
            velocity: MOVEL_VELOCITY,
        }
    }

    /// 默认减速度的停止指令
    pub fn stopj() -> Self {
        ScriptCommand::StopJ {
            deceleration: STOPJ_DECELERATION,
        }
    }

    /// 渲染为发送到控制器的文本
    pub fn to_script(&self) -> String {
        self.to_string()
    }
}

/// 写入 `[v0, v1, ..., v5]`
fn write_six(f: &mut fmt::Formatter<'_>, v: &[f64; 6]) -> fmt::Result {
    write!(
        f,
        "[{:6.4}, {:6.4}, {:6.4}, {:6.4}, {:6.4}, {:6.4}]",
        v[0], v[1], v[2], v[3], v[4], v[5]
    )
}

impl fmt::Display for ScriptCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptCommand::SpeedJ {
                velocities,
                acceleration,
            } => {
                f.write_str("speedj(")?;
                write_six(f, velocities)?;
                writeln!(f, ", {acceleration:6.4}, 0.0)")
            },
            ScriptCommand::SpeedL {
                velocities,
                acceleration,
            } => {
                f.write_str("speedl(")?;
                write_six(f, velocities)?;
                writeln!(f, ", {acceleration:6.4}, 0.0)")
            },
            ScriptCommand::SpeedJStop => f.write_str(SPEEDJ_STOP),
            ScriptCommand::SpeedLStop => f.write_str(SPEEDL_STOP),
            ScriptCommand::MoveJ {
                positions,
                acceleration,
                velocity,
            } => {
                f.write_str("movej(")?;
                write_six(f, positions)?;
                writeln!(f, ", a={acceleration:6.4}, v={velocity:6.4})")
            },
            ScriptCommand::MoveL {
                pose,
                acceleration,
                velocity,
            } => {
                f.write_str("movel(p")?;
                write_six(f, &pose.to_tool_vector())?;
                writeln!(f, ", a={acceleration:6.4}, v={velocity:6.4})")
            },
            ScriptCommand::StopJ { deceleration } => writeln!(f, "stopj({deceleration})"),
            ScriptCommand::FreeDriveMode => f.write_str("freedrive_mode()\n"),
            ScriptCommand::PowerDown => f.write_str("powerdown()\n"),
        }
    }
}
