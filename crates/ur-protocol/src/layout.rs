//! 帧字段偏移表
//!
//! 所有版本共享开头的关节数据块；之后 3.x 之前与 3.x 的布局不同。
//! 每个数组字段由连续的 `f64` 组成，偏移均为相对帧首的字节偏移。
//!
//! ```text
//! 0     4    12         60          ...  252        300         348
//! | len | t  | q_target | qd_target | ... | q_actual | qd_actual | I_actual | <版本相关>
//! ```

use crate::catalog::ProtocolVersion;

// ============================================================================
// 公共数据块（所有版本）
// ============================================================================

/// 控制器时间戳（秒）
pub const OFFSET_TIME: usize = 4;
/// 关节目标位置
pub const OFFSET_Q_TARGET: usize = 12;
/// 关节目标速度
pub const OFFSET_QD_TARGET: usize = 60;
/// 关节目标加速度
pub const OFFSET_QDD_TARGET: usize = 108;
/// 关节目标电流
pub const OFFSET_I_TARGET: usize = 156;
/// 关节目标力矩
pub const OFFSET_M_TARGET: usize = 204;
/// 关节实际位置
pub const OFFSET_Q_ACTUAL: usize = 252;
/// 关节实际速度
pub const OFFSET_QD_ACTUAL: usize = 300;
/// 关节实际电流
pub const OFFSET_I_ACTUAL: usize = 348;

/// 版本相关字段的偏移表
///
/// `None` 表示该布局不包含此字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// 末端位姿向量 [x, y, z, rx, ry, rz]
    ///
    /// 3.x 之前文档未说明是实际值还是目标值；3.x 起为实际值。
    pub tool_vector: usize,
    /// 末端目标位姿向量（仅 3.x）
    pub tool_vector_target: Option<usize>,
    /// 末端速度
    pub tcp_speed: usize,
    /// 末端目标速度（仅 3.x）
    pub tcp_speed_target: Option<usize>,
    /// 末端力/力矩
    pub tcp_force: usize,
    /// 电机温度
    pub motor_temperatures: usize,
    /// 控制器实时线程执行时间
    pub controller_timer: usize,
    /// 机器人模式
    pub robot_mode: usize,
    /// 安全模式（仅 3.x）
    pub safety_mode: Option<usize>,
    /// 速度缩放比例（仅 3.x）
    pub speed_scaling: Option<usize>,
    /// 程序状态（仅 3.2+）
    pub program_state: Option<usize>,
}

/// 3.x 之前的布局（V1, V2）
pub const LAYOUT_PRE_V3: FrameLayout = FrameLayout {
    tool_vector: 588,
    tool_vector_target: None,
    tcp_speed: 636,
    tcp_speed_target: None,
    tcp_force: 540,
    motor_temperatures: 692,
    controller_timer: 740,
    robot_mode: 756,
    safety_mode: None,
    speed_scaling: None,
    program_state: None,
};

/// 3.0 / 3.1 布局（V3）
pub const LAYOUT_V3: FrameLayout = FrameLayout {
    tool_vector: 444,
    tool_vector_target: Some(588),
    tcp_speed: 492,
    tcp_speed_target: Some(636),
    tcp_force: 540,
    motor_temperatures: 692,
    controller_timer: 740,
    robot_mode: 756,
    safety_mode: Some(812),
    speed_scaling: Some(940),
    program_state: None,
};

/// 3.2+ 布局（V4），在 V3 末尾追加数字输出与程序状态
pub const LAYOUT_V4: FrameLayout = FrameLayout {
    program_state: Some(1052),
    ..LAYOUT_V3
};

impl FrameLayout {
    /// 按版本选择布局
    pub fn for_version(version: ProtocolVersion) -> Option<&'static FrameLayout> {
        match version {
            ProtocolVersion::Unknown => None,
            ProtocolVersion::V1 | ProtocolVersion::V2 => Some(&LAYOUT_PRE_V3),
            ProtocolVersion::V3 => Some(&LAYOUT_V3),
            ProtocolVersion::V4 => Some(&LAYOUT_V4),
        }
    }

    /// 解析必需字段所需的最小帧长度
    pub fn min_len(&self) -> usize {
        let last = [
            self.tool_vector + 6 * 8,
            self.tcp_speed + 6 * 8,
            self.tcp_force + 6 * 8,
            self.motor_temperatures + 6 * 8,
            self.controller_timer + 8,
        ];
        last.into_iter().max().unwrap_or(0)
    }
}
