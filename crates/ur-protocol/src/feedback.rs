//! 反馈帧解析
//!
//! 按协议版本选择偏移表，从 [`RtFrame`] 中读取关节、末端和控制器状态。
//! 本模块无状态：时间合理性检查和长度诊断由驱动层负责。

use crate::catalog::ProtocolVersion;
use crate::layout::*;
use crate::pose::CartesianPose;
use crate::{ProtocolError, RtFrame};
use num_enum::TryFromPrimitive;

// ============================================================================
// 枚举类型定义（3.x 布局）
// ============================================================================

/// 机器人模式（3.x）
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i8)]
pub enum RobotMode {
    /// 无控制器
    NoController = -1,
    /// 未连接
    Disconnected = 0,
    /// 等待安全配置确认
    ConfirmSafety = 1,
    /// 启动中
    Booting = 2,
    /// 断电
    PowerOff = 3,
    /// 上电
    PowerOn = 4,
    /// 空闲（抱闸未释放）
    Idle = 5,
    /// 反向驱动
    Backdrive = 6,
    /// 运行中
    Running = 7,
    /// 固件升级中
    UpdatingFirmware = 8,
}

/// 安全模式（3.x）
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SafetyMode {
    /// 正常
    Normal = 1,
    /// 降速
    Reduced = 2,
    /// 保护性停止
    ProtectiveStop = 3,
    /// 恢复模式
    Recovery = 4,
    /// 安全防护停止
    SafeguardStop = 5,
    /// 系统急停
    SystemEmergencyStop = 6,
    /// 机器人急停
    RobotEmergencyStop = 7,
    /// 违规
    Violation = 8,
    /// 故障
    Fault = 9,
}

impl TryFrom<f64> for RobotMode {
    type Error = ProtocolError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let invalid = || ProtocolError::InvalidValue {
            field: "RobotMode".to_string(),
            value,
        };
        if value.fract() != 0.0 || value < i8::MIN as f64 || value > i8::MAX as f64 {
            return Err(invalid());
        }
        RobotMode::try_from_primitive(value as i8).map_err(|_| invalid())
    }
}

impl TryFrom<f64> for SafetyMode {
    type Error = ProtocolError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let invalid = || ProtocolError::InvalidValue {
            field: "SafetyMode".to_string(),
            value,
        };
        if value.fract() != 0.0 || !(0.0..=u8::MAX as f64).contains(&value) {
            return Err(invalid());
        }
        SafetyMode::try_from_primitive(value as u8).map_err(|_| invalid())
    }
}

// ============================================================================
// 反馈数据
// ============================================================================

/// 一帧解析后的反馈数据
///
/// 所有关节量为 6 元数组（基座到腕部 3），单位：弧度、弧度/秒、安培。
/// `Option` 字段仅在对应布局包含该字段时有值。
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtFeedback {
    /// 解析所用的协议版本
    pub version: ProtocolVersion,
    /// 控制器时间戳（秒，自控制器启动）
    pub time: f64,
    /// 关节目标位置
    pub joint_target_position: [f64; 6],
    /// 关节目标速度
    pub joint_target_velocity: [f64; 6],
    /// 关节目标加速度
    pub joint_target_acceleration: [f64; 6],
    /// 关节目标电流
    pub joint_target_current: [f64; 6],
    /// 关节目标力矩
    pub joint_target_moment: [f64; 6],
    /// 关节实际位置
    pub joint_position: [f64; 6],
    /// 关节实际速度
    pub joint_velocity: [f64; 6],
    /// 关节实际电流
    pub joint_current: [f64; 6],
    /// 末端位姿（3.x 之前为文档未明确的 tool vector，3.x 起为实际位姿）
    pub tool_pose: CartesianPose,
    /// 末端目标位姿（仅 3.x）
    pub tool_pose_target: Option<CartesianPose>,
    /// 末端速度 [vx, vy, vz, wx, wy, wz]
    pub tcp_speed: [f64; 6],
    /// 末端目标速度（仅 3.x）
    pub tcp_speed_target: Option<[f64; 6]>,
    /// 末端力/力矩 [fx, fy, fz, tx, ty, tz]
    pub tcp_force: [f64; 6],
    /// 电机温度（°C）
    pub motor_temperatures: [f64; 6],
    /// 控制器实时线程执行时间
    pub controller_exec_time: f64,
    /// 机器人模式原始值
    pub robot_mode_raw: Option<f64>,
    /// 机器人模式（仅 3.x 可解释）
    pub robot_mode: Option<RobotMode>,
    /// 安全模式（仅 3.x）
    pub safety_mode: Option<SafetyMode>,
    /// 速度缩放比例（仅 3.x）
    pub speed_scaling: Option<f64>,
    /// 程序状态原始值（仅 3.2+）
    pub program_state: Option<f64>,
}

/// 按指定版本解析一帧
///
/// 帧长度不必严格等于该版本的目录长度（尽力解析），但必须覆盖布局中的必需字段。
///
/// # Errors
/// - `ProtocolError::UnknownVersion`: 版本为 Unknown
/// - `ProtocolError::InvalidLength`: 帧不足以覆盖必需字段
pub fn decode_feedback(
    frame: &RtFrame,
    version: ProtocolVersion,
) -> Result<RtFeedback, ProtocolError> {
    let layout = FrameLayout::for_version(version).ok_or(ProtocolError::UnknownVersion(version))?;

    let short = || ProtocolError::InvalidLength {
        expected: layout.min_len(),
        actual: frame.len(),
    };
    if frame.len() < layout.min_len() {
        return Err(short());
    }

    let robot_mode_raw = frame.read_f64(layout.robot_mode);
    // 3.x 之前的模式编号与 3.x 不同，只保留原始值
    let robot_mode = if version.is_v3_layout() {
        robot_mode_raw.and_then(|raw| RobotMode::try_from(raw).ok())
    } else {
        None
    };

    Ok(RtFeedback {
        version,
        time: frame.read_f64(OFFSET_TIME).ok_or_else(short)?,
        joint_target_position: frame.read_array(OFFSET_Q_TARGET).ok_or_else(short)?,
        joint_target_velocity: frame.read_array(OFFSET_QD_TARGET).ok_or_else(short)?,
        joint_target_acceleration: frame.read_array(OFFSET_QDD_TARGET).ok_or_else(short)?,
        joint_target_current: frame.read_array(OFFSET_I_TARGET).ok_or_else(short)?,
        joint_target_moment: frame.read_array(OFFSET_M_TARGET).ok_or_else(short)?,
        joint_position: frame.read_array(OFFSET_Q_ACTUAL).ok_or_else(short)?,
        joint_velocity: frame.read_array(OFFSET_QD_ACTUAL).ok_or_else(short)?,
        joint_current: frame.read_array(OFFSET_I_ACTUAL).ok_or_else(short)?,
        tool_pose: CartesianPose::from_tool_vector(
            frame.read_array(layout.tool_vector).ok_or_else(short)?,
        ),
        tool_pose_target: layout
            .tool_vector_target
            .and_then(|offset| frame.read_array(offset))
            .map(CartesianPose::from_tool_vector),
        tcp_speed: frame.read_array(layout.tcp_speed).ok_or_else(short)?,
        tcp_speed_target: layout.tcp_speed_target.and_then(|offset| frame.read_array(offset)),
        tcp_force: frame.read_array(layout.tcp_force).ok_or_else(short)?,
        motor_temperatures: frame.read_array(layout.motor_temperatures).ok_or_else(short)?,
        controller_exec_time: frame.read_f64(layout.controller_timer).ok_or_else(short)?,
        robot_mode_raw,
        robot_mode,
        safety_mode: layout
            .safety_mode
            .and_then(|offset| frame.read_f64(offset))
            .and_then(|raw| SafetyMode::try_from(raw).ok()),
        speed_scaling: layout.speed_scaling.and_then(|offset| frame.read_f64(offset)),
        program_state: layout.program_state.and_then(|offset| frame.read_f64(offset)),
    })
}

/// 测试与回放用的帧构造器
///
/// 生成线上字节序（大端）的完整帧，未写入的字段为 0。
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    bytes: Vec<u8>,
}

impl FrameBuilder {
    /// 创建指定版本目录长度的空帧
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_len(version.expected_len())
    }

    /// 创建指定长度的空帧（头部写入该长度）
    pub fn with_len(len: usize) -> Self {
        let mut bytes = vec![0u8; len.max(crate::HEADER_LEN)];
        bytes[..crate::HEADER_LEN].copy_from_slice(&(len as i32).to_be_bytes());
        Self { bytes }
    }

    /// 写入单个 `f64` 字段（越界时忽略）
    pub fn f64_at(mut self, offset: usize, value: f64) -> Self {
        if let Some(slot) = self.bytes.get_mut(offset..offset + crate::FIELD_LEN) {
            slot.copy_from_slice(&value.to_be_bytes());
        }
        self
    }

    /// 写入连续的 `f64` 数组
    pub fn array_at<const N: usize>(mut self, offset: usize, values: [f64; N]) -> Self {
        for (i, value) in values.into_iter().enumerate() {
            self = self.f64_at(offset + i * crate::FIELD_LEN, value);
        }
        self
    }

    /// 控制器时间戳
    pub fn time(self, seconds: f64) -> Self {
        self.f64_at(OFFSET_TIME, seconds)
    }

    /// 关节实际位置
    pub fn joint_position(self, q: [f64; 6]) -> Self {
        self.array_at(OFFSET_Q_ACTUAL, q)
    }

    /// 关节实际速度
    pub fn joint_velocity(self, qd: [f64; 6]) -> Self {
        self.array_at(OFFSET_QD_ACTUAL, qd)
    }

    /// 完成构造，返回线上字节
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: [f64; 6] = [0.1, -0.2, 0.3, -0.4, 0.5, -0.6];
    const QD: [f64; 6] = [0.01, 0.02, 0.03, 0.04, 0.05, 0.06];

    fn frame(bytes: Vec<u8>) -> RtFrame {
        let mut frame = RtFrame::from_slice(&bytes);
        frame.correct_byte_order();
        frame
    }

    #[test]
    fn test_decode_v2_common_block() {
        let bytes = FrameBuilder::new(ProtocolVersion::V2)
            .time(12.5)
            .joint_position(Q)
            .joint_velocity(QD)
            .array_at(LAYOUT_PRE_V3.tool_vector, [0.4, 0.5, 0.6, 0.0, 0.0, 0.1])
            .f64_at(LAYOUT_PRE_V3.controller_timer, 0.0021)
            .build();
        assert_eq!(bytes.len(), 812);

        let fb = decode_feedback(&frame(bytes), ProtocolVersion::V2).unwrap();
        assert_eq!(fb.time, 12.5);
        assert_eq!(fb.joint_position, Q);
        assert_eq!(fb.joint_velocity, QD);
        assert_eq!(fb.tool_pose.position, [0.4, 0.5, 0.6]);
        assert_eq!(fb.tool_pose.rotation_vector, [0.0, 0.0, 0.1]);
        assert_eq!(fb.controller_exec_time, 0.0021);
        assert!(fb.tool_pose_target.is_none());
        assert!(fb.safety_mode.is_none());
        assert!(fb.robot_mode.is_none());
    }

    #[test]
    fn test_decode_v3_uses_actual_tool_vector() {
        let actual = [0.1, 0.2, 0.3, 0.0, 0.0, 0.0];
        let target = [0.7, 0.8, 0.9, 0.0, 0.0, 0.0];
        let bytes = FrameBuilder::new(ProtocolVersion::V3)
            .array_at(LAYOUT_V3.tool_vector, actual)
            .array_at(588, target)
            .f64_at(LAYOUT_V3.robot_mode, 7.0)
            .f64_at(812, 1.0)
            .f64_at(940, 0.5)
            .build();

        let fb = decode_feedback(&frame(bytes), ProtocolVersion::V3).unwrap();
        assert_eq!(fb.tool_pose.to_tool_vector(), actual);
        assert_eq!(fb.tool_pose_target.unwrap().to_tool_vector(), target);
        assert_eq!(fb.robot_mode, Some(RobotMode::Running));
        assert_eq!(fb.safety_mode, Some(SafetyMode::Normal));
        assert_eq!(fb.speed_scaling, Some(0.5));
        assert!(fb.program_state.is_none());
    }

    #[test]
    fn test_same_bytes_differ_by_version() {
        // 同一偏移 588 在 3.x 之前是 tool vector，3.x 起是目标位姿
        let bytes = FrameBuilder::new(ProtocolVersion::V4)
            .array_at(588, [1.0, 1.0, 1.0, 0.0, 0.0, 0.0])
            .build();
        let f = frame(bytes);
        let pre = decode_feedback(&f, ProtocolVersion::V2).unwrap();
        let v4 = decode_feedback(&f, ProtocolVersion::V4).unwrap();
        assert_eq!(pre.tool_pose.position, [1.0, 1.0, 1.0]);
        assert_eq!(v4.tool_pose.position, [0.0, 0.0, 0.0]);
        assert_eq!(v4.program_state, Some(0.0));
    }

    #[test]
    fn test_decode_without_byte_order_correction() {
        let bytes = FrameBuilder::new(ProtocolVersion::V1).joint_position(Q).build();
        let raw = RtFrame::from_slice(&bytes);
        let fb = decode_feedback(&raw, ProtocolVersion::V1).unwrap();
        assert_eq!(fb.joint_position, Q);
    }

    #[test]
    fn test_decode_unknown_version() {
        let bytes = FrameBuilder::new(ProtocolVersion::V1).build();
        let err = decode_feedback(&frame(bytes), ProtocolVersion::Unknown).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownVersion(_)));
    }

    #[test]
    fn test_decode_too_short() {
        let bytes = FrameBuilder::with_len(700).build();
        let err = decode_feedback(&frame(bytes), ProtocolVersion::V2).unwrap_err();
        match err {
            ProtocolError::InvalidLength { expected, actual } => {
                assert_eq!(expected, 748);
                assert_eq!(actual, 700);
            },
            _ => panic!("Expected InvalidLength"),
        }
    }

    #[test]
    fn test_robot_mode_conversion() {
        assert_eq!(RobotMode::try_from(-1.0).unwrap(), RobotMode::NoController);
        assert_eq!(RobotMode::try_from(4.0).unwrap(), RobotMode::PowerOn);
        assert!(RobotMode::try_from(4.5).is_err());
        assert!(RobotMode::try_from(42.0).is_err());
        assert!(SafetyMode::try_from(0.0).is_err());
        assert_eq!(SafetyMode::try_from(3.0).unwrap(), SafetyMode::ProtectiveStop);
    }
}
