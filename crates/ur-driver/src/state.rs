//! 驱动状态结构定义
//!
//! 每个周期解析完成后，整份 [`RobotState`] 作为不可变快照发布到
//! `ArcSwap`，读取方无锁获取，永远看不到半更新的状态。

use crate::metrics::DriverMetrics;
use crate::mode::AtomicOperatingMode;
use arc_swap::ArcSwap;
use nalgebra::Isometry3;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use ur_protocol::{
    CartesianPose, ProtocolVersion, RobotMode, RtFeedback, SafetyMode, VERSION_COUNT,
};

/// 诊断数据
///
/// 对应控制器侧调试向量：时间差、执行时间、长短帧计数与最近长度、版本证据。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// 最近一次测得的控制器时间差（毫秒）
    pub time_delta_ms: f64,
    /// 控制器实时线程执行时间
    pub exec_time: f64,
    /// 短于当前版本目录长度的帧数
    pub short_frames: u64,
    /// 最近一次短帧的长度
    pub last_short_len: usize,
    /// 长于当前版本目录长度的帧数
    pub long_frames: u64,
    /// 最近一次长帧的长度
    pub last_long_len: usize,
    /// 版本识别器当前采用的版本（帧被保持或解析失败时也会更新）
    pub active_version: ProtocolVersion,
    /// 各版本证据计数（按 `ProtocolVersion::index()` 排列，0 为 Unknown）
    pub version_evidence: [u64; VERSION_COUNT],
    /// 时间合理性检查未通过的帧数
    pub held_frames: u64,
}

/// 机器人状态快照
///
/// 更新频率：约 125Hz（每帧一次）
/// 同步机制：整份替换（ArcSwap）
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    /// 解析所用的协议版本
    pub version: ProtocolVersion,
    /// 控制器时间戳（秒）
    pub controller_time: f64,
    /// 关节实际位置（弧度）
    pub joint_position: [f64; 6],
    /// 关节实际速度（rad/s）
    pub joint_velocity: [f64; 6],
    /// 关节目标位置（弧度）
    pub joint_target_position: [f64; 6],
    /// 关节目标速度（rad/s）
    pub joint_target_velocity: [f64; 6],
    /// 关节实际电流（A）
    pub joint_current: [f64; 6],
    /// 末端位姿（位置 + 旋转向量）
    pub tool_pose: CartesianPose,
    /// 末端位姿对应的刚体变换
    pub tool_frame: Isometry3<f64>,
    /// 末端目标位姿（仅 3.x）
    pub tool_pose_target: Option<CartesianPose>,
    /// 末端速度
    pub tcp_speed: [f64; 6],
    /// 末端目标速度（仅 3.x）
    pub tcp_speed_target: Option<[f64; 6]>,
    /// 末端力/力矩
    pub tcp_force: [f64; 6],
    /// 电机温度（°C）
    pub motor_temperatures: [f64; 6],
    pub robot_mode: Option<RobotMode>,
    pub safety_mode: Option<SafetyMode>,
    pub speed_scaling: Option<f64>,
    /// 已应用到本快照的帧数
    pub frames_applied: u64,
    pub diagnostics: Diagnostics,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::Unknown,
            controller_time: 0.0,
            joint_position: [0.0; 6],
            joint_velocity: [0.0; 6],
            joint_target_position: [0.0; 6],
            joint_target_velocity: [0.0; 6],
            joint_current: [0.0; 6],
            tool_pose: CartesianPose::default(),
            tool_frame: Isometry3::identity(),
            tool_pose_target: None,
            tcp_speed: [0.0; 6],
            tcp_speed_target: None,
            tcp_force: [0.0; 6],
            motor_temperatures: [0.0; 6],
            robot_mode: None,
            safety_mode: None,
            speed_scaling: None,
            frames_applied: 0,
            diagnostics: Diagnostics::default(),
        }
    }
}

impl RobotState {
    /// 用一帧反馈覆盖关节与末端数据
    pub fn apply_feedback(&mut self, fb: &RtFeedback) {
        self.version = fb.version;
        self.controller_time = fb.time;
        self.joint_position = fb.joint_position;
        self.joint_velocity = fb.joint_velocity;
        self.joint_target_position = fb.joint_target_position;
        self.joint_target_velocity = fb.joint_target_velocity;
        self.joint_current = fb.joint_current;
        self.tool_pose = fb.tool_pose;
        self.tool_frame = fb.tool_pose.to_isometry();
        self.tool_pose_target = fb.tool_pose_target;
        self.tcp_speed = fb.tcp_speed;
        self.tcp_speed_target = fb.tcp_speed_target;
        self.tcp_force = fb.tcp_force;
        self.motor_temperatures = fb.motor_temperatures;
        self.robot_mode = fb.robot_mode;
        self.safety_mode = fb.safety_mode;
        self.speed_scaling = fb.speed_scaling;
        self.diagnostics.exec_time = fb.controller_exec_time;
        self.frames_applied += 1;
    }

    /// 关节速度的欧氏范数
    pub fn joint_velocity_norm(&self) -> f64 {
        joint_velocity_norm(&self.joint_velocity)
    }

    /// 某版本的证据计数
    pub fn evidence(&self, version: ProtocolVersion) -> u64 {
        self.diagnostics.version_evidence[version.index()]
    }
}

pub(crate) fn joint_velocity_norm(qd: &[f64; 6]) -> f64 {
    qd.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// 驱动与句柄之间共享的上下文
#[derive(Debug)]
pub struct DriverContext {
    /// 最新完成周期的状态快照
    pub state: ArcSwap<RobotState>,
    /// 运行模式
    pub mode: AtomicOperatingMode,
    /// 连接标志
    pub connected: AtomicBool,
    /// 计数器
    pub metrics: DriverMetrics,
}

impl DriverContext {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RobotState::default()),
            mode: AtomicOperatingMode::default(),
            connected: AtomicBool::new(false),
            metrics: DriverMetrics::new(),
        }
    }

    /// 整份发布新快照
    pub fn publish(&self, state: RobotState) {
        self.state.store(Arc::new(state));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl Default for DriverContext {
    fn default() -> Self {
        Self::new()
    }
}
