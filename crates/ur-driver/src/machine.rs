//! 运动状态机
//!
//! 状态为带数据的枚举：速度运动的待发指令存放在 `VelocityMoving`
//! 变体内部，离开该状态即随之消失。
//!
//! 转换函数 [`MotionStateMachine::on_request`] / [`MotionStateMachine::on_cycle`]
//! 不修改状态，只返回 [`Transition`]；驱动发送其中的指令后调用
//! [`MotionStateMachine::commit`]，由发送结果决定是否采用新状态。

use crate::mode::OperatingMode;
use crate::state::joint_velocity_norm;
use ur_protocol::{CartesianPose, ScriptCommand, VelocityLimits, VelocitySpace};

/// 速度指令超时周期数（约 0.8s）
pub const DEFAULT_VELOCITY_TIMEOUT_CYCLES: u32 = 100;

/// 运动请求
#[derive(Debug, Clone, PartialEq)]
pub enum MotionRequest {
    /// 关节速度（rad/s），逐分量限幅
    JointVelocity([f64; 6]),
    /// 关节目标位置（弧度）
    JointPosition([f64; 6]),
    /// 工具速度：线速度（m/s）+ 角速度（rad/s），不限幅
    CartesianVelocity { linear: [f64; 3], angular: [f64; 3] },
    /// 工具目标位姿
    CartesianPosition(CartesianPose),
    /// 进入示教（自由拖动）
    FreeDrive,
    /// 退出示教
    RunningMode,
    /// 关节减速停止
    Stop,
    /// 断开电机电源
    DisableMotorPower,
}

impl MotionRequest {
    /// 日志与事件用名称
    pub fn name(&self) -> &'static str {
        match self {
            MotionRequest::JointVelocity(_) => "JointVelocity",
            MotionRequest::JointPosition(_) => "JointPosition",
            MotionRequest::CartesianVelocity { .. } => "CartesianVelocity",
            MotionRequest::CartesianPosition(_) => "CartesianPosition",
            MotionRequest::FreeDrive => "FreeDrive",
            MotionRequest::RunningMode => "RunningMode",
            MotionRequest::Stop => "Stop",
            MotionRequest::DisableMotorPower => "DisableMotorPower",
        }
    }
}

/// 待发送的速度指令
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVelocity {
    pub space: VelocitySpace,
    /// 实际下发的 6 个分量（关节速度已限幅）
    pub velocities: [f64; 6],
    pub command: ScriptCommand,
    pub stop: ScriptCommand,
    /// 剩余周期数，归零时发送停止指令
    pub remaining_cycles: u32,
}

impl PendingVelocity {
    fn new(command: ScriptCommand, space: VelocitySpace, velocities: [f64; 6], cycles: u32) -> Self {
        Self {
            space,
            velocities,
            command,
            stop: space.stop_command(),
            remaining_cycles: cycles,
        }
    }

    /// 指令文本
    pub fn command_text(&self) -> String {
        self.command.to_script()
    }

    /// 停止指令文本
    pub fn stop_text(&self) -> String {
        self.stop.to_script()
    }
}

/// 运动状态
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MotionState {
    #[default]
    Disconnected,
    Idle,
    VelocityMoving(PendingVelocity),
    PositionMoving,
    FreeDrive,
    PoweringOn,
    PoweringOff,
}

impl MotionState {
    /// 对外可见的模式标签
    pub fn mode(&self) -> OperatingMode {
        match self {
            MotionState::Disconnected => OperatingMode::Disconnected,
            MotionState::Idle => OperatingMode::Idle,
            MotionState::VelocityMoving(_) => OperatingMode::VelocityMoving,
            MotionState::PositionMoving => OperatingMode::PositionMoving,
            MotionState::FreeDrive => OperatingMode::FreeDrive,
            MotionState::PoweringOn => OperatingMode::PoweringOn,
            MotionState::PoweringOff => OperatingMode::PoweringOff,
        }
    }

    /// 速度运动中的待发指令
    pub fn pending_velocity(&self) -> Option<&PendingVelocity> {
        match self {
            MotionState::VelocityMoving(pending) => Some(pending),
            _ => None,
        }
    }
}

/// 转换附带的信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSignal {
    /// 当前模式不接受该请求
    RobotNotReady {
        request: &'static str,
        mode: OperatingMode,
    },
}

/// 一次状态转换
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// 候选的下一状态
    pub next: MotionState,
    /// 需要发送的指令
    pub command: Option<ScriptCommand>,
    pub signal: Option<MotionSignal>,
    /// 为真时仅在指令发送成功后才采用 `next`
    pub requires_delivery: bool,
}

impl Transition {
    fn stay(state: &MotionState) -> Self {
        Self::to(state.clone())
    }

    fn to(next: MotionState) -> Self {
        Self {
            next,
            command: None,
            signal: None,
            requires_delivery: false,
        }
    }

    fn reject(state: &MotionState, request: &MotionRequest) -> Self {
        Self {
            signal: Some(MotionSignal::RobotNotReady {
                request: request.name(),
                mode: state.mode(),
            }),
            ..Self::stay(state)
        }
    }

    fn sending(mut self, command: ScriptCommand) -> Self {
        self.command = Some(command);
        self
    }

    fn on_delivery(mut self) -> Self {
        self.requires_delivery = true;
        self
    }

    /// 是否为拒绝
    pub fn is_rejected(&self) -> bool {
        matches!(self.signal, Some(MotionSignal::RobotNotReady { .. }))
    }
}

/// 状态机参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    pub limits: VelocityLimits,
    pub velocity_timeout_cycles: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            limits: VelocityLimits::default(),
            velocity_timeout_cycles: DEFAULT_VELOCITY_TIMEOUT_CYCLES,
        }
    }
}

/// 运动状态机
#[derive(Debug, Clone, Default)]
pub struct MotionStateMachine {
    state: MotionState,
    config: MotionConfig,
}

impl MotionStateMachine {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            state: MotionState::Disconnected,
            config,
        }
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn mode(&self) -> OperatingMode {
        self.state.mode()
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// 连接建立：Disconnected → Idle
    pub fn on_connected(&mut self) {
        if self.state == MotionState::Disconnected {
            self.state = MotionState::Idle;
        }
    }

    /// 连接丢失：任意状态 → Disconnected，待发指令丢弃
    pub fn on_connection_lost(&mut self) {
        self.state = MotionState::Disconnected;
    }

    /// 处理一个请求
    pub fn on_request(&self, request: &MotionRequest) -> Transition {
        let state = &self.state;
        let cycles = self.config.velocity_timeout_cycles;
        match request {
            MotionRequest::JointVelocity(goal) => match state {
                MotionState::Idle | MotionState::VelocityMoving(_) => {
                    let velocities = self.config.limits.clamp_all(*goal);
                    Transition::to(MotionState::VelocityMoving(PendingVelocity::new(
                        ScriptCommand::speedj(velocities),
                        VelocitySpace::Joint,
                        velocities,
                        cycles,
                    )))
                },
                _ => Transition::reject(state, request),
            },
            MotionRequest::CartesianVelocity { linear, angular } => match state {
                MotionState::Idle | MotionState::VelocityMoving(_) => {
                    let command = ScriptCommand::speedl(*linear, *angular);
                    let [vx, vy, vz] = *linear;
                    let [wx, wy, wz] = *angular;
                    Transition::to(MotionState::VelocityMoving(PendingVelocity::new(
                        command,
                        VelocitySpace::Cartesian,
                        [vx, vy, vz, wx, wy, wz],
                        cycles,
                    )))
                },
                _ => Transition::reject(state, request),
            },
            MotionRequest::JointPosition(goal) => match state {
                MotionState::Idle => Transition::to(MotionState::PositionMoving)
                    .sending(ScriptCommand::movej(*goal))
                    .on_delivery(),
                _ => Transition::reject(state, request),
            },
            MotionRequest::CartesianPosition(pose) => match state {
                MotionState::Idle => Transition::to(MotionState::PositionMoving)
                    .sending(ScriptCommand::movel(*pose))
                    .on_delivery(),
                _ => Transition::reject(state, request),
            },
            MotionRequest::FreeDrive => match state {
                MotionState::Idle => Transition::to(MotionState::FreeDrive),
                _ => Transition::reject(state, request),
            },
            MotionRequest::RunningMode => match state {
                MotionState::FreeDrive => Transition::to(MotionState::Idle),
                _ => Transition::reject(state, request),
            },
            MotionRequest::Stop => Transition::stay(state).sending(ScriptCommand::stopj()),
            MotionRequest::DisableMotorPower => {
                Transition::stay(state).sending(ScriptCommand::PowerDown)
            },
        }
    }

    /// 周期推进
    ///
    /// `joint_velocity` 为本周期已发布的关节速度。
    pub fn on_cycle(&self, joint_velocity: &[f64; 6]) -> Transition {
        match &self.state {
            MotionState::VelocityMoving(pending) => {
                let remaining = pending.remaining_cycles.saturating_sub(1);
                if remaining == 0 {
                    Transition::to(MotionState::Idle).sending(pending.stop.clone())
                } else {
                    let mut next = pending.clone();
                    next.remaining_cycles = remaining;
                    let command = next.command.clone();
                    Transition::to(MotionState::VelocityMoving(next)).sending(command)
                }
            },
            MotionState::PositionMoving => {
                if joint_velocity_norm(joint_velocity) == 0.0 {
                    Transition::to(MotionState::Idle)
                } else {
                    Transition::stay(&self.state)
                }
            },
            MotionState::FreeDrive => {
                Transition::stay(&self.state).sending(ScriptCommand::FreeDriveMode)
            },
            MotionState::Disconnected
            | MotionState::Idle
            | MotionState::PoweringOn
            | MotionState::PoweringOff => Transition::stay(&self.state),
        }
    }

    /// 采用转换
    ///
    /// `delivered` 为转换中指令的发送结果（无指令时应传 `true`）。
    /// 返回状态是否被替换。
    pub fn commit(&mut self, transition: Transition, delivered: bool) -> bool {
        if transition.is_rejected() || (transition.requires_delivery && !delivered) {
            return false;
        }
        self.state = transition.next;
        true
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: MotionState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ur_protocol::{MAX_JOINT_VELOCITY, MIN_JOINT_VELOCITY, SPEEDJ_STOP, SPEEDL_STOP};

    fn idle() -> MotionStateMachine {
        let mut m = MotionStateMachine::default();
        m.on_connected();
        m
    }

    fn apply(m: &mut MotionStateMachine, t: Transition) -> Option<String> {
        let text = t.command.as_ref().map(ScriptCommand::to_script);
        m.commit(t, true);
        text
    }

    #[test]
    fn test_connect_and_lose() {
        let mut m = MotionStateMachine::default();
        assert_eq!(m.mode(), OperatingMode::Disconnected);
        m.on_connected();
        assert_eq!(m.mode(), OperatingMode::Idle);
        // 已连接时再次调用不改变状态
        m.force_state(MotionState::FreeDrive);
        m.on_connected();
        assert_eq!(m.mode(), OperatingMode::FreeDrive);
        m.on_connection_lost();
        assert_eq!(m.state(), &MotionState::Disconnected);
    }

    #[test]
    fn test_joint_velocity_from_idle() {
        let mut m = idle();
        let t = m.on_request(&MotionRequest::JointVelocity([0.1, -0.1, 1.0, -1.0, 0.0, 1e-9]));
        assert!(t.command.is_none());
        assert!(m.commit(t, true));

        let pending = m.state().pending_velocity().unwrap();
        assert_eq!(pending.remaining_cycles, DEFAULT_VELOCITY_TIMEOUT_CYCLES);
        assert_eq!(pending.space, VelocitySpace::Joint);
        assert_eq!(
            pending.velocities,
            [
                0.1,
                -0.1,
                MAX_JOINT_VELOCITY,
                -MAX_JOINT_VELOCITY,
                -MIN_JOINT_VELOCITY,
                MIN_JOINT_VELOCITY
            ]
        );
        assert_eq!(pending.stop_text(), SPEEDJ_STOP);
        assert!(pending.command_text().starts_with("speedj([0.1000, -0.1000, 0.2094"));
    }

    #[test]
    fn test_velocity_rejected_while_position_moving() {
        let mut m = idle();
        m.force_state(MotionState::PositionMoving);
        let t = m.on_request(&MotionRequest::JointVelocity([0.1; 6]));
        assert_eq!(
            t.signal,
            Some(MotionSignal::RobotNotReady {
                request: "JointVelocity",
                mode: OperatingMode::PositionMoving
            })
        );
        assert!(!m.commit(t, true));
        assert_eq!(m.mode(), OperatingMode::PositionMoving);
    }

    #[test]
    fn test_new_velocity_replaces_pending() {
        let mut m = idle();
        let t = m.on_request(&MotionRequest::JointVelocity([0.1; 6]));
        m.commit(t, true);
        for _ in 0..10 {
            let t = m.on_cycle(&[0.0; 6]);
            apply(&mut m, t);
        }
        assert_eq!(m.state().pending_velocity().unwrap().remaining_cycles, 90);

        let t = m.on_request(&MotionRequest::CartesianVelocity {
            linear: [0.01, 0.0, 0.0],
            angular: [0.0; 3],
        });
        m.commit(t, true);
        let pending = m.state().pending_velocity().unwrap();
        assert_eq!(pending.remaining_cycles, DEFAULT_VELOCITY_TIMEOUT_CYCLES);
        assert_eq!(pending.space, VelocitySpace::Cartesian);
        assert_eq!(pending.stop_text(), SPEEDL_STOP);
    }

    #[test]
    fn test_velocity_timeout_sends_stop() {
        let mut m = idle();
        let t = m.on_request(&MotionRequest::JointVelocity([0.1; 6]));
        m.commit(t, true);

        let command = m.state().pending_velocity().unwrap().command_text();
        for cycle in 1..DEFAULT_VELOCITY_TIMEOUT_CYCLES {
            let t = m.on_cycle(&[0.0; 6]);
            assert_eq!(apply(&mut m, t).as_deref(), Some(command.as_str()), "cycle {cycle}");
            assert_eq!(m.mode(), OperatingMode::VelocityMoving);
        }
        let t = m.on_cycle(&[0.0; 6]);
        assert_eq!(apply(&mut m, t).as_deref(), Some(SPEEDJ_STOP));
        assert_eq!(m.mode(), OperatingMode::Idle);
    }

    #[test]
    fn test_position_requests() {
        let mut m = idle();
        let t = m.on_request(&MotionRequest::JointPosition([0.0; 6]));
        assert!(t.requires_delivery);
        assert!(matches!(t.command, Some(ScriptCommand::MoveJ { .. })));

        // 发送失败：保持 Idle
        assert!(!m.commit(t.clone(), false));
        assert_eq!(m.mode(), OperatingMode::Idle);

        assert!(m.commit(t, true));
        assert_eq!(m.mode(), OperatingMode::PositionMoving);

        // 运动中再次请求被拒绝
        let t = m.on_request(&MotionRequest::CartesianPosition(CartesianPose::default()));
        assert!(t.is_rejected());

        // 关节仍在运动
        let t = m.on_cycle(&[0.0, 0.1, 0.0, 0.0, 0.0, 0.0]);
        m.commit(t, true);
        assert_eq!(m.mode(), OperatingMode::PositionMoving);

        let t = m.on_cycle(&[0.0; 6]);
        assert!(t.command.is_none());
        m.commit(t, true);
        assert_eq!(m.mode(), OperatingMode::Idle);
    }

    #[test]
    fn test_cartesian_position_from_idle() {
        let m = idle();
        let pose = CartesianPose::new([0.4, 0.0, 0.3], [0.0, 3.1416, 0.0]);
        let t = m.on_request(&MotionRequest::CartesianPosition(pose));
        assert_eq!(t.command, Some(ScriptCommand::movel(pose)));
        assert_eq!(t.next, MotionState::PositionMoving);
    }

    #[test]
    fn test_free_drive_cycle() {
        let mut m = idle();
        assert!(m.on_request(&MotionRequest::RunningMode).is_rejected());

        let t = m.on_request(&MotionRequest::FreeDrive);
        m.commit(t, true);
        assert_eq!(m.mode(), OperatingMode::FreeDrive);

        for _ in 0..3 {
            let t = m.on_cycle(&[0.0; 6]);
            assert_eq!(apply(&mut m, t).as_deref(), Some("freedrive_mode()\n"));
        }
        assert!(m.on_request(&MotionRequest::FreeDrive).is_rejected());
        assert!(m.on_request(&MotionRequest::JointVelocity([0.1; 6])).is_rejected());

        let t = m.on_request(&MotionRequest::RunningMode);
        m.commit(t, true);
        assert_eq!(m.mode(), OperatingMode::Idle);
    }

    #[test]
    fn test_stop_and_power_down_from_any_state() {
        for state in [
            MotionState::Disconnected,
            MotionState::Idle,
            MotionState::PositionMoving,
            MotionState::FreeDrive,
            MotionState::PoweringOn,
        ] {
            let mut m = MotionStateMachine::default();
            m.force_state(state.clone());

            let t = m.on_request(&MotionRequest::Stop);
            assert_eq!(apply(&mut m, t).as_deref(), Some("stopj(1.4)\n"));
            assert_eq!(m.state(), &state);

            let t = m.on_request(&MotionRequest::DisableMotorPower);
            assert_eq!(apply(&mut m, t).as_deref(), Some("powerdown()\n"));
            assert_eq!(m.state(), &state);
        }
    }

    #[test]
    fn test_reserved_states_are_inert() {
        for state in [MotionState::PoweringOn, MotionState::PoweringOff] {
            let mut m = MotionStateMachine::default();
            m.force_state(state.clone());
            let t = m.on_cycle(&[0.0; 6]);
            assert!(t.command.is_none());
            m.commit(t, true);
            assert_eq!(m.state(), &state);
            assert!(m.on_request(&MotionRequest::FreeDrive).is_rejected());
        }
    }

    #[test]
    fn test_disconnected_rejects_motion() {
        let m = MotionStateMachine::default();
        for request in [
            MotionRequest::JointVelocity([0.1; 6]),
            MotionRequest::JointPosition([0.0; 6]),
            MotionRequest::FreeDrive,
            MotionRequest::RunningMode,
        ] {
            let t = m.on_request(&request);
            assert!(t.is_rejected(), "{}", request.name());
            assert!(t.command.is_none());
        }
    }
}
