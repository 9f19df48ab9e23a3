//! 跨线程驱动句柄

use crate::error::DriverError;
use crate::event::DriverEvent;
use crate::machine::MotionRequest;
use crate::metrics::MetricsSnapshot;
use crate::mode::OperatingMode;
use crate::state::{DriverContext, RobotState};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use nalgebra::Isometry3;
use std::sync::Arc;
use std::time::{Duration, Instant};
use ur_protocol::{CartesianPose, ProtocolVersion};

/// 驱动句柄
///
/// 可克隆，可在任意线程使用。请求进入有界队列，由驱动在下一个周期
/// 发布状态后按顺序处理；状态读取无锁。
#[derive(Debug, Clone)]
pub struct DriverHandle {
    ctx: Arc<DriverContext>,
    requests: Sender<MotionRequest>,
    events: Receiver<DriverEvent>,
    queue_capacity: usize,
}

impl DriverHandle {
    pub(crate) fn new(
        ctx: Arc<DriverContext>,
        requests: Sender<MotionRequest>,
        events: Receiver<DriverEvent>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            ctx,
            requests,
            events,
            queue_capacity,
        }
    }

    /// 提交请求
    ///
    /// # Errors
    /// - `DriverError::ChannelFull`: 队列已满
    /// - `DriverError::ChannelClosed`: 驱动已释放
    pub fn request(&self, request: MotionRequest) -> Result<(), DriverError> {
        self.requests.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ChannelFull(self.queue_capacity),
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 关节速度运动（rad/s）
    pub fn joint_velocity_move(&self, velocities: [f64; 6]) -> Result<(), DriverError> {
        self.request(MotionRequest::JointVelocity(velocities))
    }

    /// 关节位置运动（弧度）
    pub fn joint_position_move(&self, positions: [f64; 6]) -> Result<(), DriverError> {
        self.request(MotionRequest::JointPosition(positions))
    }

    /// 工具速度运动
    pub fn cartesian_velocity_move(
        &self,
        linear: [f64; 3],
        angular: [f64; 3],
    ) -> Result<(), DriverError> {
        self.request(MotionRequest::CartesianVelocity { linear, angular })
    }

    /// 工具位置运动
    pub fn cartesian_position_move(&self, pose: CartesianPose) -> Result<(), DriverError> {
        self.request(MotionRequest::CartesianPosition(pose))
    }

    /// 以刚体变换表示的工具位置运动
    pub fn cartesian_frame_move(&self, frame: &Isometry3<f64>) -> Result<(), DriverError> {
        self.cartesian_position_move(CartesianPose::from_isometry(frame))
    }

    pub fn free_drive(&self) -> Result<(), DriverError> {
        self.request(MotionRequest::FreeDrive)
    }

    pub fn running_mode(&self) -> Result<(), DriverError> {
        self.request(MotionRequest::RunningMode)
    }

    pub fn stop(&self) -> Result<(), DriverError> {
        self.request(MotionRequest::Stop)
    }

    pub fn disable_motor_power(&self) -> Result<(), DriverError> {
        self.request(MotionRequest::DisableMotorPower)
    }

    /// 最近发布的状态快照
    pub fn state(&self) -> Arc<RobotState> {
        self.ctx.state.load_full()
    }

    pub fn joint_position(&self) -> [f64; 6] {
        self.ctx.state.load().joint_position
    }

    pub fn tool_frame(&self) -> Isometry3<f64> {
        self.ctx.state.load().tool_frame
    }

    pub fn mode(&self) -> OperatingMode {
        self.ctx.mode.get()
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    /// 活动协议版本
    pub fn version(&self) -> ProtocolVersion {
        self.ctx.state.load().diagnostics.active_version
    }

    /// 平均周期
    pub fn average_period(&self) -> Duration {
        self.ctx.metrics.average_period()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 事件接收端
    pub fn events(&self) -> Receiver<DriverEvent> {
        self.events.clone()
    }

    /// 等待至少一帧被应用到状态
    ///
    /// # Errors
    /// - `DriverError::NotConnected`: 超时内没有新帧，且驱动处于断开状态
    /// - `DriverError::Net(NetError::Timeout)`: 已连接但超时内没有新帧
    pub fn wait_for_feedback(&self, timeout: Duration) -> Result<Arc<RobotState>, DriverError> {
        let start = Instant::now();
        let baseline = self.ctx.state.load().frames_applied;
        loop {
            let state = self.state();
            if state.frames_applied > baseline {
                return Ok(state);
            }
            if start.elapsed() >= timeout {
                if !self.ctx.is_connected() {
                    return Err(DriverError::NotConnected);
                }
                return Err(ur_net::NetError::Timeout.into());
            }
            spin_sleep::sleep(Duration::from_millis(1));
        }
    }

    /// 带超时等待下一个事件（`Duration::ZERO` 时不等待）
    pub fn next_event(&self, timeout: Duration) -> Option<DriverEvent> {
        if timeout.is_zero() {
            return self.events.try_recv().ok();
        }
        self.events.recv_timeout(timeout).ok()
    }
}
