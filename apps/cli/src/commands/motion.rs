//! 运动命令
//!
//! 速度指令在最后一次请求约 0.8s 后由驱动自动归零，命令执行期间周期性重发。

use crate::session::{Completion, ConnectArgs, RunEnd, Session};
use crate::validation::{parse_joints, parse_pose, parse_values, validate_duration};
use anyhow::Result;
use clap::Args;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use ur_sdk::prelude::*;

/// 速度指令重发周期
const REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// 状态轮询周期
const POLL_PERIOD: Duration = Duration::from_millis(8);

/// 等待速度指令自动归零的最长时间
const VELOCITY_DRAIN: Duration = Duration::from_millis(1500);

/// 发送位置指令后，到判断“已停止”之前的等待
const SETTLE_GRACE: Duration = Duration::from_millis(200);

/// 关节速度命令参数
#[derive(Args, Debug)]
pub struct SpeedJCommand {
    /// 关节速度（rad/s），逗号分隔的 6 个值
    #[arg(short, long)]
    pub velocities: String,

    /// 持续时间（秒）
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl SpeedJCommand {
    pub fn execute(self) -> Result<()> {
        let velocities = parse_values::<6>(&self.velocities, "关节速度")?;
        let duration = validate_duration(self.duration)?;
        run_velocity(
            &self.connect,
            MotionRequest::JointVelocity(velocities),
            duration,
        )
    }
}

/// 工具速度命令参数
#[derive(Args, Debug)]
pub struct SpeedLCommand {
    /// 线速度 vx,vy,vz（m/s）
    #[arg(short, long)]
    pub linear: String,

    /// 角速度 wx,wy,wz（rad/s）
    #[arg(short, long, default_value = "0,0,0")]
    pub angular: String,

    /// 持续时间（秒）
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl SpeedLCommand {
    /// 解析为速度请求
    pub fn request(&self) -> Result<MotionRequest> {
        Ok(MotionRequest::CartesianVelocity {
            linear: parse_values::<3>(&self.linear, "线速度")?,
            angular: parse_values::<3>(&self.angular, "角速度")?,
        })
    }

    pub fn execute(self) -> Result<()> {
        let request = self.request()?;
        let duration = validate_duration(self.duration)?;
        run_velocity(&self.connect, request, duration)
    }
}

/// 发送速度请求并在 `duration` 内保持，结束后等待归零再停止
fn run_velocity(connect: &ConnectArgs, request: MotionRequest, duration: Duration) -> Result<()> {
    let session = Session::open(connect)?;
    println!("▶️ {}，持续 {:.1}s", request.name(), duration.as_secs_f64());

    let result = session
        .submit(request.clone(), Completion::Delivered)
        .and_then(|()| {
            session.repeat(Some(duration), REFRESH_PERIOD, |robot| {
                robot.request(request.clone())?;
                Ok(ControlFlow::Continue(()))
            })
        });
    if !session.wait_for_mode(OperatingMode::Idle, VELOCITY_DRAIN) {
        tracing::warn!("Velocity command did not time out, mode {}", session.robot().mode());
    }
    let stopped = session.submit(MotionRequest::Stop, Completion::Delivered);
    session.close();

    result?;
    stopped?;
    println!("✅ 已停止");
    Ok(())
}

/// 关节位置命令参数
#[derive(Args, Debug)]
pub struct MoveJCommand {
    /// 目标关节位置（弧度），逗号分隔的 6 个值
    #[arg(short, long)]
    pub joints: String,

    /// 等待运动结束的最长时间（秒）
    #[arg(short, long, default_value_t = 30.0)]
    pub timeout: f64,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl MoveJCommand {
    pub fn execute(self) -> Result<()> {
        let joints = parse_joints(&self.joints)?;
        let timeout = validate_duration(self.timeout)?;
        run_position(&self.connect, MotionRequest::JointPosition(joints), timeout)
    }
}

/// 工具位姿命令参数
#[derive(Args, Debug)]
pub struct MoveLCommand {
    /// 目标位姿 x,y,z,rx,ry,rz（米 + 旋转向量）
    #[arg(short, long)]
    pub pose: String,

    /// 等待运动结束的最长时间（秒）
    #[arg(short, long, default_value_t = 30.0)]
    pub timeout: f64,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl MoveLCommand {
    pub fn execute(self) -> Result<()> {
        let pose = parse_pose(&self.pose)?;
        let timeout = validate_duration(self.timeout)?;
        run_position(&self.connect, MotionRequest::CartesianPosition(pose), timeout)
    }
}

/// 发送位置请求并等待关节停止
fn run_position(connect: &ConnectArgs, request: MotionRequest, timeout: Duration) -> Result<()> {
    let session = Session::open(connect)?;
    println!("▶️ {}", request.name());

    let result = session.submit(request, Completion::Delivered).and_then(|()| {
        let sent = Instant::now();
        session.repeat(Some(timeout), POLL_PERIOD, |robot| {
            let settled = sent.elapsed() >= SETTLE_GRACE && robot.mode() == OperatingMode::Idle;
            Ok(if settled {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
    });

    let outcome = match result {
        Ok(RunEnd::Finished) => Ok(()),
        Ok(RunEnd::Interrupted) => session.submit(MotionRequest::Stop, Completion::Delivered),
        Ok(RunEnd::Elapsed) => Err(anyhow::anyhow!("等待运动结束超时")),
        Err(e) => Err(e),
    };
    let position = session.robot().joint_position();
    session.close();

    outcome?;
    println!("✅ 当前关节位置 (rad): {position:.4?}");
    Ok(())
}

/// 示教命令参数
#[derive(Args, Debug)]
pub struct FreeDriveCommand {
    /// 持续时间（秒，默认直到 Ctrl-C）
    #[arg(short, long)]
    pub duration: Option<f64>,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl FreeDriveCommand {
    pub fn execute(self) -> Result<()> {
        let duration = self.duration.map(validate_duration).transpose()?;
        let session = Session::open(&self.connect)?;

        let result = session
            .submit(MotionRequest::FreeDrive, Completion::Delivered)
            .and_then(|()| {
                println!("🖐️ 示教模式已开启，按 Ctrl-C 退出");
                session.repeat(duration, POLL_PERIOD, |_| Ok(ControlFlow::Continue(())))
            });
        let restored = session.submit(
            MotionRequest::RunningMode,
            Completion::Mode(OperatingMode::Idle),
        );
        session.close();

        result?;
        restored?;
        println!("✅ 已退出示教模式");
        Ok(())
    }
}

/// 无参数命令（stop / powerdown）
#[derive(Args, Debug)]
pub struct SimpleCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl SimpleCommand {
    /// 关节减速停止
    pub fn stop(self) -> Result<()> {
        self.send(MotionRequest::Stop, "🛑 已发送停止指令")
    }

    /// 断开电机电源
    pub fn powerdown(self) -> Result<()> {
        self.send(MotionRequest::DisableMotorPower, "🔌 已发送断电指令")
    }

    fn send(self, request: MotionRequest, message: &str) -> Result<()> {
        let session = Session::open(&self.connect)?;
        let result = session.submit(request, Completion::Delivered);
        session.close();
        result?;
        println!("{message}");
        Ok(())
    }
}
