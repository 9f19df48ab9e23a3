//! 状态监控命令

use crate::session::{ConnectArgs, Session};
use anyhow::Result;
use clap::Args;
use std::fmt::Write as _;
use std::ops::ControlFlow;
use std::time::Duration;
use ur_sdk::driver::MetricsSnapshot;
use ur_sdk::prelude::*;

/// 控制器推送频率上限（Hz）
const MAX_FREQUENCY: u32 = 125;

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 更新频率（Hz）
    #[arg(short, long, default_value_t = 10)]
    pub frequency: u32,

    /// 输出次数（默认直到 Ctrl-C）
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    #[command(flatten)]
    pub connect: ConnectArgs,
}

impl MonitorCommand {
    /// 刷新周期
    pub fn period(&self) -> Result<Duration> {
        if self.frequency == 0 || self.frequency > MAX_FREQUENCY {
            anyhow::bail!("更新频率须在 1..={MAX_FREQUENCY} Hz，得到 {}", self.frequency);
        }
        Ok(Duration::from_secs(1) / self.frequency)
    }

    pub fn execute(self) -> Result<()> {
        let period = self.period()?;
        let session = Session::open(&self.connect)?;

        let mut printed = 0u64;
        let result = session.repeat(None, period, |robot| {
            while let Some(event) = robot.next_event(Duration::ZERO) {
                println!("📣 {event}");
            }
            print!("{}", format_state(&robot.state(), robot.mode(), &robot.metrics()));
            printed += 1;
            Ok(match self.count {
                Some(n) if printed >= n => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            })
        });

        let metrics = session.robot().metrics();
        session.close();
        result?;
        println!(
            "📊 帧 {}（有效 {:.1}%），无效 {}，超时 {}，指令 {}",
            metrics.frames_received,
            metrics.decode_rate(),
            metrics.invalid_packets,
            metrics.receive_timeouts,
            metrics.commands_sent
        );
        Ok(())
    }
}

/// 格式化一份状态快照
pub fn format_state(state: &RobotState, mode: OperatingMode, metrics: &MetricsSnapshot) -> String {
    let mut out = String::new();
    let q = state.joint_position.map(f64::to_degrees);
    let pose = state.tool_pose.to_tool_vector();
    let _ = writeln!(
        out,
        "[{:>10.3}s] {} | {} | 周期 {:.2} ms",
        state.controller_time,
        mode,
        state.version,
        metrics.average_period.as_secs_f64() * 1000.0
    );
    let _ = writeln!(
        out,
        "  关节 (°): [{:8.3}, {:8.3}, {:8.3}, {:8.3}, {:8.3}, {:8.3}]",
        q[0], q[1], q[2], q[3], q[4], q[5]
    );
    let _ = writeln!(
        out,
        "  末端:     [{:8.4}, {:8.4}, {:8.4}, {:8.4}, {:8.4}, {:8.4}]",
        pose[0], pose[1], pose[2], pose[3], pose[4], pose[5]
    );
    if let Some(robot_mode) = state.robot_mode {
        let _ = write!(out, "  模式: {robot_mode:?}");
        if let Some(safety) = state.safety_mode {
            let _ = write!(out, " / {safety:?}");
        }
        if let Some(scaling) = state.speed_scaling {
            let _ = write!(out, " / 速度比例 {:.0}%", scaling * 100.0);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(frequency: u32) -> MonitorCommand {
        MonitorCommand {
            frequency,
            count: None,
            connect: ConnectArgs::default(),
        }
    }

    #[test]
    fn test_period() {
        assert_eq!(command(10).period().unwrap(), Duration::from_millis(100));
        assert_eq!(command(125).period().unwrap(), Duration::from_millis(8));
        assert!(command(0).period().is_err());
        assert!(command(500).period().is_err());
    }

    #[test]
    fn test_format_state() {
        let state = RobotState {
            controller_time: 12.5,
            joint_position: [std::f64::consts::FRAC_PI_2, 0.0, 0.0, 0.0, 0.0, 0.0],
            tool_pose: CartesianPose::new([0.4, -0.1, 0.3], [0.0, 3.1416, 0.0]),
            ..Default::default()
        };
        let text = format_state(&state, OperatingMode::Idle, &MetricsSnapshot::default());
        assert!(text.contains("12.500s"));
        assert!(text.contains("90.000"));
        assert!(text.contains("3.1416"));
        // 无模式字段的版本不输出模式行
        assert_eq!(text.lines().count(), 3);
    }
}
