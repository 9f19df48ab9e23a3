//! 单次连接会话
//!
//! 每个命令：读取配置 -> 连接 -> 后台驱动线程 -> 执行操作 -> 断开。

use crate::commands::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use ur_sdk::driver::MetricsSnapshot;
use ur_sdk::prelude::*;
use ur_sdk::{RT_PORT, TcpDriver};

/// 连接后等待首帧的时间
const FEEDBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// 等待请求生效的时间
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(1);

/// 轮询间隔
const POLL_PERIOD: Duration = Duration::from_millis(4);

/// 连接参数（命令行优先于配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 控制器地址（覆盖配置）
    #[arg(long)]
    pub host: Option<String>,

    /// 端口（覆盖配置）
    #[arg(long)]
    pub port: Option<u16>,

    /// 启用时间合理性检查
    #[arg(long)]
    pub time_check: bool,
}

/// 解析后的连接目标
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub config: DriverConfig,
}

impl ConnectArgs {
    /// 合并命令行参数与配置文件
    pub fn resolve(&self, file: &CliConfig) -> Result<Target> {
        let host = self
            .host
            .clone()
            .or_else(|| file.host.clone())
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("未指定控制器地址，请使用 --host 或 `ur-cli config set --host`")
            })?;

        let mut config = DriverConfig::default();
        if let Some(ms) = file.receive_timeout_ms {
            config.receive_timeout = Duration::from_millis(ms);
        }
        if self.time_check || file.time_check == Some(true) {
            config.time_check = TimeCheck::enabled();
        }
        config.reconnect_interval = file.reconnect_interval_ms.map(Duration::from_millis);

        Ok(Target {
            host,
            port: self.port.or(file.port).unwrap_or(RT_PORT),
            config,
        })
    }
}

/// 请求完成条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// 至少发出一条指令
    Delivered,
    /// 进入指定模式
    Mode(OperatingMode),
}

/// [`Session::repeat`] 的结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// 到达时长
    Elapsed,
    /// 回调要求结束
    Finished,
    /// Ctrl-C
    Interrupted,
}

/// 进程级 Ctrl-C 标志（只注册一次）
fn interrupt_flag() -> Arc<AtomicBool> {
    static FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    FLAG.get_or_init(|| {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = flag.clone();
        if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
        flag
    })
    .clone()
}

/// 已连接的会话
pub struct Session {
    thread: DriverThread,
    robot: DriverHandle,
    interrupted: Arc<AtomicBool>,
}

impl Session {
    /// 按命令行参数与配置文件连接
    pub fn open(args: &ConnectArgs) -> Result<Self> {
        let target = args.resolve(&CliConfig::load()?)?;
        Self::open_target(target)
    }

    /// 连接到指定目标并等待首帧
    pub fn open_target(target: Target) -> Result<Self> {
        println!("⏳ 连接到 {}:{} ...", target.host, target.port);
        let mut driver: TcpDriver = UrBuilder::new()
            .host(target.host.as_str())
            .port(target.port)
            .config(target.config)
            .build()?;
        driver
            .connect()
            .with_context(|| format!("连接 {}:{} 失败", target.host, target.port))?;

        let thread = driver.spawn()?;
        let robot = thread.handle().clone();
        let state = robot.wait_for_feedback(FEEDBACK_TIMEOUT).context("未收到控制器反馈帧")?;
        println!("✅ 已连接（{}）", state.version);

        Ok(Self {
            thread,
            robot,
            interrupted: interrupt_flag(),
        })
    }

    pub fn robot(&self) -> &DriverHandle {
        &self.robot
    }

    /// 是否收到 Ctrl-C
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// 提交请求并等待其生效
    ///
    /// 被拒绝（模式不符）或发送失败时返回错误。
    pub fn submit(&self, request: MotionRequest, until: Completion) -> Result<()> {
        let name = request.name();
        let baseline = self.robot.metrics();
        self.robot.request(request)?;

        let deadline = Instant::now() + SUBMIT_TIMEOUT;
        loop {
            self.check_events(name)?;
            if self.is_complete(until, &baseline) {
                return Ok(());
            }
            if !self.robot.is_connected() {
                anyhow::bail!("连接已断开");
            }
            if Instant::now() >= deadline {
                anyhow::bail!("等待 {name} 生效超时");
            }
            std::thread::sleep(POLL_PERIOD);
        }
    }

    fn is_complete(&self, until: Completion, baseline: &MetricsSnapshot) -> bool {
        match until {
            Completion::Delivered => self.robot.metrics().commands_sent > baseline.commands_sent,
            Completion::Mode(mode) => self.robot.mode() == mode,
        }
    }

    fn check_events(&self, name: &str) -> Result<()> {
        while let Some(event) = self.robot.next_event(Duration::ZERO) {
            match event {
                DriverEvent::RobotNotReady { mode, .. } => {
                    anyhow::bail!("机器人当前处于 {mode}，不接受 {name}")
                },
                DriverEvent::SocketFault => anyhow::bail!("发送 {name} 失败：连接故障"),
                other => debug!("event: {}", other),
            }
        }
        Ok(())
    }

    /// 等待进入指定模式（不受 Ctrl-C 影响），返回是否在超时前进入
    pub fn wait_for_mode(&self, mode: OperatingMode, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.robot.mode() != mode {
            if !self.robot.is_connected() || Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL_PERIOD);
        }
        true
    }

    /// 在 `duration` 内每隔 `period` 调用一次 `tick`（`None` 表示不限时）
    ///
    /// Ctrl-C 时提前结束，连接断开时返回错误。
    pub fn repeat(
        &self,
        duration: Option<Duration>,
        period: Duration,
        mut tick: impl FnMut(&DriverHandle) -> Result<ControlFlow<()>>,
    ) -> Result<RunEnd> {
        let start = Instant::now();
        loop {
            if self.interrupted() {
                println!("⚠️ 已中断");
                return Ok(RunEnd::Interrupted);
            }
            if !self.robot.is_connected() {
                anyhow::bail!("连接已断开");
            }
            if duration.is_some_and(|d| start.elapsed() >= d) {
                return Ok(RunEnd::Elapsed);
            }
            if tick(&self.robot)?.is_break() {
                return Ok(RunEnd::Finished);
            }
            std::thread::sleep(period);
        }
    }

    /// 停止驱动线程并断开
    pub fn close(self) {
        self.thread.shutdown();
        println!("🔌 已断开");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use ur_sdk::protocol::FrameBuilder;

    fn file(host: Option<&str>) -> CliConfig {
        CliConfig {
            host: host.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_prefers_command_line() {
        let args = ConnectArgs {
            host: Some("10.0.0.2".to_string()),
            port: None,
            time_check: false,
        };
        let target = args.resolve(&file(Some("10.0.0.9"))).unwrap();
        assert_eq!(target.host, "10.0.0.2");
        assert_eq!(target.port, RT_PORT);
        assert!(!target.config.time_check.enabled);
    }

    #[test]
    fn test_resolve_from_file() {
        let config = CliConfig {
            host: Some("ur5.local".to_string()),
            port: Some(30013),
            receive_timeout_ms: Some(50),
            time_check: Some(true),
            reconnect_interval_ms: Some(500),
        };
        let target = ConnectArgs::default().resolve(&config).unwrap();
        assert_eq!(target.host, "ur5.local");
        assert_eq!(target.port, 30013);
        assert_eq!(target.config.receive_timeout, Duration::from_millis(50));
        assert!(target.config.time_check.enabled);
        assert_eq!(target.config.reconnect_interval, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_resolve_without_host() {
        assert!(ConnectArgs::default().resolve(&file(None)).is_err());
        assert!(ConnectArgs::default().resolve(&file(Some(" "))).is_err());
    }

    /// 本地模拟控制器：周期推送 V3 帧并收集收到的文本
    fn fake_controller(listener: TcpListener, frames: usize) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(Duration::from_millis(2))).unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 256];
            for i in 0..frames {
                let frame = FrameBuilder::new(ProtocolVersion::V3)
                    .time(i as f64 * 0.008)
                    .joint_position([0.1, 0.2, 0.3, 0.4, 0.5, 0.6])
                    .build();
                if stream.write_all(&frame).is_err() {
                    break;
                }
                match stream.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                    Err(_) => {},
                }
                thread::sleep(Duration::from_millis(6));
            }
            String::from_utf8_lossy(&received).into_owned()
        })
    }

    #[test]
    fn test_session_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let controller = fake_controller(listener, 150);

        let target = ConnectArgs {
            host: Some("127.0.0.1".to_string()),
            port: Some(port),
            time_check: false,
        }
        .resolve(&CliConfig::default())
        .unwrap();
        let session = Session::open_target(target).unwrap();
        assert_eq!(session.robot().version(), ProtocolVersion::V3);
        assert_eq!(session.robot().joint_position(), [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);

        session.submit(MotionRequest::Stop, Completion::Delivered).unwrap();
        session
            .submit(MotionRequest::JointPosition([0.0; 6]), Completion::Delivered)
            .unwrap();

        let mut ticks = 0;
        let end = session
            .repeat(Some(Duration::from_millis(30)), POLL_PERIOD, |_| {
                ticks += 1;
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(end, RunEnd::Elapsed);
        assert!(ticks > 0);
        let end = session
            .repeat(None, POLL_PERIOD, |_| Ok(ControlFlow::Break(())))
            .unwrap();
        assert_eq!(end, RunEnd::Finished);
        assert!(session.wait_for_mode(OperatingMode::Idle, Duration::from_millis(500)));
        session.close();

        let received = controller.join().unwrap();
        assert!(received.contains("stopj(1.4)\n"));
        assert!(received.contains("movej("));
    }
}
