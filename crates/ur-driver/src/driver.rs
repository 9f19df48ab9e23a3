//! 驱动主体
//!
//! [`UrDriver`] 持有传输、接收流水线与运动状态机，由单一线程调用
//! [`UrDriver::cycle`] 推进。每个周期：
//!
//! 1. 接收（有界超时）并取出至多一帧
//! 2. 解析并整份发布状态快照
//! 3. 依次处理排队的请求
//! 4. 状态机周期推进，发送周期指令
//!
//! 其他线程通过 [`DriverHandle`] 提交请求、读取快照和接收事件。

use crate::error::DriverError;
use crate::event::DriverEvent;
use crate::handle::DriverHandle;
use crate::machine::{MotionRequest, MotionSignal, MotionStateMachine, Transition};
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::mode::OperatingMode;
use crate::pipeline::{DriverConfig, FrameOutcome, Pipeline, Processed};
use crate::state::{DriverContext, RobotState};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use ur_net::{NetError, RtTransport};
use ur_protocol::{ProtocolVersion, ScriptCommand};

/// 单周期结果
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// 未连接，未尝试接收
    Disconnected,
    /// 本周期发生连接故障，已断开
    ConnectionLost,
    /// 超时内未收到数据
    ReceiveTimeout,
    /// 收到数据，附带取帧结果
    Frame(FrameOutcome),
}

/// 请求处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 已采用（需要发送的指令已发送）
    Accepted,
    /// 当前模式不接受
    Rejected,
    /// 指令发送失败
    SendFailed,
}

/// UR 实时接口驱动
#[derive(Debug)]
pub struct UrDriver<T: RtTransport> {
    transport: T,
    config: DriverConfig,
    pipeline: Pipeline,
    machine: MotionStateMachine,
    ctx: Arc<DriverContext>,
    request_tx: Sender<MotionRequest>,
    request_rx: Receiver<MotionRequest>,
    event_tx: Sender<DriverEvent>,
    event_rx: Receiver<DriverEvent>,
    last_cycle: Option<Instant>,
    last_connect_attempt: Option<Instant>,
}

impl<T: RtTransport> UrDriver<T> {
    /// 创建未连接的驱动
    pub fn new(transport: T, config: DriverConfig) -> Self {
        let (request_tx, request_rx) = bounded(config.request_queue_capacity.max(1));
        let (event_tx, event_rx) = bounded(config.event_queue_capacity.max(1));
        Self {
            transport,
            pipeline: Pipeline::new(&config),
            machine: MotionStateMachine::new(config.motion_config()),
            config,
            ctx: Arc::new(DriverContext::new()),
            request_tx,
            request_rx,
            event_tx,
            event_rx,
            last_cycle: None,
            last_connect_attempt: None,
        }
    }

    /// 建立连接
    ///
    /// 连接后立即丢弃 socket 中已积压的旧数据，状态机进入 Idle。
    ///
    /// # Errors
    /// - `DriverError::Net`: 连接失败
    pub fn connect(&mut self) -> Result<(), DriverError> {
        self.last_connect_attempt = Some(Instant::now());
        self.transport.connect()?;

        match self.transport.discard_pending() {
            Ok(0) => {},
            Ok(n) => debug!("Discarded {} stale bytes after connect", n),
            Err(e) => warn!("Failed to flush socket after connect: {}", e),
        }
        self.pipeline.reset_buffer();
        self.pipeline.reset_time_baseline();
        self.machine.on_connected();
        self.ctx.set_connected(true);
        self.sync_mode();
        info!("Real-time interface connected");
        self.emit(DriverEvent::Connected);
        Ok(())
    }

    /// 主动断开
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.pipeline.reset_buffer();
        self.machine.on_connection_lost();
        self.ctx.set_connected(false);
        self.sync_mode();
    }

    pub fn is_connected(&self) -> bool {
        self.machine.mode().is_connected()
    }

    pub fn mode(&self) -> OperatingMode {
        self.machine.mode()
    }

    /// 活动协议版本
    pub fn version(&self) -> ProtocolVersion {
        self.pipeline.version()
    }

    /// 最近发布的状态快照
    pub fn state(&self) -> Arc<RobotState> {
        self.ctx.state.load_full()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn machine(&self) -> &MotionStateMachine {
        &self.machine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// 事件接收端
    ///
    /// 多个接收端共享同一队列，每个事件只会被其中一个取走。
    pub fn events(&self) -> Receiver<DriverEvent> {
        self.event_rx.clone()
    }

    /// 跨线程句柄
    pub fn handle(&self) -> DriverHandle {
        DriverHandle::new(
            self.ctx.clone(),
            self.request_tx.clone(),
            self.event_rx.clone(),
            self.config.request_queue_capacity,
        )
    }

    /// 立即处理一个请求（不经过队列）
    pub fn request(&mut self, request: MotionRequest) -> RequestOutcome {
        trace!("Request {:?} in {}", request, self.machine.mode());
        let transition = self.machine.on_request(&request);
        self.execute(transition)
    }

    /// 执行一个周期
    pub fn cycle(&mut self) -> CycleOutcome {
        self.record_period();

        if !self.is_connected() {
            self.try_reconnect();
            if !self.is_connected() {
                self.drain_requests();
                return CycleOutcome::Disconnected;
            }
        }

        match self
            .pipeline
            .receive(&mut self.transport, self.config.receive_timeout)
        {
            Ok(n) if n > 0 => {},
            Ok(_) | Err(NetError::Timeout) => {
                DriverMetrics::incr(&self.ctx.metrics.receive_timeouts);
                debug!("No data within {:?}", self.config.receive_timeout);
                self.pipeline.reset_buffer();
                self.emit(DriverEvent::ReceiveTimeout);
                self.drain_requests();
                return CycleOutcome::ReceiveTimeout;
            },
            Err(e) => {
                self.on_fault(&e);
                self.drain_requests();
                return CycleOutcome::ConnectionLost;
            },
        }

        let processed = self.pipeline.process();
        self.report(&processed);
        if processed.outcome.has_frame() {
            self.ctx.publish(self.pipeline.working().clone());
        }

        self.drain_requests();
        self.tick();
        CycleOutcome::Frame(processed.outcome)
    }

    /// 循环执行周期直到 `stop` 置位
    ///
    /// 未连接时每周期休眠 `idle_period`。
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("Driver loop started");
        while !stop.load(Ordering::Acquire) {
            if self.cycle() == CycleOutcome::Disconnected {
                spin_sleep::sleep(self.config.idle_period);
            }
        }
        info!("Driver loop stopped");
    }

    fn tick(&mut self) {
        let joint_velocity = self.pipeline.working().joint_velocity;
        let transition = self.machine.on_cycle(&joint_velocity);
        self.execute(transition);
    }

    fn drain_requests(&mut self) {
        while let Ok(request) = self.request_rx.try_recv() {
            self.request(request);
        }
    }

    fn execute(&mut self, transition: Transition) -> RequestOutcome {
        if let Some(MotionSignal::RobotNotReady { request, mode }) = transition.signal {
            warn!("{} rejected: robot not ready ({})", request, mode);
            DriverMetrics::incr(&self.ctx.metrics.requests_rejected);
            self.emit(DriverEvent::RobotNotReady { request, mode });
            return RequestOutcome::Rejected;
        }

        let delivered = match &transition.command {
            Some(command) => self.send(command),
            None => true,
        };
        let previous = self.machine.mode();
        self.machine.commit(transition, delivered);
        if self.machine.mode() != previous {
            debug!("Mode {} -> {}", previous, self.machine.mode());
            self.sync_mode();
        }

        if delivered {
            RequestOutcome::Accepted
        } else {
            RequestOutcome::SendFailed
        }
    }

    fn send(&mut self, command: &ScriptCommand) -> bool {
        let text = command.to_script();
        match self.transport.send_str(&text) {
            Ok(()) => {
                DriverMetrics::incr(&self.ctx.metrics.commands_sent);
                trace!("Sent {}", text.trim_end());
                true
            },
            Err(e) => {
                error!("Failed to send {:?}: {}", text.trim_end(), e);
                DriverMetrics::incr(&self.ctx.metrics.socket_faults);
                self.emit(DriverEvent::SocketFault);
                false
            },
        }
    }

    fn report(&self, processed: &Processed) {
        let metrics = &self.ctx.metrics;
        if processed.outcome.has_frame() {
            DriverMetrics::incr(&metrics.frames_received);
        }
        match &processed.outcome {
            FrameOutcome::Incomplete => {},
            FrameOutcome::Invalid { observed, declared }
            | FrameOutcome::Held { observed, declared } => {
                if matches!(processed.outcome, FrameOutcome::Held { .. }) {
                    DriverMetrics::incr(&metrics.frames_held);
                }
                DriverMetrics::incr(&metrics.invalid_packets);
                self.emit(DriverEvent::InvalidPacket {
                    observed_bytes: *observed,
                    declared_length: *declared,
                });
            },
            FrameOutcome::UnknownLength { .. } => {
                DriverMetrics::incr(&metrics.unknown_length_frames);
            },
            FrameOutcome::Decoded { .. } => DriverMetrics::incr(&metrics.frames_decoded),
            FrameOutcome::DecodeFailed(_) => DriverMetrics::incr(&metrics.invalid_packets),
        }
        if let Some((from, to)) = processed.version_change {
            self.emit(DriverEvent::VersionChanged { from, to });
        }
    }

    fn on_fault(&mut self, err: &NetError) {
        error!("Socket error: {}", err);
        DriverMetrics::incr(&self.ctx.metrics.socket_faults);
        self.disconnect();
        self.emit(DriverEvent::SocketFault);
    }

    fn try_reconnect(&mut self) {
        let Some(interval) = self.config.reconnect_interval else {
            return;
        };
        if self
            .last_connect_attempt
            .is_some_and(|last| last.elapsed() < interval)
        {
            return;
        }
        if let Err(e) = self.connect() {
            warn!("Reconnect failed: {}", e);
        }
    }

    fn record_period(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_cycle.replace(now) {
            self.ctx.metrics.record_period(now - last);
        }
    }

    fn sync_mode(&self) {
        self.ctx.mode.set(self.machine.mode());
    }

    fn emit(&self, event: DriverEvent) {
        if let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) {
            trace!("Event queue full, dropping {}", event);
        }
    }
}

impl<T: RtTransport + Send + 'static> UrDriver<T> {
    /// 在后台线程中运行驱动
    ///
    /// # Errors
    /// - `DriverError::Net`: 线程创建失败
    pub fn spawn(mut self) -> Result<DriverThread, DriverError> {
        let handle = self.handle();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let thread = std::thread::Builder::new()
            .name("ur-rt".into())
            .spawn(move || {
                self.run(&stop_flag);
                self.disconnect();
            })
            .map_err(NetError::Io)?;
        Ok(DriverThread {
            handle,
            stop,
            thread: Some(thread),
        })
    }
}

/// 后台运行中的驱动
///
/// Drop 时通知线程退出并等待其结束（至多一个接收超时）。
pub struct DriverThread {
    handle: DriverHandle,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DriverThread {
    pub fn handle(&self) -> &DriverHandle {
        &self.handle
    }

    /// 线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 停止并等待线程结束
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Driver thread panicked");
        }
    }
}

impl Drop for DriverThread {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ur_net::{MockHandle, MockRead, MockTransport};
    use ur_protocol::FrameBuilder;

    fn connected() -> (UrDriver<MockTransport>, MockHandle) {
        let (transport, mock) = MockTransport::new();
        let mut driver = UrDriver::new(transport, DriverConfig::default());
        driver.connect().unwrap();
        (driver, mock)
    }

    #[test]
    fn test_connect_flushes_and_enters_idle() {
        let (transport, mock) = MockTransport::new();
        mock.set_pending(512);
        let mut driver = UrDriver::new(transport, DriverConfig::default());
        let events = driver.events();
        assert_eq!(driver.mode(), OperatingMode::Disconnected);

        driver.connect().unwrap();
        assert_eq!(mock.pending(), 0);
        assert_eq!(driver.mode(), OperatingMode::Idle);
        assert!(driver.handle().is_connected());
        assert_eq!(events.try_recv(), Ok(DriverEvent::Connected));
    }

    #[test]
    fn test_disconnected_cycle_does_not_receive() {
        let (transport, mock) = MockTransport::new();
        mock.push_data(FrameBuilder::new(ProtocolVersion::V2).build());
        let mut driver = UrDriver::new(transport, DriverConfig::default());
        assert_eq!(driver.cycle(), CycleOutcome::Disconnected);
        assert_eq!(mock.remaining_reads(), 1);
    }

    #[test]
    fn test_fault_disconnects() {
        let (mut driver, mock) = connected();
        let events = driver.events();
        events.try_recv().unwrap();
        mock.push_read(MockRead::Fault);

        assert_eq!(driver.cycle(), CycleOutcome::ConnectionLost);
        assert_eq!(driver.mode(), OperatingMode::Disconnected);
        assert!(!driver.handle().is_connected());
        assert_eq!(events.try_recv(), Ok(DriverEvent::SocketFault));
        assert_eq!(driver.metrics().socket_faults, 1);
    }

    #[test]
    fn test_timeout_clears_partial_frame() {
        let (mut driver, mock) = connected();
        let frame = FrameBuilder::new(ProtocolVersion::V2).build();
        mock.push_data(frame[..100].to_vec());
        mock.push_read(MockRead::Timeout);

        assert_eq!(driver.cycle(), CycleOutcome::Frame(FrameOutcome::Incomplete));
        assert_eq!(driver.cycle(), CycleOutcome::ReceiveTimeout);
        assert_eq!(driver.pipeline.buffered(), 0);
        assert_eq!(driver.metrics().receive_timeouts, 1);
    }

    #[test]
    fn test_send_failure_keeps_idle() {
        let (mut driver, mock) = connected();
        mock.set_fail_sends(true);
        assert_eq!(
            driver.request(MotionRequest::JointPosition([0.0; 6])),
            RequestOutcome::SendFailed
        );
        assert_eq!(driver.mode(), OperatingMode::Idle);
    }

    #[test]
    fn test_reconnect_interval() {
        let (transport, mock) = MockTransport::new();
        let config = DriverConfig {
            reconnect_interval: Some(std::time::Duration::ZERO),
            ..Default::default()
        };
        let mut driver = UrDriver::new(transport, config);
        mock.set_refuse_connect(true);
        assert_eq!(driver.cycle(), CycleOutcome::Disconnected);
        assert_eq!(mock.connect_attempts(), 1);

        mock.set_refuse_connect(false);
        assert_eq!(driver.cycle(), CycleOutcome::ReceiveTimeout);
        assert_eq!(mock.connect_attempts(), 2);
        assert_eq!(driver.mode(), OperatingMode::Idle);
    }

    #[test]
    fn test_spawned_driver_stops() {
        let (transport, mock) = MockTransport::new();
        let config = DriverConfig {
            receive_timeout: std::time::Duration::from_millis(1),
            ..Default::default()
        };
        let mut driver = UrDriver::new(transport, config);
        driver.connect().unwrap();
        let thread = driver.spawn().unwrap();
        assert!(thread.handle().is_connected());
        thread.shutdown();
        assert!(!mock.is_connected());
    }
}
