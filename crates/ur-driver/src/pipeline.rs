//! 接收流水线
//!
//! socket 字节 → 帧重组 → 字节序校正 → 版本识别 → 解析到工作状态。
//! 流水线只处理数据方向，运动状态机与指令发送由 [`crate::UrDriver`] 负责。

use crate::decoder::{DecodeOutcome, FrameDecoder, TimeCheck};
use crate::detector::{Detection, VersionDetector};
use crate::machine::{DEFAULT_VELOCITY_TIMEOUT_CYCLES, MotionConfig};
use crate::reassembler::{DEFAULT_BUFFER_CAPACITY, FrameReassembler, Reassembly};
use crate::state::RobotState;
use std::time::Duration;
use tracing::{debug, warn};
use ur_net::{NetError, RtTransport};
use ur_protocol::{ProtocolError, ProtocolVersion, VelocityLimits};

/// 打印未知长度帧时输出的头部字节数
const HEAD_DUMP_LEN: usize = 16;

/// 驱动配置
///
/// # Example
///
/// ```
/// use ur_driver::{DriverConfig, TimeCheck};
/// use std::time::Duration;
///
/// let config = DriverConfig {
///     time_check: TimeCheck::enabled(),
///     reconnect_interval: Some(Duration::from_secs(1)),
///     ..Default::default()
/// };
/// assert_eq!(config.receive_timeout, Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// 单次接收超时
    pub receive_timeout: Duration,
    /// 未连接时每周期的休眠时间
    pub idle_period: Duration,
    /// 重组缓冲区容量（字节）
    pub buffer_capacity: usize,
    /// 控制器时间合理性检查
    pub time_check: TimeCheck,
    /// 关节速度限幅
    pub velocity_limits: VelocityLimits,
    /// 速度指令超时周期数
    pub velocity_timeout_cycles: u32,
    /// 断线后自动重连间隔（`None` 表示不重连）
    pub reconnect_interval: Option<Duration>,
    /// 请求队列容量
    pub request_queue_capacity: usize,
    /// 事件队列容量（满时丢弃新事件）
    pub event_queue_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(100),
            idle_period: Duration::from_millis(8),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            time_check: TimeCheck::default(),
            velocity_limits: VelocityLimits::default(),
            velocity_timeout_cycles: DEFAULT_VELOCITY_TIMEOUT_CYCLES,
            reconnect_interval: None,
            request_queue_capacity: 64,
            event_queue_capacity: 256,
        }
    }
}

impl DriverConfig {
    /// 状态机参数
    pub fn motion_config(&self) -> MotionConfig {
        MotionConfig {
            limits: self.velocity_limits,
            velocity_timeout_cycles: self.velocity_timeout_cycles,
        }
    }
}

/// 单周期的取帧结果
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// 缓存中尚无完整帧
    Incomplete,
    /// 长度头非法，缓存已清空
    Invalid { observed: usize, declared: i32 },
    /// 帧长不在版本目录中，未解析
    UnknownLength { declared: usize },
    /// 已解析并写入工作状态
    Decoded { version: ProtocolVersion },
    /// 时间不合理，工作状态保持
    Held { observed: usize, declared: i32 },
    /// 帧不足以按活动版本解析
    DecodeFailed(ProtocolError),
}

impl FrameOutcome {
    /// 是否取出了一帧
    pub fn has_frame(&self) -> bool {
        !matches!(self, FrameOutcome::Incomplete | FrameOutcome::Invalid { .. })
    }
}

/// 取帧结果及版本变化
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub outcome: FrameOutcome,
    /// 活动版本改变时为 `(from, to)`
    pub version_change: Option<(ProtocolVersion, ProtocolVersion)>,
}

/// 接收流水线
#[derive(Debug)]
pub struct Pipeline {
    reassembler: FrameReassembler,
    detector: VersionDetector,
    decoder: FrameDecoder,
    working: RobotState,
}

impl Pipeline {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            reassembler: FrameReassembler::with_capacity(config.buffer_capacity),
            detector: VersionDetector::new(),
            decoder: FrameDecoder::new(config.time_check),
            working: RobotState::default(),
        }
    }

    /// 接收一次并追加到重组缓存，返回本次收到的字节数
    pub fn receive<T: RtTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<usize, NetError> {
        self.reassembler.fill_from(transport, timeout)
    }

    /// 直接追加字节（回放或测试）
    pub fn feed(&mut self, data: &[u8]) {
        self.reassembler.extend(data);
    }

    /// 丢弃未成帧的缓存
    pub fn reset_buffer(&mut self) {
        self.reassembler.clear();
    }

    /// 丢弃时间检查基准（新连接的第一帧无条件采用）
    pub fn reset_time_baseline(&mut self) {
        self.decoder.reset_baseline();
    }

    /// 缓存中的字节数
    pub fn buffered(&self) -> usize {
        self.reassembler.len()
    }

    /// 当前工作状态（下一次发布的内容）
    pub fn working(&self) -> &RobotState {
        &self.working
    }

    pub fn detector(&self) -> &VersionDetector {
        &self.detector
    }

    /// 活动协议版本
    pub fn version(&self) -> ProtocolVersion {
        self.detector.active()
    }

    /// 取出至多一帧并处理
    pub fn process(&mut self) -> Processed {
        let observed = self.reassembler.len();
        let mut frame = match self.reassembler.take_frame() {
            Reassembly::Incomplete => return Processed::without_change(FrameOutcome::Incomplete),
            Reassembly::Invalid { observed, declared } => {
                warn!(
                    "Invalid packet: declared length {}, {} bytes buffered",
                    declared, observed
                );
                return Processed::without_change(FrameOutcome::Invalid { observed, declared });
            },
            Reassembly::Frame(frame) => frame,
        };

        frame.correct_byte_order();
        let declared = frame.len();
        let detection = self.detector.observe(declared);
        self.working.diagnostics.version_evidence = self.detector.evidence_all();
        self.working.diagnostics.active_version = self.detector.active();

        let Detection::Matched {
            active,
            changed_from,
            ..
        } = detection
        else {
            let head = &frame.as_bytes()[..declared.min(HEAD_DUMP_LEN)];
            debug!(
                "Frame length {} not in catalog (head: {})",
                declared,
                hex::encode(head)
            );
            return Processed::without_change(FrameOutcome::UnknownLength { declared });
        };

        let outcome = match self.decoder.decode_into(&frame, active, &mut self.working) {
            DecodeOutcome::Applied => FrameOutcome::Decoded { version: active },
            DecodeOutcome::Held { .. } => FrameOutcome::Held {
                observed,
                declared: declared as i32,
            },
            DecodeOutcome::Failed(e) => {
                warn!("Failed to decode {} byte frame: {}", declared, e);
                FrameOutcome::DecodeFailed(e)
            },
        };

        Processed {
            outcome,
            version_change: changed_from.map(|from| (from, active)),
        }
    }
}

impl Processed {
    fn without_change(outcome: FrameOutcome) -> Self {
        Self {
            outcome,
            version_change: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ur_protocol::FrameBuilder;

    #[test]
    fn test_v2_frame_end_to_end() {
        let mut p = Pipeline::new(&DriverConfig::default());
        let bytes = FrameBuilder::new(ProtocolVersion::V2)
            .time(1.0)
            .joint_position([0.5; 6])
            .build();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x03, 0x2C]);
        p.feed(&bytes);

        let processed = p.process();
        assert_eq!(
            processed.outcome,
            FrameOutcome::Decoded {
                version: ProtocolVersion::V2
            }
        );
        assert_eq!(
            processed.version_change,
            Some((ProtocolVersion::Unknown, ProtocolVersion::V2))
        );
        assert_eq!(p.working().joint_position, [0.5; 6]);
        assert_eq!(p.working().evidence(ProtocolVersion::V2), 1);
        assert_eq!(p.buffered(), 0);
    }

    #[test]
    fn test_unknown_length_not_decoded() {
        let mut p = Pipeline::new(&DriverConfig::default());
        p.feed(&FrameBuilder::with_len(900).time(3.0).build());
        assert_eq!(p.process().outcome, FrameOutcome::UnknownLength { declared: 900 });
        assert_eq!(p.version(), ProtocolVersion::Unknown);
        assert_eq!(p.working().controller_time, 0.0);
        assert_eq!(p.working().evidence(ProtocolVersion::Unknown), 1);
    }

    #[test]
    fn test_invalid_header() {
        let mut p = Pipeline::new(&DriverConfig::default());
        p.feed(&[0x80, 0x00, 0x00, 0x00, 0x01]);
        let processed = p.process();
        assert_eq!(
            processed.outcome,
            FrameOutcome::Invalid {
                observed: 5,
                declared: i32::MIN
            }
        );
        assert!(!processed.outcome.has_frame());
        assert_eq!(p.buffered(), 0);
    }

    #[test]
    fn test_held_frame_reports_lengths() {
        let config = DriverConfig {
            time_check: TimeCheck::enabled(),
            ..Default::default()
        };
        let mut p = Pipeline::new(&config);
        p.feed(&FrameBuilder::new(ProtocolVersion::V1).time(1.0).build());
        p.process();

        let mut data = FrameBuilder::new(ProtocolVersion::V1).time(1.05).build();
        data.extend_from_slice(&[0u8; 10]);
        p.feed(&data);
        assert_eq!(
            p.process().outcome,
            FrameOutcome::Held {
                observed: 774,
                declared: 764
            }
        );
        assert_eq!(p.buffered(), 10);
    }
}
