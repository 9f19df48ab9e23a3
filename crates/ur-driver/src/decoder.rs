//! 有状态的帧解析
//!
//! 在 [`ur_protocol::decode_feedback`] 之上增加：
//! - 帧长与活动版本目录长度不一致时的诊断计数
//! - 可选的控制器时间合理性检查（默认关闭）

use crate::state::RobotState;
use tracing::{debug, warn};
use ur_protocol::{ProtocolError, ProtocolVersion, RtFrame, decode_feedback};

/// 控制器标称周期（秒）
pub const NOMINAL_PERIOD: f64 = 0.008;

/// 时间合理性检查策略
///
/// 启用后，若已有上一帧时间戳且两帧时间差不在 `[min_delta, max_delta]`
/// 内，本帧的关节与末端数据不被采用，时间戳按标称周期前进。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCheck {
    pub enabled: bool,
    /// 时间差下限（秒）
    pub min_delta: f64,
    /// 时间差上限（秒）
    pub max_delta: f64,
    /// 检查未通过时时间戳的前进量（秒）
    pub nominal_period: f64,
}

impl Default for TimeCheck {
    fn default() -> Self {
        Self {
            enabled: false,
            min_delta: 0.004,
            max_delta: 0.024,
            nominal_period: NOMINAL_PERIOD,
        }
    }
}

impl TimeCheck {
    /// 默认阈值并启用
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    fn accepts(&self, delta: f64) -> bool {
        (self.min_delta..=self.max_delta).contains(&delta)
    }
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// 已写入状态
    Applied,
    /// 时间不合理，状态保持
    Held {
        /// 测得的时间差（毫秒）
        delta_ms: f64,
    },
    /// 帧无法按该版本解析
    Failed(ProtocolError),
}

/// 帧解析器
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    time_check: TimeCheck,
    /// 是否已有可作为时间检查基准的帧
    has_baseline: bool,
}

impl FrameDecoder {
    pub fn new(time_check: TimeCheck) -> Self {
        Self {
            time_check,
            has_baseline: false,
        }
    }

    /// 丢弃时间检查基准，下一帧无条件采用（重新连接后调用）
    pub fn reset_baseline(&mut self) {
        self.has_baseline = false;
    }

    pub fn time_check(&self) -> &TimeCheck {
        &self.time_check
    }

    /// 按活动版本解析并更新工作状态
    ///
    /// `frame` 应已完成字节序校正；未校正的帧同样能正确读取，只是更慢。
    pub fn decode_into(
        &mut self,
        frame: &RtFrame,
        version: ProtocolVersion,
        state: &mut RobotState,
    ) -> DecodeOutcome {
        self.record_length(frame.len(), version, state);

        let fb = match decode_feedback(frame, version) {
            Ok(fb) => fb,
            Err(e) => return DecodeOutcome::Failed(e),
        };

        let delta = fb.time - state.controller_time;
        state.diagnostics.time_delta_ms = delta * 1000.0;

        if self.time_check.enabled && self.has_baseline && !self.time_check.accepts(delta) {
            warn!(
                "Implausible controller time step {:.3} ms, holding state",
                delta * 1000.0
            );
            state.controller_time += self.time_check.nominal_period;
            state.diagnostics.exec_time = fb.controller_exec_time;
            state.diagnostics.held_frames += 1;
            return DecodeOutcome::Held {
                delta_ms: delta * 1000.0,
            };
        }

        state.apply_feedback(&fb);
        self.has_baseline = true;
        DecodeOutcome::Applied
    }

    fn record_length(&self, len: usize, version: ProtocolVersion, state: &mut RobotState) {
        let expected = version.expected_len();
        let diag = &mut state.diagnostics;
        if len < expected {
            diag.short_frames += 1;
            diag.last_short_len = len;
            debug!("Short frame: {} < {} ({})", len, expected, version);
        } else if len > expected {
            diag.long_frames += 1;
            diag.last_long_len = len;
            debug!("Long frame: {} > {} ({})", len, expected, version);
        }
    }
}
