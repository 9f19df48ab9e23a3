//! 协议版本识别
//!
//! 每收到一帧，按帧长度在版本目录中查找候选版本并累加其证据。
//! 尚无活动版本时直接采用；已有活动版本时，只有候选版本的证据
//! 严格超过活动版本的证据才切换，单个异常帧不会引起抖动。

use tracing::{info, warn};
use ur_protocol::{ProtocolVersion, VERSION_COUNT};

/// 单帧识别结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// 长度命中目录
    Matched {
        /// 本帧长度对应的版本
        candidate: ProtocolVersion,
        /// 处理本帧后的活动版本
        active: ProtocolVersion,
        /// 若活动版本因本帧改变，记录之前的版本
        changed_from: Option<ProtocolVersion>,
    },
    /// 长度不在目录中（Unknown 计数已累加）
    Unmatched,
}

/// 版本识别器
#[derive(Debug, Clone, Default)]
pub struct VersionDetector {
    active: ProtocolVersion,
    evidence: [u64; VERSION_COUNT],
}

impl VersionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前活动版本（未识别时为 Unknown）
    pub fn active(&self) -> ProtocolVersion {
        self.active
    }

    /// 某版本累计的证据
    pub fn evidence(&self, version: ProtocolVersion) -> u64 {
        self.evidence[version.index()]
    }

    /// 全部证据计数（下标为 `ProtocolVersion::index()`）
    pub fn evidence_all(&self) -> [u64; VERSION_COUNT] {
        self.evidence
    }

    /// 记录一帧的声明长度
    pub fn observe(&mut self, frame_len: usize) -> Detection {
        let Some(candidate) = ProtocolVersion::from_frame_len(frame_len) else {
            self.evidence[ProtocolVersion::Unknown.index()] += 1;
            return Detection::Unmatched;
        };

        self.evidence[candidate.index()] += 1;

        let previous = self.active;
        if previous == ProtocolVersion::Unknown {
            self.active = candidate;
            info!("Detected protocol {}, frame length {}", candidate, frame_len);
        } else if candidate != previous
            && self.evidence[candidate.index()] > self.evidence[previous.index()]
        {
            self.active = candidate;
            warn!(
                "Switching protocol {} -> {} (evidence {} > {})",
                previous,
                candidate,
                self.evidence[candidate.index()],
                self.evidence[previous.index()]
            );
        }

        Detection::Matched {
            candidate,
            active: self.active,
            changed_from: (self.active != previous).then_some(previous),
        }
    }
}
