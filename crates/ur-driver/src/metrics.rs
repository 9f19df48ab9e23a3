//! 驱动运行指标
//!
//! 原子计数器，驱动周期内更新，任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 周期平均值的平滑系数
const PERIOD_SMOOTHING: f64 = 0.1;

/// 驱动实时指标
///
/// ```rust
/// use ur_driver::DriverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DriverMetrics::default();
/// metrics.frames_received.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_received, 1);
/// ```
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 重组出的完整帧数
    pub frames_received: AtomicU64,
    /// 成功应用到状态的帧数
    pub frames_decoded: AtomicU64,
    /// 时间合理性检查未通过、保持状态的帧数
    pub frames_held: AtomicU64,
    /// 长度不在版本目录中的帧数
    pub unknown_length_frames: AtomicU64,
    /// 无效数据包（长度头非法或时间不合理）
    pub invalid_packets: AtomicU64,
    /// 接收超时次数
    pub receive_timeouts: AtomicU64,
    /// 连接故障次数（含发送失败）
    pub socket_faults: AtomicU64,
    /// 成功发送的指令数
    pub commands_sent: AtomicU64,
    /// 被拒绝的请求数
    pub requests_rejected: AtomicU64,
    /// 平均周期（微秒，f64 位模式）
    average_period_bits: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_held: self.frames_held.load(Ordering::Relaxed),
            unknown_length_frames: self.unknown_length_frames.load(Ordering::Relaxed),
            invalid_packets: self.invalid_packets.load(Ordering::Relaxed),
            receive_timeouts: self.receive_timeouts.load(Ordering::Relaxed),
            socket_faults: self.socket_faults.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            average_period: self.average_period(),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.frames_received,
            &self.frames_decoded,
            &self.frames_held,
            &self.unknown_length_frames,
            &self.invalid_packets,
            &self.receive_timeouts,
            &self.socket_faults,
            &self.commands_sent,
            &self.requests_rejected,
            &self.average_period_bits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// 指数平滑后的周期
    pub fn average_period(&self) -> Duration {
        let micros = f64::from_bits(self.average_period_bits.load(Ordering::Relaxed));
        Duration::from_secs_f64(micros.max(0.0) / 1e6)
    }

    /// 记录一个周期的实际时长
    pub fn record_period(&self, period: Duration) {
        let sample = period.as_secs_f64() * 1e6;
        let current = f64::from_bits(self.average_period_bits.load(Ordering::Relaxed));
        let next = if current <= 0.0 {
            sample
        } else {
            current + PERIOD_SMOOTHING * (sample - current)
        };
        self.average_period_bits.store(next.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_decoded: u64,
    pub frames_held: u64,
    pub unknown_length_frames: u64,
    pub invalid_packets: u64,
    pub receive_timeouts: u64,
    pub socket_faults: u64,
    pub commands_sent: u64,
    pub requests_rejected: u64,
    pub average_period: Duration,
}

impl MetricsSnapshot {
    /// 成功应用帧占全部帧的比例（百分比）
    ///
    /// `frames_received` 为 0 时返回 0.0。
    pub fn decode_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        (self.frames_decoded as f64 / self.frames_received as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = DriverMetrics::new();
        DriverMetrics::incr(&metrics.frames_received);
        DriverMetrics::incr(&metrics.frames_received);
        DriverMetrics::incr(&metrics.frames_decoded);

        let snap = metrics.snapshot();
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.frames_decoded, 1);
        assert_eq!(snap.decode_rate(), 50.0);

        metrics.reset();
        let snap = metrics.snapshot();
        assert_eq!(snap.frames_received, 0);
        assert_eq!(snap.decode_rate(), 0.0);
        assert_eq!(snap.average_period, Duration::ZERO);
    }

    #[test]
    fn test_period_smoothing() {
        let metrics = DriverMetrics::new();
        metrics.record_period(Duration::from_millis(8));
        let avg = metrics.average_period().as_secs_f64() * 1e3;
        assert!((avg - 8.0).abs() < 1e-6, "avg = {avg}");

        // 单个异常值只移动 10%
        metrics.record_period(Duration::from_millis(18));
        let avg = metrics.average_period().as_secs_f64() * 1e3;
        assert!((avg - 9.0).abs() < 1e-6, "avg = {avg}");
    }
}
