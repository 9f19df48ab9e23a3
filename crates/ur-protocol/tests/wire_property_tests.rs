//! 线上格式与限幅的属性测试
//!
//! 使用 proptest 验证字节序翻转与速度限幅的性质。

use proptest::prelude::*;
use ur_protocol::{
    FrameBuilder, MAX_JOINT_VELOCITY, MIN_JOINT_VELOCITY, ProtocolVersion, RtFrame,
    VelocityLimits, decode_feedback, swap_f64_fields,
};

proptest! {
    /// 字节翻转两次恢复原始字节
    #[test]
    fn swap_is_involution(mut data in proptest::collection::vec(any::<u8>(), 4..1100)) {
        let original = data.clone();
        swap_f64_fields(&mut data);
        swap_f64_fields(&mut data);
        prop_assert_eq!(data, original);
    }

    /// 校正前后读取结果一致
    #[test]
    fn corrected_frame_reads_same_values(q in prop::array::uniform6(-6.3..6.3f64), t in 0.0..1e6f64) {
        let bytes = FrameBuilder::new(ProtocolVersion::V3).time(t).joint_position(q).build();
        let raw = RtFrame::from_slice(&bytes);
        let mut corrected = raw.clone();
        corrected.correct_byte_order();

        let a = decode_feedback(&raw, ProtocolVersion::V3).unwrap();
        let b = decode_feedback(&corrected, ProtocolVersion::V3).unwrap();
        prop_assert_eq!(a.joint_position, q);
        prop_assert_eq!(b.joint_position, q);
        prop_assert_eq!(b.time, t);
    }

    /// 低于下限的正值提升到下限
    #[test]
    fn clamp_below_min(v in 1e-12..MIN_JOINT_VELOCITY) {
        let limits = VelocityLimits::default();
        prop_assert_eq!(limits.clamp(v), MIN_JOINT_VELOCITY);
        prop_assert_eq!(limits.clamp(-v), -MIN_JOINT_VELOCITY);
    }

    /// 超过上限的值截断到上限，符号保留
    #[test]
    fn clamp_above_max(v in MAX_JOINT_VELOCITY..100.0f64) {
        let limits = VelocityLimits::default();
        prop_assert_eq!(limits.clamp(v), MAX_JOINT_VELOCITY);
        prop_assert_eq!(limits.clamp(-v), -MAX_JOINT_VELOCITY);
    }

    /// 范围内的值保持不变
    #[test]
    fn clamp_in_range(v in MIN_JOINT_VELOCITY..MAX_JOINT_VELOCITY) {
        let limits = VelocityLimits::default();
        prop_assert_eq!(limits.clamp(v), v);
        prop_assert_eq!(limits.clamp(-v), -v);
    }

    /// 输出幅值总在 [min, max] 内
    #[test]
    fn clamp_magnitude_bounded(v in -100.0..100.0f64) {
        let out = VelocityLimits::default().clamp(v).abs();
        prop_assert!((MIN_JOINT_VELOCITY..=MAX_JOINT_VELOCITY).contains(&out));
    }
}
