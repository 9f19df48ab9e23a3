//! 固件版本与帧长度对照表
//!
//! 控制器不会显式通告固件版本，帧长度是唯一可用的信号。

use std::fmt;

/// 实时接口协议版本
///
/// 判别值同时用作证据计数数组的下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ProtocolVersion {
    /// 未知（尚未识别）
    #[default]
    Unknown = 0,
    /// 固件 1.8 之前
    V1 = 1,
    /// 固件 1.8
    V2 = 2,
    /// 固件 3.0 / 3.1
    V3 = 3,
    /// 固件 3.2 及以后
    V4 = 4,
}

/// 版本数量（含 Unknown）
pub const VERSION_COUNT: usize = 5;

/// 帧长度对照表（不含 Unknown）
pub const FRAME_CATALOG: [(ProtocolVersion, usize); 4] = [
    (ProtocolVersion::V1, 764),
    (ProtocolVersion::V2, 812),
    (ProtocolVersion::V3, 1044),
    (ProtocolVersion::V4, 1060),
];

impl ProtocolVersion {
    /// 所有已知版本（按固件先后顺序）
    pub const ALL_KNOWN: [ProtocolVersion; 4] = [
        ProtocolVersion::V1,
        ProtocolVersion::V2,
        ProtocolVersion::V3,
        ProtocolVersion::V4,
    ];

    /// 该版本期望的帧长度，Unknown 为 0
    pub fn expected_len(self) -> usize {
        FRAME_CATALOG
            .iter()
            .find(|(version, _)| *version == self)
            .map(|(_, len)| *len)
            .unwrap_or(0)
    }

    /// 根据帧长度查找版本
    pub fn from_frame_len(len: usize) -> Option<Self> {
        FRAME_CATALOG
            .iter()
            .find(|(_, expected)| *expected == len)
            .map(|(version, _)| *version)
    }

    /// 计数数组下标
    pub fn index(self) -> usize {
        self as usize
    }

    /// 是否使用 3.x 帧布局
    pub fn is_v3_layout(self) -> bool {
        self >= ProtocolVersion::V3
    }

    /// 对应的固件版本描述
    pub fn firmware_label(self) -> &'static str {
        match self {
            ProtocolVersion::Unknown => "unknown",
            ProtocolVersion::V1 => "< 1.8",
            ProtocolVersion::V2 => "1.8",
            ProtocolVersion::V3 => "3.0-3.1",
            ProtocolVersion::V4 => ">= 3.2",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (firmware {})", self, self.firmware_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_len() {
        assert_eq!(ProtocolVersion::Unknown.expected_len(), 0);
        assert_eq!(ProtocolVersion::V1.expected_len(), 764);
        assert_eq!(ProtocolVersion::V2.expected_len(), 812);
        assert_eq!(ProtocolVersion::V3.expected_len(), 1044);
        assert_eq!(ProtocolVersion::V4.expected_len(), 1060);
    }

    #[test]
    fn test_from_frame_len() {
        for version in ProtocolVersion::ALL_KNOWN {
            assert_eq!(
                ProtocolVersion::from_frame_len(version.expected_len()),
                Some(version)
            );
        }
        assert_eq!(ProtocolVersion::from_frame_len(0), None);
        assert_eq!(ProtocolVersion::from_frame_len(813), None);
    }

    #[test]
    fn test_layout_family() {
        assert!(!ProtocolVersion::V1.is_v3_layout());
        assert!(!ProtocolVersion::V2.is_v3_layout());
        assert!(ProtocolVersion::V3.is_v3_layout());
        assert!(ProtocolVersion::V4.is_v3_layout());
    }

    #[test]
    fn test_index_is_unique() {
        let mut seen = [false; VERSION_COUNT];
        seen[ProtocolVersion::Unknown.index()] = true;
        for version in ProtocolVersion::ALL_KNOWN {
            assert!(!seen[version.index()]);
            seen[version.index()] = true;
        }
    }
}
