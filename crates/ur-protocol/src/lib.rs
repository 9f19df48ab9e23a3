//! # UR Protocol
//!
//! UR 控制器实时接口（端口 30003）协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `catalog`: 固件版本与帧长度对照表
//! - `layout`: 各版本帧内字段偏移表
//! - `feedback`: 反馈帧解析
//! - `control`: URScript 文本指令构建
//! - `pose`: 末端位姿（位置 + 旋转向量）
//!
//! ## 字节序
//!
//! 控制器以网络字节序（大端）发送：前 4 字节为 `i32` 帧长度，
//! 其后每 8 字节为一个 `f64` 字段。本模块提供字节序校正工具函数。

pub mod catalog;
pub mod control;
pub mod feedback;
pub mod layout;
pub mod pose;

// 重新导出常用类型
pub use catalog::*;
pub use control::*;
pub use feedback::*;
pub use layout::FrameLayout;
pub use pose::CartesianPose;

use bytes::BytesMut;
use thiserror::Error;

/// 帧长度头部字节数
pub const HEADER_LEN: usize = 4;

/// 单个 `f64` 字段字节数
pub const FIELD_LEN: usize = 8;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("No frame layout for protocol version {0}")]
    UnknownVersion(ProtocolVersion),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: f64 },
}

/// 帧数据当前所处的字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// 线上字节序（大端，未校正）
    Wire,
    /// 主机字节序（已校正）
    Host,
}

/// 一帧实时反馈数据（原始字节）
///
/// # 生命周期
///
/// 每个周期由重组器从 socket 字节流中切出，随即交给解析器，不会被保留。
///
/// # 字节序
///
/// 构造时处于 [`ByteOrder::Wire`]。调用 [`RtFrame::correct_byte_order`]
/// 后，所有 8 字节字段被原地翻转为主机字节序。[`RtFrame::read_f64`]
/// 在两种状态下都返回正确数值。
#[derive(Debug, Clone)]
pub struct RtFrame {
    bytes: BytesMut,
    order: ByteOrder,
}

impl RtFrame {
    /// 从线上字节构造帧
    pub fn new(bytes: BytesMut) -> Self {
        Self {
            bytes,
            order: ByteOrder::Wire,
        }
    }

    /// 从字节切片构造帧（测试和回放使用）
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(BytesMut::from(data))
    }

    /// 头部声明的帧长度
    ///
    /// 不足 4 字节时返回 `None`。头部不参与 8 字节字段翻转，
    /// 这里总是按大端解析。
    pub fn declared_len(&self) -> Option<i32> {
        declared_length(&self.bytes)
    }

    /// 实际字节数
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 当前字节序
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// 原始字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 将所有 8 字节字段校正为主机字节序
    ///
    /// 重复调用无副作用（已校正的帧不会再次翻转）。
    pub fn correct_byte_order(&mut self) {
        if self.order == ByteOrder::Host {
            return;
        }
        if cfg!(target_endian = "little") {
            let end = self
                .declared_len()
                .map(|len| (len.max(0) as usize).min(self.bytes.len()))
                .unwrap_or(0);
            swap_f64_fields(&mut self.bytes[..end]);
        }
        self.order = ByteOrder::Host;
    }

    /// 读取指定偏移处的 `f64` 字段
    ///
    /// 字段越界时返回 `None`。
    pub fn read_f64(&self, offset: usize) -> Option<f64> {
        let raw: [u8; FIELD_LEN] = self
            .bytes
            .get(offset..offset + FIELD_LEN)?
            .try_into()
            .ok()?;
        Some(match self.order {
            ByteOrder::Wire => f64::from_be_bytes(raw),
            ByteOrder::Host => f64::from_ne_bytes(raw),
        })
    }

    /// 读取从 `offset` 开始的 N 个连续 `f64` 字段
    pub fn read_array<const N: usize>(&self, offset: usize) -> Option<[f64; N]> {
        let mut out = [0.0; N];
        for (i, value) in out.iter_mut().enumerate() {
            *value = self.read_f64(offset + i * FIELD_LEN)?;
        }
        Some(out)
    }
}

/// 解析帧头部声明的长度（大端 `i32`）
pub fn declared_length(bytes: &[u8]) -> Option<i32> {
    let header: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
    Some(bytes_to_i32_be(header))
}

/// 翻转帧内所有 8 字节字段的字节序
///
/// 跳过前 4 字节长度头，从偏移 4 开始以 8 字节为步长逐字段翻转，
/// 末尾不足 8 字节的部分保持不变。该操作是对合的：连续调用两次恢复原始字节。
pub fn swap_f64_fields(frame: &mut [u8]) {
    if frame.len() <= HEADER_LEN {
        return;
    }
    for field in frame[HEADER_LEN..].chunks_exact_mut(FIELD_LEN) {
        field.reverse();
    }
}

/// 大端字节序转 i32
pub fn bytes_to_i32_be(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// i32 转大端字节序
pub fn i32_to_bytes_be(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_length_812() {
        let bytes = [0x00, 0x00, 0x03, 0x2C, 0xAA];
        assert_eq!(declared_length(&bytes), Some(812));
    }

    #[test]
    fn test_declared_length_negative() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(declared_length(&bytes), Some(-1));
    }

    #[test]
    fn test_declared_length_short() {
        assert_eq!(declared_length(&[0x00, 0x01]), None);
    }

    #[test]
    fn test_i32_to_bytes_be() {
        assert_eq!(i32_to_bytes_be(1060), [0x00, 0x00, 0x04, 0x24]);
    }

    #[test]
    fn test_swap_twice_restores_bytes() {
        let original: Vec<u8> = (0u8..28).collect();
        let mut bytes = original.clone();
        swap_f64_fields(&mut bytes);
        assert_ne!(bytes, original);
        // 头部不参与翻转
        assert_eq!(&bytes[..4], &original[..4]);
        assert_eq!(&bytes[4..12], &[11, 10, 9, 8, 7, 6, 5, 4]);
        swap_f64_fields(&mut bytes);
        assert_eq!(bytes, original);
    }

    #[test]
    fn test_swap_leaves_partial_tail() {
        let mut bytes: Vec<u8> = (0u8..16).collect();
        swap_f64_fields(&mut bytes);
        assert_eq!(&bytes[12..], &[12, 13, 14, 15]);
    }

    #[test]
    fn test_read_f64_both_orders() {
        let mut data = Vec::new();
        data.extend_from_slice(&i32_to_bytes_be(20));
        data.extend_from_slice(&1.25f64.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]);

        let mut frame = RtFrame::from_slice(&data);
        assert_eq!(frame.byte_order(), ByteOrder::Wire);
        assert_eq!(frame.read_f64(4), Some(1.25));

        frame.correct_byte_order();
        assert_eq!(frame.byte_order(), ByteOrder::Host);
        assert_eq!(frame.read_f64(4), Some(1.25));

        // 再次校正不会翻回去
        frame.correct_byte_order();
        assert_eq!(frame.read_f64(4), Some(1.25));
    }

    #[test]
    fn test_read_f64_out_of_bounds() {
        let frame = RtFrame::from_slice(&[0, 0, 0, 12, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(frame.read_f64(4).is_some());
        assert!(frame.read_f64(5).is_none());
        assert!(frame.read_array::<2>(4).is_none());
    }
}
