//! 帧重组
//!
//! 单条 TCP 流上的字节按长度头切分为完整帧：
//! - 缓冲区不足 4 字节，或声明长度合法但尚未收齐：保留，等待下一次接收
//! - 声明长度 `<= 0` 或超过缓冲区容量：整体丢弃，报告无效数据包
//! - 声明长度已收齐：取出一帧，余下字节留给下一周期
//!
//! 每周期最多取出一帧。

use bytes::BytesMut;
use std::time::Duration;
use ur_net::{NetError, RtTransport};
use ur_protocol::{RtFrame, declared_length};

/// 默认缓冲区容量（大于任何目录帧长）
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// 取帧结果
#[derive(Debug)]
pub enum Reassembly {
    /// 完整帧
    Frame(RtFrame),
    /// 数据不足，已保留
    Incomplete,
    /// 长度头非法，缓冲区已清空
    Invalid {
        /// 丢弃前缓冲区中的字节数
        observed: usize,
        /// 声明长度
        declared: i32,
    },
}

/// 帧重组缓冲区
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: BytesMut,
    capacity: usize,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// 缓冲区容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前缓存的字节数
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 丢弃全部缓存
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// 追加字节（超出容量的部分被截断）
    pub fn extend(&mut self, data: &[u8]) {
        let room = self.capacity.saturating_sub(self.buffer.len());
        self.buffer.extend_from_slice(&data[..data.len().min(room)]);
    }

    /// 从传输层接收一次，追加到缓存末尾
    ///
    /// 返回本次收到的字节数。出错时缓存内容保持不变。
    pub fn fill_from<T: RtTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<usize, NetError> {
        let start = self.buffer.len();
        if start >= self.capacity {
            return Ok(0);
        }
        self.buffer.resize(self.capacity, 0);
        match transport.receive_timeout(&mut self.buffer[start..], timeout) {
            Ok(n) => {
                self.buffer.truncate(start + n);
                Ok(n)
            },
            Err(e) => {
                self.buffer.truncate(start);
                Err(e)
            },
        }
    }

    /// 尝试取出一帧
    pub fn take_frame(&mut self) -> Reassembly {
        let available = self.buffer.len();
        let Some(declared) = declared_length(&self.buffer) else {
            return Reassembly::Incomplete;
        };

        if declared <= 0 || declared as usize > self.capacity {
            self.buffer.clear();
            return Reassembly::Invalid {
                observed: available,
                declared,
            };
        }

        let len = declared as usize;
        if len > available {
            return Reassembly::Incomplete;
        }
        Reassembly::Frame(RtFrame::new(self.buffer.split_to(len)))
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}
