//! # UR Net Transport Layer
//!
//! 实时接口传输层抽象，提供统一的收发接口。
//!
//! - `tcp`: 基于 `std::net::TcpStream` 的实现（端口 30003）
//! - `mock`: 脚本化的内存传输（`mock` feature，用于测试）

use std::time::Duration;
use thiserror::Error;

pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tcp::TcpTransport;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockRead, MockTransport};

/// 实时接口固定端口
pub const RT_PORT: u16 = 30003;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum NetError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Closed,
    #[error("Not connected")]
    NotConnected,
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),
}

impl NetError {
    /// 是否为连接级故障（需要断开并重连）
    ///
    /// 超时不属于故障。
    pub fn is_fault(&self) -> bool {
        !matches!(self, NetError::Timeout)
    }
}

/// 实时接口传输
///
/// 单线程使用：驱动在每个周期内调用一次 `receive_timeout`，
/// 并在同一线程内发送 URScript 文本。
pub trait RtTransport {
    /// 建立连接
    fn connect(&mut self) -> Result<(), NetError>;

    /// 是否已连接
    fn is_connected(&self) -> bool;

    /// 带超时接收
    ///
    /// # 返回
    /// - `Ok(n)`: 收到 `n > 0` 字节
    /// - `Err(NetError::Timeout)`: 超时内无数据
    /// - `Err(NetError::Closed)`: 对端关闭
    /// - 其他错误：连接故障
    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError>;

    /// 发送全部字节
    fn send(&mut self, data: &[u8]) -> Result<(), NetError>;

    /// 关闭连接（幂等）
    fn close(&mut self);

    /// 丢弃接收缓冲区中已到达的数据，返回丢弃的字节数
    fn discard_pending(&mut self) -> Result<usize, NetError> {
        Ok(0)
    }

    /// 发送文本指令
    fn send_str(&mut self, text: &str) -> Result<(), NetError> {
        self.send(text.as_bytes())
    }
}

impl<T: RtTransport + ?Sized> RtTransport for Box<T> {
    fn connect(&mut self) -> Result<(), NetError> {
        (**self).connect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError> {
        (**self).receive_timeout(buf, timeout)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), NetError> {
        (**self).send(data)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn discard_pending(&mut self) -> Result<usize, NetError> {
        (**self).discard_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_not_fault() {
        assert!(!NetError::Timeout.is_fault());
        assert!(NetError::Closed.is_fault());
        assert!(NetError::NotConnected.is_fault());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(NetError::from(io).is_fault());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(NetError::Timeout.to_string(), "Read timeout");
        assert_eq!(
            NetError::InvalidAddress(String::new()).to_string(),
            "Invalid address: \"\""
        );
    }

    #[test]
    fn test_boxed_transport() {
        let (mock, handle) = MockTransport::new();
        let mut boxed: Box<dyn RtTransport> = Box::new(mock);
        boxed.connect().unwrap();
        assert!(boxed.is_connected());
        boxed.send_str("stopj(1.4)\n").unwrap();
        assert_eq!(handle.sent(), vec!["stopj(1.4)\n".to_string()]);
    }
}
