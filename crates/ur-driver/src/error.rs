//! 驱动层错误类型定义

use thiserror::Error;
use ur_net::NetError;
use ur_protocol::ProtocolError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Net(#[from] NetError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置错误（如主机地址为空）
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 请求通道已关闭（驱动已释放）
    #[error("Request channel closed")]
    ChannelClosed,

    /// 请求通道已满
    #[error("Request channel full (buffer size: {0})")]
    ChannelFull(usize),

    /// 等待反馈时驱动未连接
    #[error("Not connected")]
    NotConnected,
}
