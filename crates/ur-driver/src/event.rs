//! 驱动事件

use crate::mode::OperatingMode;
use std::fmt;
use ur_protocol::ProtocolVersion;

/// 驱动向调用方报告的事件
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// 连接建立
    Connected,
    /// 连接故障或发送失败
    SocketFault,
    /// 当前模式不接受该请求
    RobotNotReady {
        request: &'static str,
        mode: OperatingMode,
    },
    /// 接收超时
    ReceiveTimeout,
    /// 无效数据包（长度头非法或时间不合理）
    InvalidPacket {
        /// 观察到的字节数
        observed_bytes: usize,
        /// 声明长度
        declared_length: i32,
    },
    /// 活动协议版本改变
    VersionChanged {
        from: ProtocolVersion,
        to: ProtocolVersion,
    },
}

impl fmt::Display for DriverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverEvent::Connected => f.write_str("connected"),
            DriverEvent::SocketFault => f.write_str("socket fault"),
            DriverEvent::RobotNotReady { request, mode } => {
                write!(f, "robot not ready for {request} in {mode}")
            },
            DriverEvent::ReceiveTimeout => f.write_str("receive timeout"),
            DriverEvent::InvalidPacket {
                observed_bytes,
                declared_length,
            } => write!(
                f,
                "invalid packet ({observed_bytes} bytes, declared {declared_length})"
            ),
            DriverEvent::VersionChanged { from, to } => {
                write!(f, "protocol version {from} -> {to}")
            },
        }
    }
}
