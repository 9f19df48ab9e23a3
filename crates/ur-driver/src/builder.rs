//! Builder 模式实现
//!
//! 链式配置目标控制器地址与驱动参数。

use crate::driver::UrDriver;
use crate::error::DriverError;
use crate::pipeline::DriverConfig;
use std::time::Duration;
use ur_net::{RT_PORT, RtTransport, TcpTransport};

/// 驱动 Builder
///
/// # Example
///
/// ```no_run
/// use ur_driver::{DriverConfig, UrBuilder};
///
/// let mut driver = UrBuilder::new()
///     .host("192.168.1.10")
///     .config(DriverConfig::default())
///     .build()
///     .unwrap();
/// driver.connect().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct UrBuilder {
    /// 控制器主机名或 IP
    host: Option<String>,
    /// 端口（默认 30003）
    port: Option<u16>,
    connect_timeout: Option<Duration>,
    config: Option<DriverConfig>,
}

impl UrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置控制器地址（必需）
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 覆盖端口（仅用于转发或仿真器）
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// TCP 连接超时
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// 驱动配置
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 构建 TCP 驱动（未连接）
    ///
    /// # Errors
    /// - `DriverError::Config`: 未设置主机地址或地址为空
    pub fn build(self) -> Result<UrDriver<TcpTransport>, DriverError> {
        let host = self
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| DriverError::Config("controller host address is empty".into()))?;

        let mut transport = TcpTransport::new(host, self.port.unwrap_or(RT_PORT))?;
        if let Some(timeout) = self.connect_timeout {
            transport = transport.with_connect_timeout(timeout);
        }
        Ok(self.build_with(transport))
    }

    /// 使用自定义传输构建（测试或仿真）
    pub fn build_with<T: RtTransport>(self, transport: T) -> UrDriver<T> {
        UrDriver::new(transport, self.config.unwrap_or_default())
    }
}
