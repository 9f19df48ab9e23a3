//! TCP 传输实现
//!
//! 控制器实时接口为单条 TCP 连接：控制器约每 8ms 推送一帧二进制数据，
//! 客户端在同一连接上写入 URScript 文本。

use crate::{NetError, RtTransport};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 默认连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// 丢弃积压数据时使用的临时缓冲区大小
const DISCARD_CHUNK: usize = 4096;

/// TCP 传输
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// 创建未连接的传输
    ///
    /// # Errors
    /// - `NetError::InvalidAddress`: 主机地址为空
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, NetError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(NetError::InvalidAddress(host));
        }
        Ok(Self {
            host,
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: None,
        })
    }

    /// 设置连接超时
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 目标主机
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 目标端口
    pub fn port(&self) -> u16 {
        self.port
    }

    fn resolve(&self) -> Result<SocketAddr, NetError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| NetError::InvalidAddress(self.host.clone()))?
            .next()
            .ok_or_else(|| NetError::InvalidAddress(self.host.clone()))
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, NetError> {
        self.stream.as_mut().ok_or(NetError::NotConnected)
    }
}

impl RtTransport for TcpTransport {
    fn connect(&mut self) -> Result<(), NetError> {
        self.close();
        let addr = self.resolve()?;
        info!("Connecting to {} ({}) ...", self.host, addr);
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        self.stream = Some(stream);
        info!("Connected to {}:{}", self.host, self.port);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError> {
        let stream = self.stream_mut()?;
        // 零超时对 set_read_timeout 非法
        let timeout = timeout.max(Duration::from_millis(1));
        stream.set_read_timeout(Some(timeout))?;
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(NetError::Closed),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(NetError::Timeout)
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => Err(NetError::Timeout),
            Err(e) => Err(NetError::Io(e)),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<(), NetError> {
        let stream = self.stream_mut()?;
        stream.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("Closed connection to {}:{}", self.host, self.port);
        }
    }

    fn discard_pending(&mut self) -> Result<usize, NetError> {
        let stream = self.stream_mut()?;
        stream.set_nonblocking(true)?;
        let mut scratch = [0u8; DISCARD_CHUNK];
        let mut discarded = 0;
        let result = loop {
            match stream.read(&mut scratch) {
                Ok(0) => break Err(NetError::Closed),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(discarded),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(NetError::Io(e)),
            }
        };
        stream.set_nonblocking(false)?;
        result
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_empty_host_rejected() {
        assert!(matches!(
            TcpTransport::new("", 30003),
            Err(NetError::InvalidAddress(_))
        ));
        assert!(matches!(
            TcpTransport::new("   ", 30003),
            Err(NetError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_not_connected() {
        let mut t = TcpTransport::new("127.0.0.1", 30003).unwrap();
        assert!(!t.is_connected());
        let mut buf = [0u8; 8];
        assert!(matches!(
            t.receive_timeout(&mut buf, Duration::from_millis(1)),
            Err(NetError::NotConnected)
        ));
        assert!(matches!(t.send(b"x"), Err(NetError::NotConnected)));
    }

    #[test]
    fn test_loopback_receive_send_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut t = TcpTransport::new("127.0.0.1", port).unwrap();
        t.connect().unwrap();
        let (mut server, _) = listener.accept().unwrap();

        // 无数据时超时
        let mut buf = [0u8; 64];
        assert!(matches!(
            t.receive_timeout(&mut buf, Duration::from_millis(10)),
            Err(NetError::Timeout)
        ));

        server.write_all(&[1, 2, 3, 4]).unwrap();
        let n = t.receive_timeout(&mut buf, Duration::from_millis(500)).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);

        t.send_str("stopj(1.4)\n").unwrap();
        let mut text = [0u8; 11];
        server.read_exact(&mut text).unwrap();
        assert_eq!(&text, b"stopj(1.4)\n");

        // 对端关闭
        drop(server);
        assert!(matches!(
            t.receive_timeout(&mut buf, Duration::from_millis(500)),
            Err(NetError::Closed) | Err(NetError::Io(_))
        ));
    }
}
