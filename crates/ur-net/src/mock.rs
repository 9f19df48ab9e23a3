//! 脚本化内存传输
//!
//! 测试代码通过 [`MockHandle`] 预置每次接收的结果并检查已发送的文本，
//! 无需真实控制器。

use crate::{NetError, RtTransport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// 单次接收的预置结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    /// 返回这些字节（超出接收缓冲区的部分留给下一次接收）
    Data(Vec<u8>),
    /// 超时
    Timeout,
    /// 连接故障
    Fault,
}

#[derive(Debug, Default)]
struct MockState {
    reads: VecDeque<MockRead>,
    sent: Vec<String>,
    connected: bool,
    refuse_connect: bool,
    fail_sends: bool,
    pending: usize,
    connect_attempts: usize,
}

/// 测试侧句柄（与 [`MockTransport`] 共享状态）
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 追加一次接收结果
    pub fn push_read(&self, read: MockRead) {
        self.lock().reads.push_back(read);
    }

    /// 追加一次数据接收
    pub fn push_data(&self, data: impl Into<Vec<u8>>) {
        self.push_read(MockRead::Data(data.into()));
    }

    /// 已发送的文本（按发送顺序）
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// 取出并清空已发送的文本
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().sent)
    }

    /// 设置后续发送是否失败
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// 设置后续连接是否被拒绝
    pub fn set_refuse_connect(&self, refuse: bool) {
        self.lock().refuse_connect = refuse;
    }

    /// 设置连接建立后待丢弃的积压字节数
    pub fn set_pending(&self, bytes: usize) {
        self.lock().pending = bytes;
    }

    /// 尚未被丢弃的积压字节数
    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    /// 当前是否处于连接状态
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// 连接尝试次数
    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    /// 剩余未消费的接收结果数
    pub fn remaining_reads(&self) -> usize {
        self.lock().reads.len()
    }
}

/// 脚本化内存传输
#[derive(Debug)]
pub struct MockTransport {
    handle: MockHandle,
}

impl MockTransport {
    /// 创建传输及其测试句柄
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle {
            state: Arc::new(Mutex::new(MockState::default())),
        };
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl RtTransport for MockTransport {
    fn connect(&mut self) -> Result<(), NetError> {
        let mut state = self.handle.lock();
        state.connect_attempts += 1;
        if state.refuse_connect {
            return Err(NetError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock connection refused",
            )));
        }
        state.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.lock().connected
    }

    fn receive_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, NetError> {
        let mut state = self.handle.lock();
        if !state.connected {
            return Err(NetError::NotConnected);
        }
        match state.reads.pop_front() {
            None | Some(MockRead::Timeout) => Err(NetError::Timeout),
            Some(MockRead::Fault) => Err(NetError::Closed),
            Some(MockRead::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    state.reads.push_front(MockRead::Data(rest));
                }
                Ok(n)
            },
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<(), NetError> {
        let mut state = self.handle.lock();
        if !state.connected {
            return Err(NetError::NotConnected);
        }
        if state.fail_sends {
            return Err(NetError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock send failure",
            )));
        }
        state.sent.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn close(&mut self) {
        self.handle.lock().connected = false;
    }

    fn discard_pending(&mut self) -> Result<usize, NetError> {
        Ok(std::mem::take(&mut self.handle.lock().pending))
    }
}
