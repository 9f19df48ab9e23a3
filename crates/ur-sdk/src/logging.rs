//! 日志初始化
//!
//! 全局 `tracing` subscriber（`RUST_LOG` 优先）加上 `log` 记录桥接。

use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时的默认过滤规则
pub const DEFAULT_LOG_FILTER: &str = "info";

/// 以默认过滤规则初始化日志
///
/// 可重复调用：已有全局 subscriber 时不做任何事并返回 `false`。
pub fn init_logger() -> bool {
    init_logger_with(DEFAULT_LOG_FILTER)
}

/// 以指定的默认过滤规则初始化日志
///
/// `RUST_LOG` 存在时以其为准。返回本次调用是否安装了全局 subscriber。
pub fn init_logger_with(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }

    // 依赖 `log` 的第三方库经由桥接进入同一个 subscriber
    if let Err(e) = tracing_log::LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init()
    {
        tracing::debug!("log bridge already installed: {}", e);
    }
    true
}
