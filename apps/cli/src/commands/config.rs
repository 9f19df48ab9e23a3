//! 配置管理命令
//!
//! CLI 配置保存在 `<config_dir>/ur-rt/config.toml`。

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件路径
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("ur-rt");
    Ok(path)
}

pub fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认控制器地址
    pub host: Option<String>,

    /// 端口（默认 30003）
    pub port: Option<u16>,

    /// 接收超时（毫秒）
    pub receive_timeout_ms: Option<u64>,

    /// 是否启用时间合理性检查
    pub time_check: Option<bool>,

    /// 断线重连间隔（毫秒），未设置时不重连
    pub reconnect_interval_ms: Option<u64>,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认配置）
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    /// 从指定路径加载
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    /// 保存到指定路径（自动创建目录）
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# UR CLI Configuration\n\n{content}"))
            .context("写入配置文件失败")?;

        Ok(())
    }

    /// 按名称读取单个配置项
    pub fn get(&self, key: &str) -> Option<Option<String>> {
        let value = match key {
            "host" => self.host.clone(),
            "port" => self.port.map(|v| v.to_string()),
            "receive_timeout_ms" => self.receive_timeout_ms.map(|v| v.to_string()),
            "time_check" => self.time_check.map(|v| v.to_string()),
            "reconnect_interval_ms" => self.reconnect_interval_ms.map(|v| v.to_string()),
            _ => return None,
        };
        Some(value)
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 控制器地址（如 192.168.1.10）
        #[arg(long)]
        host: Option<String>,

        /// 端口
        #[arg(long)]
        port: Option<u16>,

        /// 接收超时（毫秒）
        #[arg(long)]
        receive_timeout_ms: Option<u64>,

        /// 启用/关闭时间合理性检查
        #[arg(long)]
        time_check: Option<bool>,

        /// 断线重连间隔（毫秒）
        #[arg(long)]
        reconnect_interval_ms: Option<u64>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 显示配置文件路径与内容
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        let path = config_file()?;
        self.execute_at(&path)
    }

    fn execute_at(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                host,
                port,
                receive_timeout_ms,
                time_check,
                reconnect_interval_ms,
            } => {
                let mut config = CliConfig::load_from(path)?;
                if let Some(host) = host {
                    if host.trim().is_empty() {
                        anyhow::bail!("控制器地址不能为空");
                    }
                    println!("✅ 设置控制器地址: {host}");
                    config.host = Some(host);
                }
                if let Some(port) = port {
                    println!("✅ 设置端口: {port}");
                    config.port = Some(port);
                }
                if let Some(ms) = receive_timeout_ms {
                    println!("✅ 设置接收超时: {ms} ms");
                    config.receive_timeout_ms = Some(ms);
                }
                if let Some(enabled) = time_check {
                    println!("✅ 设置时间检查: {enabled}");
                    config.time_check = Some(enabled);
                }
                if let Some(ms) = reconnect_interval_ms {
                    println!("✅ 设置重连间隔: {ms} ms");
                    config.reconnect_interval_ms = Some(ms);
                }
                config.save_to(path)
            },

            ConfigCommand::Get { key } => {
                let config = CliConfig::load_from(path)?;
                match config.get(&key) {
                    Some(Some(value)) => println!("{value}"),
                    Some(None) => println!("(未设置)"),
                    None => {
                        println!("UR CLI 配置:");
                        print!("{}", toml::to_string_pretty(&config)?);
                    },
                }
                Ok(())
            },

            ConfigCommand::Check => {
                let config = CliConfig::load_from(path)?;
                println!("配置文件: {}", path.display());
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            },
        }
    }
}
