//! # UR CLI
//!
//! Command-line interface for Universal Robots real-time control.
//!
//! 每个命令独立执行：读取配置 -> 连接 30003 端口 -> 执行操作 -> 断开连接。
//!
//! ```bash
//! # 配置默认控制器地址
//! ur-cli config set --host 192.168.1.10
//!
//! # 监控状态
//! ur-cli monitor --frequency 5
//!
//! # 关节速度运动 2 秒
//! ur-cli speedj --velocities 0.05,0,0,0,0,0 --duration 2
//!
//! # 关节空间点到点
//! ur-cli movej --joints 0,-1.57,1.57,0,1.57,0
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod session;
mod validation;

use commands::{
    ConfigCommand, FreeDriveCommand, MonitorCommand, MoveJCommand, MoveLCommand, SimpleCommand,
    SpeedJCommand, SpeedLCommand,
};

/// UR CLI - 机械臂实时接口命令行工具
#[derive(Parser, Debug)]
#[command(name = "ur-cli")]
#[command(about = "Command-line interface for UR real-time control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 监控机器人状态
    Monitor(MonitorCommand),

    /// 关节速度运动
    Speedj(SpeedJCommand),

    /// 工具速度运动
    Speedl(SpeedLCommand),

    /// 关节空间点到点运动
    Movej(MoveJCommand),

    /// 工具空间直线运动
    Movel(MoveLCommand),

    /// 示教（自由拖动）
    Freedrive(FreeDriveCommand),

    /// 关节减速停止
    Stop(SimpleCommand),

    /// 断开电机电源
    Powerdown(SimpleCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ur_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Monitor(cmd) => cmd.execute(),
        Commands::Speedj(cmd) => cmd.execute(),
        Commands::Speedl(cmd) => cmd.execute(),
        Commands::Movej(cmd) => cmd.execute(),
        Commands::Movel(cmd) => cmd.execute(),
        Commands::Freedrive(cmd) => cmd.execute(),
        Commands::Stop(cmd) => cmd.stop(),
        Commands::Powerdown(cmd) => cmd.powerdown(),
    }
}
