//! 命令定义和实现

pub mod config;
pub mod monitor;
pub mod motion;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
pub use motion::{
    FreeDriveCommand, MoveJCommand, MoveLCommand, SimpleCommand, SpeedJCommand, SpeedLCommand,
};
