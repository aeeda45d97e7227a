//! # Dispatcher
//!
//! 请求分发模块。
//!
//! 负责：
//! - 请求协议状态机（首个索引、整片、按子系统、按块）
//! - 缺失索引上报与 STOP / EOF 命令
//! - 监控直方图的周期发布
//! - 传输通道（TCP、日志、内存）

pub mod channels;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod publisher;
pub mod server;

pub use channels::{
    LogChannel, MemoryChannel, MemoryRequestChannel, OutputChannel, TcpPushChannel,
    TcpRequestChannel,
};
pub use commands::CommandChannel;
pub use dispatcher::{DispatchState, Dispatcher};
pub use error::DispatchError;
pub use publisher::{config_parts, MonitorPublisher};
pub use server::{serve, ServeOutcome};
