//! # Split Engine
//!
//! 按子系统 / 按块拆分时间片（timeslice）。
//!
//! 负责：
//! - 有界缓冲（high-water mark，最旧优先淘汰）
//! - 每个目标至多一次的投递标记
//! - 组件位置表（首个时间片时解析，之后复用）
//!
//! ## 使用示例
//!
//! ```ignore
//! use split_engine::SplitEngine;
//!
//! let mut engine = SplitEngine::from_settings(&settings);
//!
//! if let Some(target) = SplitEngine::system_position("0x10") {
//!     let view = engine.combine(target, &mut ingestor, &mut signals).await?;
//! }
//! ```

mod buffer;
mod engine;
mod error;
mod targets;

pub use buffer::TimesliceBuffer;
pub use engine::SplitEngine;
pub use error::SplitError;
pub use targets::{describe_systems, resolve_blocks, resolve_systems};
