//! SDB 公共组件
//!
//! 所有 SDB 子模块共享的基础类型:
//! - ObjectId 与进程级 IdGenerator
//! - 编解码配置 CodecConfig
//! - 平台探测(主机名、进程号、安全随机数)

pub mod error;
pub mod types;
pub mod config;
pub mod platform;

pub use config::{ByteOrderSetting, CodecConfig};
pub use error::{CommonError, CommonResult};
pub use types::*;
