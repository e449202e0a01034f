//! 错误类型定义模块
//!
//! 定义 SDB 公共组件的错误类型 CommonError 和 Result 别名。

use thiserror::Error;

/// 公共组件错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// ObjectId 字节长度不是 12
    #[error("Invalid ObjectId length: expected 12 bytes, got {0}")]
    InvalidObjectIdLength(usize),

    /// ObjectId 十六进制文本无效
    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    /// 平台探测失败
    #[error("Platform error: {0}")]
    Platform(String),

    /// 配置无效
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type CommonResult<T> = Result<T, CommonError>;
