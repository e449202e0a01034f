//! 编解码配置
//!
//! 文档构建器和校验器读取的参数, 支持 serde 以便嵌入上层配置文件。

use crate::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};

/// 文档上限, 与 MongoDB 服务端保持一致
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub byte_order: ByteOrderSetting,
    pub initial_capacity: usize,
    pub max_document_size: usize,
    pub max_nesting_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrderSetting::Native,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl CodecConfig {
    /// 检查参数取值
    ///
    /// # Returns
    /// 文档上限小于最小文档(5 字节)、超出 int32 或嵌套深度为 0 时返回错误
    pub fn validate(&self) -> CommonResult<()> {
        if self.max_document_size < 5 || self.max_document_size > i32::MAX as usize {
            return Err(CommonError::InvalidConfig(format!(
                "max_document_size must be within 5..={}, got {}",
                i32::MAX,
                self.max_document_size
            )));
        }
        if self.max_nesting_depth == 0 {
            return Err(CommonError::InvalidConfig(
                "max_nesting_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// 文档字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrderSetting {
    /// 启动时探测本机字节序
    #[default]
    Native,
    Little,
    Big,
}

impl ByteOrderSetting {
    /// 解析为具体字节序, true 表示小端
    pub fn is_little_endian(self) -> bool {
        match self {
            ByteOrderSetting::Native => crate::platform::native_is_little_endian(),
            ByteOrderSetting::Little => true,
            ByteOrderSetting::Big => false,
        }
    }
}
