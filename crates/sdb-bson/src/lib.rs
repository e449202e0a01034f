//! # sdb-bson - BSON 编解码核心
//!
//! 实现 BSON 二进制文档格式的构建与解析:
//!
//! - **字节序抽象**：小端/大端两种实现, 启动时探测本机字节序作为默认值
//! - **增量构建器**：单一缓冲区 + 偏移量的嵌套文档/数组构建, 子作用域通过令牌交还父构建器
//! - **惰性迭代器**：逐元素校验并解码, 嵌套文档和二进制数据以零拷贝切片返回
//! - **动态分派**：`Append` trait 将任意 Rust 值映射到对应的 BSON 类型
//! - **Serde 集成**：结构体与文档之间的双向映射
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use sdb_bson::Builder;
//!
//! let mut builder = Builder::new();
//! builder.append_string("outer", "hello")?;
//! let mut obj = builder.start_document("obj")?;
//! obj.append_string("inner", "world")?;
//! obj.finish()?;
//! let scope = obj.into_scope();
//! builder.end_document(scope)?;
//! builder.finish()?;
//!
//! let doc = builder.into_document()?;
//! assert_eq!(doc.to_string(), r#"{"outer":"hello", "obj":{"inner":"world"}}"#);
//! ```

pub mod spec;
pub mod byte_order;
pub mod builder;
pub mod array_builder;
pub mod document;
pub mod iter;
pub mod value;
pub mod doc;
pub mod dispatch;
pub mod ser;
pub mod de;
pub mod json;

pub use array_builder::ArrayBuilder;
pub use builder::{Builder, Scope};
pub use byte_order::{BigEndian, ByteOrder, Endian, LittleEndian};
pub use de::{from_doc, from_document, from_value};
pub use dispatch::Append;
pub use doc::{Doc, DocElement, Map};
pub use document::{Array, Document};
pub use iter::{Element, Iter};
pub use json::{from_json, to_json};
pub use sdb_common::{CodecConfig, IdGenerator, ObjectId};
pub use ser::{to_document, to_value};
pub use spec::{BinarySubtype, ElementType};
pub use value::{Binary, DateTime, OrderKey, Regex, Timestamp, Value};

use std::fmt;
use thiserror::Error;

/// BSON 操作的错误类型
///
/// 按来源分为四类, 见 [`ErrorCategory`]。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BsonError {
    /// 构建器已经调用过 finish
    #[error("Builder already finished")]
    Finished,

    /// 构建器尚未 finish
    #[error("Builder not finished")]
    NotFinished,

    /// 存在尚未结束的子文档/子数组
    #[error("Builder has an open child scope")]
    ChildOpen,

    /// 结束子作用域时并没有打开的子作用域
    #[error("No child scope is open")]
    NoChildOpen,

    /// 作用域令牌与当前打开的子作用域不匹配
    #[error("Scope does not match the open child: expected {expected} at {offset}")]
    ScopeMismatch { expected: ElementType, offset: usize },

    /// 子构建器在结束前没有 finish
    #[error("Child scope not finished")]
    ChildNotFinished,

    /// 父子文档字节序不一致
    #[error("Byte order mismatch: parent {parent:?}, child {child:?}")]
    ByteOrderMismatch { parent: Endian, child: Endian },

    /// 子构建器不能脱离父构建器单独产出文档
    #[error("Nested builder cannot be detached from its parent")]
    NotTopLevel,

    /// 长度前缀与实际字节数不一致
    #[error("Length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: i64, actual: usize },

    /// 缓冲区空间不足
    #[error("Truncated input: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// C 字符串缺少结尾的 0x00
    #[error("Unterminated cstring at offset {0}")]
    UnterminatedCString(usize),

    /// 文档缺少结尾的 0x00
    #[error("Missing document terminator")]
    MissingTerminator,

    /// EOD 之后仍有字节
    #[error("Unexpected bytes after end of document at offset {0}")]
    TrailingBytes(usize),

    /// 值的长度前缀无效
    #[error("Invalid length {length} at offset {offset}")]
    InvalidLength { length: i32, offset: usize },

    /// 无法识别的类型标记
    #[error("Unknown element type: 0x{0:02X}")]
    UnknownElementType(u8),

    /// 已废弃或不支持的类型标记
    #[error("Unsupported element type: {0}")]
    UnsupportedElementType(ElementType),

    /// 字符串不是有效的 UTF-8 编码
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// 文档体积超出限制
    #[error("Document too large: {size} bytes, max {max}")]
    DocumentTooLarge { size: usize, max: usize },

    /// 元素类型与访问方法不符
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: ElementType, actual: ElementType },

    /// BSON 没有 uint64 类型
    #[error("bson has no uint64 type, and value {0} is too large to fit in an int64")]
    UnsignedOverflow(u64),

    /// 无法映射到 BSON 的值
    #[error("Unsupported value type: {0}")]
    UnsupportedValue(String),

    /// ObjectId 长度不是 12
    #[error("Invalid ObjectId length: {0}")]
    InvalidObjectId(usize),

    /// 二进制数据为空指针
    #[error("Binary payload is missing")]
    MissingBinary,

    /// 名称、正则等 C 字符串内含 0x00
    #[error("Embedded NUL in cstring {0:?}")]
    InvalidCString(String),

    /// 排序哨兵只能是 MinKey 或 MaxKey
    #[error("Invalid order key: {0}")]
    InvalidOrderKey(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 反序列化错误
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 调用方误用构建器
    Misuse,
    /// 输入字节不是合法文档
    Malformed,
    /// 值无法用 BSON 表示
    Unrepresentable,
    /// serde 映射失败
    Conversion,
}

impl BsonError {
    pub fn category(&self) -> ErrorCategory {
        use BsonError::*;
        match self {
            Finished | NotFinished | ChildOpen | NoChildOpen | ScopeMismatch { .. }
            | ChildNotFinished | ByteOrderMismatch { .. } | NotTopLevel | TypeMismatch { .. } => {
                ErrorCategory::Misuse
            }
            LengthMismatch { .. } | Truncated { .. } | UnterminatedCString(_) | MissingTerminator
            | TrailingBytes(_) | InvalidLength { .. } | UnknownElementType(_)
            | UnsupportedElementType(_) | InvalidUtf8(_) | NestingTooDeep(_) => {
                ErrorCategory::Malformed
            }
            UnsignedOverflow(_) | UnsupportedValue(_) | InvalidObjectId(_) | MissingBinary
            | InvalidCString(_) | InvalidOrderKey(_) | DocumentTooLarge { .. } => {
                ErrorCategory::Unrepresentable
            }
            Serialization(_) | Deserialization(_) => ErrorCategory::Conversion,
        }
    }
}

impl serde::ser::Error for BsonError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BsonError::Serialization(msg.to_string())
    }
}

impl serde::de::Error for BsonError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BsonError::Deserialization(msg.to_string())
    }
}

pub type BsonResult<T> = Result<T, BsonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(BsonError::Finished.category(), ErrorCategory::Misuse);
        assert_eq!(
            BsonError::LengthMismatch { declared: 9, actual: 5 }.category(),
            ErrorCategory::Malformed
        );
        assert_eq!(BsonError::UnsignedOverflow(u64::MAX).category(), ErrorCategory::Unrepresentable);
        assert_eq!(BsonError::MissingBinary.category(), ErrorCategory::Unrepresentable);
    }

    #[test]
    fn test_unsigned_overflow_message() {
        let err = BsonError::UnsignedOverflow(9_223_372_036_854_775_808);
        assert!(err.to_string().contains("bson has no uint64 type"));
    }
}
