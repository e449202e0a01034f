use std::fmt;

pub const EOD: u8 = 0x00;

/// 空文档: 4 字节长度 + EOD
pub const MIN_DOCUMENT_SIZE: usize = 5;
pub const OBJECT_ID_SIZE: usize = 12;

pub(crate) const DATETIME_SERDE_NAME: &str = "$__sdb_datetime";
pub(crate) const TIMESTAMP_SERDE_NAME: &str = "$__sdb_timestamp";
pub(crate) const REGEX_SERDE_NAME: &str = "$__sdb_regex";
pub(crate) const BINARY_SERDE_NAME: &str = "$__sdb_binary";
pub(crate) const ORDER_KEY_SERDE_NAME: &str = "$__sdb_order_key";
pub(crate) use sdb_common::types::OBJECT_ID_SERDE_NAME;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Bool = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::Document),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x06 => Some(Self::Undefined),
            0x07 => Some(Self::ObjectId),
            0x08 => Some(Self::Bool),
            0x09 => Some(Self::DateTime),
            0x0A => Some(Self::Null),
            0x0B => Some(Self::Regex),
            0x0C => Some(Self::DbPointer),
            0x0D => Some(Self::JavaScript),
            0x0E => Some(Self::Symbol),
            0x0F => Some(Self::JavaScriptWithScope),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Timestamp),
            0x12 => Some(Self::Int64),
            0x7F => Some(Self::MaxKey),
            0xFF => Some(Self::MinKey),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 废弃或不支持的类型在解码时报错
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            Self::Undefined
                | Self::DbPointer
                | Self::JavaScript
                | Self::Symbol
                | Self::JavaScriptWithScope
        )
    }

    /// 定长类型的值长度, 变长类型返回 None
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Double | Self::DateTime | Self::Timestamp | Self::Int64 => Some(8),
            Self::Int32 => Some(4),
            Self::Bool => Some(1),
            Self::ObjectId => Some(OBJECT_ID_SIZE),
            Self::Null | Self::MinKey | Self::MaxKey => Some(0),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::String => "string",
            Self::Document => "document",
            Self::Array => "array",
            Self::Binary => "binary",
            Self::Undefined => "undefined",
            Self::ObjectId => "objectId",
            Self::Bool => "bool",
            Self::DateTime => "date",
            Self::Null => "null",
            Self::Regex => "regex",
            Self::DbPointer => "dbPointer",
            Self::JavaScript => "javascript",
            Self::Symbol => "symbol",
            Self::JavaScriptWithScope => "javascriptWithScope",
            Self::Int32 => "int",
            Self::Timestamp => "timestamp",
            Self::Int64 => "long",
            Self::MaxKey => "maxKey",
            Self::MinKey => "minKey",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.as_u8())
    }
}

/// 二进制子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinarySubtype {
    Generic,
    Function,
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    /// 0x06..=0x7F 之间的保留值
    Reserved(u8),
    /// 0x80 及以上的用户自定义值
    UserDefined(u8),
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::Generic,
            0x01 => Self::Function,
            0x02 => Self::BinaryOld,
            0x03 => Self::UuidOld,
            0x04 => Self::Uuid,
            0x05 => Self::Md5,
            b if b >= 0x80 => Self::UserDefined(b),
            b => Self::Reserved(b),
        }
    }
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> u8 {
        match subtype {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::Reserved(b) | BinarySubtype::UserDefined(b) => b,
        }
    }
}

impl Default for BinarySubtype {
    fn default() -> Self {
        Self::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_round_trip() {
        for byte in 0u8..=0xFF {
            if let Some(t) = ElementType::from_u8(byte) {
                assert_eq!(t.as_u8(), byte);
            }
        }
        assert_eq!(ElementType::from_u8(0x00), None);
        assert_eq!(ElementType::from_u8(0x13), None);
        assert_eq!(ElementType::from_u8(0xFF), Some(ElementType::MinKey));
    }

    #[test]
    fn test_deprecated_types_unsupported() {
        for byte in [0x06, 0x0C, 0x0D, 0x0E, 0x0F] {
            assert!(!ElementType::from_u8(byte).unwrap().is_supported());
        }
        assert!(ElementType::Timestamp.is_supported());
    }

    #[test]
    fn test_binary_subtype() {
        assert_eq!(BinarySubtype::from(0x04), BinarySubtype::Uuid);
        assert_eq!(BinarySubtype::from(0x80), BinarySubtype::UserDefined(0x80));
        assert_eq!(BinarySubtype::from(0x20), BinarySubtype::Reserved(0x20));
        assert_eq!(u8::from(BinarySubtype::UserDefined(0x99)), 0x99);
    }
}
