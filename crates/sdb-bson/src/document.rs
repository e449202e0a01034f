//! 只读文档视图
//!
//! `Document` 包装一段已完成的文档字节(借用切片或共享的 `Bytes`),
//! 构造时只检查头部(长度前缀与结尾 EOD), 元素在迭代时按需校验。

use crate::byte_order::{ByteOrder, Endian};
use crate::doc::{Doc, Map};
use crate::iter::{Element, Iter};
use crate::spec::*;
use crate::value::Value;
use crate::{BsonError, BsonResult};
use bytes::Bytes;
use sdb_common::config::DEFAULT_MAX_NESTING_DEPTH;
use sdb_common::CodecConfig;
use std::fmt;
use tracing::debug;

#[derive(Clone)]
enum RawBytes<'a> {
    Borrowed(&'a [u8]),
    Shared(Bytes),
}

/// 已完成的文档
#[derive(Clone)]
pub struct Document<'a> {
    raw: RawBytes<'a>,
    order: Endian,
}

/// 检查长度前缀和结尾的 EOD
fn check_header(bytes: &[u8], order: Endian) -> BsonResult<()> {
    if bytes.len() < MIN_DOCUMENT_SIZE {
        return Err(BsonError::Truncated {
            need: MIN_DOCUMENT_SIZE,
            have: bytes.len(),
        });
    }
    let declared = order.read_i32(bytes)?;
    if declared as i64 != bytes.len() as i64 {
        return Err(BsonError::LengthMismatch {
            declared: declared as i64,
            actual: bytes.len(),
        });
    }
    if bytes[bytes.len() - 1] != EOD {
        return Err(BsonError::MissingTerminator);
    }
    Ok(())
}

impl<'a> Document<'a> {
    /// 以本机字节序包装一段字节
    pub fn from_slice(bytes: &'a [u8]) -> BsonResult<Self> {
        Self::from_slice_with_order(bytes, Endian::default())
    }

    pub fn from_slice_with_order(bytes: &'a [u8], order: Endian) -> BsonResult<Self> {
        check_header(bytes, order)?;
        Ok(Self::from_raw_unchecked(bytes, order))
    }

    pub(crate) fn from_raw_unchecked(bytes: &'a [u8], order: Endian) -> Self {
        Self {
            raw: RawBytes::Borrowed(bytes),
            order,
        }
    }

    /// 文档总字节数, 等于长度前缀
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// 没有任何元素
    pub fn is_empty(&self) -> bool {
        self.len() == MIN_DOCUMENT_SIZE
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.raw {
            RawBytes::Borrowed(bytes) => bytes,
            RawBytes::Shared(bytes) => bytes,
        }
    }

    pub fn order(&self) -> Endian {
        self.order
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self.as_bytes(), self.order)
    }

    /// 查找第一个同名元素, 找到后立即停止扫描
    pub fn get(&self, name: &str) -> BsonResult<Option<Element<'_>>> {
        for element in self.iter() {
            let element = element?;
            if element.name() == name {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// 完整遍历并校验, 包括所有嵌套文档
    pub fn validate(&self) -> BsonResult<()> {
        self.validate_with(&CodecConfig::default())
    }

    pub fn validate_with(&self, config: &CodecConfig) -> BsonResult<()> {
        if self.len() > config.max_document_size {
            return Err(BsonError::DocumentTooLarge {
                size: self.len(),
                max: config.max_document_size,
            });
        }
        walk(self, 1, config.max_nesting_depth)
    }

    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, len = self.len(), "document failed validation");
                false
            }
        }
    }

    /// 解码为保留重复名称的元素列表
    pub fn to_doc(&self) -> BsonResult<Doc> {
        decode_doc(self, 1, DEFAULT_MAX_NESTING_DEPTH)
    }

    /// 解码为去重映射, 重复名称以最后一个为准
    pub fn to_map(&self) -> BsonResult<Map> {
        Ok(self.to_doc()?.into_map())
    }

    pub fn into_owned(self) -> Document<'static> {
        let raw = match self.raw {
            RawBytes::Borrowed(bytes) => Bytes::copy_from_slice(bytes),
            RawBytes::Shared(bytes) => bytes,
        };
        Document::from_shared_unchecked(raw, self.order)
    }
}

impl Document<'static> {
    pub fn from_bytes(bytes: Bytes) -> BsonResult<Self> {
        Self::from_bytes_with_order(bytes, Endian::default())
    }

    pub fn from_bytes_with_order(bytes: Bytes, order: Endian) -> BsonResult<Self> {
        check_header(&bytes, order)?;
        Ok(Self::from_shared_unchecked(bytes, order))
    }

    pub fn from_vec(bytes: Vec<u8>) -> BsonResult<Self> {
        Self::from_bytes(Bytes::from(bytes))
    }

    pub(crate) fn from_shared_unchecked(bytes: Bytes, order: Endian) -> Self {
        Self {
            raw: RawBytes::Shared(bytes),
            order,
        }
    }

    /// 共享底层缓冲区, 不复制
    pub fn to_bytes(&self) -> Bytes {
        match &self.raw {
            RawBytes::Shared(bytes) => bytes.clone(),
            RawBytes::Borrowed(bytes) => Bytes::copy_from_slice(bytes),
        }
    }
}

impl PartialEq for Document<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_doc() {
            Ok(doc) => fmt::Display::fmt(&doc, f),
            Err(e) => write!(f, "<invalid document: {}>", e),
        }
    }
}

impl fmt::Debug for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document({})", self)
    }
}

impl<'a> TryFrom<&'a [u8]> for Document<'a> {
    type Error = BsonError;

    fn try_from(bytes: &'a [u8]) -> BsonResult<Self> {
        Document::from_slice(bytes)
    }
}

/// 数组视图, 字段名为连续的下标
#[derive(Clone, PartialEq)]
pub struct Array<'a>(Document<'a>);

impl<'a> Array<'a> {
    pub fn from_document(doc: Document<'a>) -> Self {
        Self(doc)
    }

    pub fn from_slice(bytes: &'a [u8]) -> BsonResult<Self> {
        Document::from_slice(bytes).map(Self)
    }

    pub fn as_document(&self) -> &Document<'a> {
        &self.0
    }

    pub fn into_document(self) -> Document<'a> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn order(&self) -> Endian {
        self.0.order()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.0.iter()
    }

    /// 按顺序解码所有元素, 忽略下标名称
    pub fn to_vec(&self) -> BsonResult<Vec<Value>> {
        decode_array(&self.0, 1, DEFAULT_MAX_NESTING_DEPTH)
    }

    pub fn into_owned(self) -> Array<'static> {
        Array(self.0.into_owned())
    }
}

impl fmt::Display for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_vec() {
            Ok(items) => crate::json::write_items(f, &items),
            Err(e) => write!(f, "<invalid array: {}>", e),
        }
    }
}

impl fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array({})", self)
    }
}

fn walk(doc: &Document<'_>, depth: usize, max_depth: usize) -> BsonResult<()> {
    if depth > max_depth {
        return Err(BsonError::NestingTooDeep(max_depth));
    }
    for element in doc.iter() {
        let element = element?;
        match element.element_type() {
            ElementType::Document => walk(&element.as_document()?, depth + 1, max_depth)?,
            ElementType::Array => walk(element.as_array()?.as_document(), depth + 1, max_depth)?,
            ElementType::String => {
                element.as_str()?;
            }
            ElementType::Regex => {
                element.as_regex()?;
            }
            _ => {}
        }
    }
    Ok(())
}

pub(crate) fn decode_doc(doc: &Document<'_>, depth: usize, max_depth: usize) -> BsonResult<Doc> {
    if depth > max_depth {
        return Err(BsonError::NestingTooDeep(max_depth));
    }
    let mut out = Doc::new();
    for element in doc.iter() {
        let element = element?;
        out.push(element.name(), element.decode(depth, max_depth)?);
    }
    Ok(out)
}

pub(crate) fn decode_array(doc: &Document<'_>, depth: usize, max_depth: usize) -> BsonResult<Vec<Value>> {
    if depth > max_depth {
        return Err(BsonError::NestingTooDeep(max_depth));
    }
    let mut out = Vec::new();
    for element in doc.iter() {
        out.push(element?.decode(depth, max_depth)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::doc;

    fn sample() -> Document<'static> {
        doc! {
            "a": 1,
            "s": "text",
            "nested": doc! { "x": true },
            "list": vec![1, 2, 3],
        }
        .to_document_with_order(Endian::Little)
        .unwrap()
    }

    #[test]
    fn test_length_prefix_checked_first() {
        let doc = sample();
        let mut bytes = doc.as_bytes().to_vec();
        bytes[0] = bytes[0].wrapping_add(1);
        assert!(matches!(
            Document::from_slice_with_order(&bytes, Endian::Little),
            Err(BsonError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_too_short_and_missing_terminator() {
        assert!(matches!(
            Document::from_slice_with_order(&[4, 0, 0], Endian::Little),
            Err(BsonError::Truncated { .. })
        ));
        assert_eq!(
            Document::from_slice_with_order(&[5, 0, 0, 0, 1], Endian::Little),
            Err(BsonError::MissingTerminator)
        );
    }

    #[test]
    fn test_length_invariant_and_eod() {
        let doc = sample();
        let bytes = doc.as_bytes();
        assert_eq!(Endian::Little.read_i32(bytes).unwrap() as usize, bytes.len());
        assert_eq!(bytes[bytes.len() - 1], EOD);
        assert!(doc.is_valid());
    }

    #[test]
    fn test_corrupt_nested_length_fails_validation() {
        let doc = sample();
        let mut bytes = doc.as_bytes().to_vec();
        // 嵌套文档 "nested" 的长度前缀紧跟在名称之后
        let pos = bytes
            .windows(7)
            .position(|w| w == b"nested\0")
            .unwrap()
            + 7;
        bytes[pos] = 0x7F;
        let doc = Document::from_slice_with_order(&bytes, Endian::Little).unwrap();
        assert!(!doc.is_valid());
        assert!(doc.to_doc().is_err());
    }

    #[test]
    fn test_get_stops_at_match() {
        let doc = sample();
        let mut bytes = doc.as_bytes().to_vec();
        let len = bytes.len();
        // 破坏最后一个元素, 前缀查找仍然成功
        bytes[len - 2] = 0x06;
        let doc = Document::from_slice_with_order(&bytes, Endian::Little).unwrap();
        assert_eq!(doc.get("s").unwrap().unwrap().as_str().unwrap(), "text");
        assert!(doc.get("missing").is_err());
    }

    #[test]
    fn test_to_doc_and_to_map() {
        let mut b = Builder::new();
        b.append_i32("k", 1).unwrap();
        b.append_i32("k", 2).unwrap();
        b.finish().unwrap();
        let doc = b.into_document().unwrap();
        assert_eq!(doc.to_doc().unwrap().len(), 2);
        let map = doc.to_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["k"], Value::Int32(2));
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = Value::Int32(0);
        for _ in 0..10 {
            value = Value::Document(doc! { "d": value });
        }
        let doc = doc! { "root": value }.to_document().unwrap();
        let config = CodecConfig {
            max_nesting_depth: 5,
            ..CodecConfig::default()
        };
        assert_eq!(doc.validate_with(&config), Err(BsonError::NestingTooDeep(5)));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_shared_and_owned() {
        let doc = sample();
        let bytes = doc.as_bytes().to_vec();
        let borrowed = Document::from_slice_with_order(&bytes, Endian::Little).unwrap();
        let owned = borrowed.clone().into_owned();
        assert_eq!(owned, doc);
        assert_eq!(owned.to_bytes().len(), doc.len());
        let shared = Document::from_bytes_with_order(Bytes::from_static(&[5, 0, 0, 0, 0]), Endian::Little);
        assert!(shared.unwrap().is_empty());
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::from_slice_with_order(&[5, 0, 0, 0, 0], Endian::Little).unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.iter().count(), 0);
        assert_eq!(doc.to_string(), "{}");
    }
}
