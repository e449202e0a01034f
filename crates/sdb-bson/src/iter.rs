//! 惰性迭代器
//!
//! 每次 `advance` 只解析一个元素: 读取类型标记、扫描名称、按类型计算值的跨度
//! 并检查边界。嵌套文档、数组、二进制数据以切片形式返回, 不复制。

use crate::byte_order::{ByteOrder, Endian};
use crate::document::{decode_array, decode_doc, Array, Document};
use crate::spec::*;
use crate::value::{Binary, DateTime, Regex, Timestamp, Value};
use crate::{BsonError, BsonResult};
use sdb_common::config::DEFAULT_MAX_NESTING_DEPTH;
use sdb_common::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeFirst,
    OnElement,
    Exhausted,
    Failed,
}

/// 单个元素: 类型、名称和值的字节跨度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<'a> {
    element_type: ElementType,
    name: &'a str,
    value: &'a [u8],
    order: Endian,
}

/// 文档元素迭代器
///
/// 出错后迭代器停止, 之后的 `advance` 返回 `Ok(false)`。
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    raw: &'a [u8],
    order: Endian,
    offset: usize,
    element_len: usize,
    current: Option<Element<'a>>,
    state: State,
}

/// `start..end` 内以 0x00 结尾的字符串长度(不含 0x00)
fn cstring_len(raw: &[u8], start: usize, end: usize) -> BsonResult<usize> {
    raw.get(start..end)
        .and_then(|region| region.iter().position(|&b| b == 0))
        .ok_or(BsonError::UnterminatedCString(start))
}

impl<'a> Iter<'a> {
    /// 调用方保证 `raw` 已通过头部检查
    pub(crate) fn new(raw: &'a [u8], order: Endian) -> Self {
        Self {
            raw,
            order,
            offset: 4,
            element_len: 0,
            current: None,
            state: State::BeforeFirst,
        }
    }

    /// 移动到下一个元素
    ///
    /// # Returns
    /// 读到元素返回 Ok(true), 到达 EOD 返回 Ok(false), 格式错误返回错误
    pub fn advance(&mut self) -> BsonResult<bool> {
        if matches!(self.state, State::Exhausted | State::Failed) {
            return Ok(false);
        }
        let next = self.offset + self.element_len;
        match self.read_element(next) {
            Ok(Some((element, len))) => {
                self.offset = next;
                self.element_len = len;
                self.current = Some(element);
                self.state = State::OnElement;
                Ok(true)
            }
            Ok(None) => {
                self.offset = next;
                self.element_len = 0;
                self.current = None;
                self.state = State::Exhausted;
                Ok(false)
            }
            Err(e) => {
                self.current = None;
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// 查看下一个位置的类型标记, 不移动游标
    pub fn more(&self) -> bool {
        match self.state {
            State::Exhausted | State::Failed => false,
            State::BeforeFirst | State::OnElement => self
                .raw
                .get(self.offset + self.element_len)
                .map_or(false, |&tag| tag != EOD),
        }
    }

    pub fn current(&self) -> Option<&Element<'a>> {
        self.current.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// 游标位置: 当前元素的起始偏移, 迭代结束后指向 EOD
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn reset(&mut self) {
        self.offset = 4;
        self.element_len = 0;
        self.current = None;
        self.state = State::BeforeFirst;
    }

    fn read_element(&self, pos: usize) -> BsonResult<Option<(Element<'a>, usize)>> {
        let raw = self.raw;
        // 文档结尾 EOD 的位置
        let end = raw.len() - 1;
        let tag = *raw.get(pos).ok_or(BsonError::Truncated {
            need: pos + 1,
            have: raw.len(),
        })?;
        if tag == EOD {
            if pos != end {
                return Err(BsonError::TrailingBytes(pos));
            }
            return Ok(None);
        }

        let element_type = ElementType::from_u8(tag).ok_or(BsonError::UnknownElementType(tag))?;
        if !element_type.is_supported() {
            return Err(BsonError::UnsupportedElementType(element_type));
        }

        let name_start = pos + 1;
        let name_len = cstring_len(raw, name_start, end)?;
        let name = std::str::from_utf8(&raw[name_start..name_start + name_len])?;

        let value_start = name_start + name_len + 1;
        let value_len = self.value_len(element_type, value_start, end)?;
        let value_end = value_start + value_len;
        if value_end > end {
            return Err(BsonError::Truncated {
                need: value_len,
                have: end.saturating_sub(value_start),
            });
        }

        let element = Element {
            element_type,
            name,
            value: &raw[value_start..value_end],
            order: self.order,
        };
        Ok(Some((element, value_end - pos)))
    }

    /// 按类型计算值的字节数
    fn value_len(&self, element_type: ElementType, start: usize, end: usize) -> BsonResult<usize> {
        if let Some(size) = element_type.fixed_size() {
            return Ok(size);
        }
        let raw = self.raw;
        let region = raw.get(start..end).unwrap_or(&[]);
        match element_type {
            ElementType::String => {
                let len = self.read_length(region, start, 1)?;
                let total = 4 + len;
                if start + total > end {
                    return Err(BsonError::Truncated { need: total, have: region.len() });
                }
                if raw[start + total - 1] != 0 {
                    return Err(BsonError::UnterminatedCString(start + 4));
                }
                Ok(total)
            }
            ElementType::Document | ElementType::Array => {
                let len = self.read_length(region, start, MIN_DOCUMENT_SIZE)?;
                if start + len > end {
                    return Err(BsonError::Truncated { need: len, have: region.len() });
                }
                if raw[start + len - 1] != EOD {
                    return Err(BsonError::MissingTerminator);
                }
                Ok(len)
            }
            ElementType::Binary => {
                let len = self.read_length(region, start, 0)?;
                Ok(4 + 1 + len)
            }
            ElementType::Regex => {
                let pattern = cstring_len(raw, start, end)?;
                let options = cstring_len(raw, start + pattern + 1, end)?;
                Ok(pattern + 1 + options + 1)
            }
            other => Err(BsonError::UnsupportedElementType(other)),
        }
    }

    fn read_length(&self, region: &[u8], offset: usize, min: usize) -> BsonResult<usize> {
        let length = self.order.read_i32(region)?;
        if length < 0 || (length as usize) < min {
            return Err(BsonError::InvalidLength { length, offset });
        }
        Ok(length as usize)
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = BsonResult<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<'a> Element<'a> {
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// 值的原始字节, 不含类型标记和名称
    pub fn raw_value(&self) -> &'a [u8] {
        self.value
    }

    fn expect(&self, expected: ElementType) -> BsonResult<()> {
        if self.element_type == expected {
            Ok(())
        } else {
            Err(BsonError::TypeMismatch {
                expected,
                actual: self.element_type,
            })
        }
    }

    pub fn as_f64(&self) -> BsonResult<f64> {
        self.expect(ElementType::Double)?;
        self.order.read_f64(self.value)
    }

    pub fn as_str(&self) -> BsonResult<&'a str> {
        self.expect(ElementType::String)?;
        let bytes = &self.value[4..self.value.len() - 1];
        Ok(std::str::from_utf8(bytes)?)
    }

    pub fn as_document(&self) -> BsonResult<Document<'a>> {
        self.expect(ElementType::Document)?;
        Ok(Document::from_raw_unchecked(self.value, self.order))
    }

    pub fn as_array(&self) -> BsonResult<Array<'a>> {
        self.expect(ElementType::Array)?;
        Ok(Array::from_document(Document::from_raw_unchecked(self.value, self.order)))
    }

    pub fn as_binary(&self) -> BsonResult<(BinarySubtype, &'a [u8])> {
        self.expect(ElementType::Binary)?;
        Ok((BinarySubtype::from(self.value[4]), &self.value[5..]))
    }

    pub fn as_object_id(&self) -> BsonResult<ObjectId> {
        self.expect(ElementType::ObjectId)?;
        ObjectId::from_slice(self.value).map_err(|_| BsonError::InvalidObjectId(self.value.len()))
    }

    pub fn as_bool(&self) -> BsonResult<bool> {
        self.expect(ElementType::Bool)?;
        Ok(self.value[0] != 0)
    }

    pub fn as_datetime(&self) -> BsonResult<DateTime> {
        self.expect(ElementType::DateTime)?;
        self.order.read_i64(self.value).map(DateTime::from_millis)
    }

    /// 返回 (pattern, options)
    pub fn as_regex(&self) -> BsonResult<(&'a str, &'a str)> {
        self.expect(ElementType::Regex)?;
        let split = cstring_len(self.value, 0, self.value.len())?;
        let pattern = std::str::from_utf8(&self.value[..split])?;
        let options = &self.value[split + 1..self.value.len() - 1];
        Ok((pattern, std::str::from_utf8(options)?))
    }

    pub fn as_i32(&self) -> BsonResult<i32> {
        self.expect(ElementType::Int32)?;
        self.order.read_i32(self.value)
    }

    /// increment 在前, second 在后
    pub fn as_timestamp(&self) -> BsonResult<Timestamp> {
        self.expect(ElementType::Timestamp)?;
        let increment = self.order.read_i32(self.value)?;
        let second = self.order.read_i32(&self.value[4..])?;
        Ok(Timestamp::new(second as u32, increment as u32))
    }

    pub fn as_i64(&self) -> BsonResult<i64> {
        self.expect(ElementType::Int64)?;
        self.order.read_i64(self.value)
    }

    /// 解码为 Value, 嵌套文档递归解码
    pub fn to_value(&self) -> BsonResult<Value> {
        self.decode(1, DEFAULT_MAX_NESTING_DEPTH)
    }

    pub(crate) fn decode(&self, depth: usize, max_depth: usize) -> BsonResult<Value> {
        Ok(match self.element_type {
            ElementType::Double => Value::Double(self.as_f64()?),
            ElementType::String => Value::String(self.as_str()?.to_string()),
            ElementType::Document => {
                Value::Document(decode_doc(&self.as_document()?, depth + 1, max_depth)?)
            }
            ElementType::Array => {
                Value::Array(decode_array(self.as_array()?.as_document(), depth + 1, max_depth)?)
            }
            ElementType::Binary => {
                let (subtype, bytes) = self.as_binary()?;
                Value::Binary(Binary::new(subtype, bytes))
            }
            ElementType::ObjectId => Value::ObjectId(self.as_object_id()?),
            ElementType::Bool => Value::Bool(self.as_bool()?),
            ElementType::DateTime => Value::DateTime(self.as_datetime()?),
            ElementType::Null => Value::Null,
            ElementType::Regex => {
                let (pattern, options) = self.as_regex()?;
                Value::Regex(Regex::new(pattern, options))
            }
            ElementType::Int32 => Value::Int32(self.as_i32()?),
            ElementType::Timestamp => Value::Timestamp(self.as_timestamp()?),
            ElementType::Int64 => Value::Int64(self.as_i64()?),
            ElementType::MinKey => Value::MinKey,
            ElementType::MaxKey => Value::MaxKey,
            other => return Err(BsonError::UnsupportedElementType(other)),
        })
    }
}
