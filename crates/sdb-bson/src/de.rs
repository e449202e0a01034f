//! Serde 反序列化: Value -> Rust 值
//!
//! 文档映射到结构体时采用宽松规则:
//! - 结构体声明的每个字段都会被提供, 缺失或无法转换的字段取零值
//! - 数值之间按截断转换, 布尔与数值按真值互转
//! - 负数写入无符号字段时跳过, 保持零值
//! - 序列、映射和嵌套结构体逐元素转换
//!
//! 文档本身损坏时整个调用失败。

use crate::doc::{Doc, DocElement};
use crate::document::Document;
use crate::json::extended_doc;
use crate::spec::*;
use crate::value::{OrderKey, Value};
use crate::{BsonError, BsonResult};
use serde::de::value::{BytesDeserializer, I64Deserializer, SeqDeserializer, StrDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde::Deserializer as _;
use std::collections::HashMap;
use tracing::debug;

static NULL_VALUE: Value = Value::Null;

/// 解码文档并映射为 `T`
///
/// # Brief
/// 先完整解码为 Doc, 再按字段名建立索引(重名时后者覆盖前者)交给反序列化器
///
/// # Arguments
/// * `document` - 已校验的文档
///
/// # Returns
/// 文档损坏时返回对应的解码错误
pub fn from_document<T: DeserializeOwned>(document: &Document<'_>) -> BsonResult<T> {
    let doc = document.to_doc()?;
    from_doc(&doc)
}

pub fn from_doc<T: DeserializeOwned>(doc: &Doc) -> BsonResult<T> {
    T::deserialize(DocDeserializer { doc })
}

pub fn from_value<T: DeserializeOwned>(value: &Value) -> BsonResult<T> {
    T::deserialize(Deserializer::new(value))
}

/// 基于 Value 的宽松反序列化器
///
/// 不借出输入数据, 目标类型只能是 `DeserializeOwned`。
#[derive(Clone, Copy)]
pub struct Deserializer<'a> {
    input: &'a Value,
}

impl<'a> Deserializer<'a> {
    pub fn new(input: &'a Value) -> Self {
        Deserializer { input }
    }

    /// 记录一次无法转换的字段, 调用方随后写入零值
    fn gap(&self, expected: &'static str) {
        debug!(expected, actual = self.input.type_name(), "uncoercible value, using zero");
    }

    fn integer(&self) -> Option<i64> {
        match self.input {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            Value::Double(n) => Some(*n as i64),
            Value::Bool(b) => Some(*b as i64),
            Value::DateTime(dt) => Some(dt.timestamp_millis()),
            Value::Timestamp(ts) => Some(ts.to_packed()),
            _ => None,
        }
    }

    fn float(&self) -> Option<f64> {
        match self.input {
            Value::Double(n) => Some(*n),
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => Some(*n as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// 负数写入无符号类型时返回 None
    fn unsigned(&self, expected: &'static str) -> Option<u64> {
        match self.integer() {
            Some(n) if n >= 0 => Some(n as u64),
            Some(n) => {
                debug!(expected, value = n, "negative value for unsigned field skipped");
                None
            }
            None => {
                self.gap(expected);
                None
            }
        }
    }

    fn text(&self) -> Option<String> {
        match self.input {
            Value::String(s) => Some(s.clone()),
            Value::Binary(bin) => Some(String::from_utf8_lossy(&bin.bytes).into_owned()),
            Value::ObjectId(id) => Some(id.to_hex()),
            _ => None,
        }
    }
}

macro_rules! deserialize_signed {
    ($($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
                match self.integer() {
                    Some(n) => visitor.$visit(n as $ty),
                    None => {
                        self.gap(stringify!($ty));
                        visitor.$visit(0)
                    }
                }
            }
        )*
    };
}

macro_rules! deserialize_unsigned {
    ($($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
                visitor.$visit(self.unsigned(stringify!($ty)).unwrap_or(0) as $ty)
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for Deserializer<'a> {
    type Error = BsonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::Double(v) if v.is_finite() => visitor.visit_f64(*v),
            Value::String(s) => visitor.visit_str(s),
            Value::Document(doc) => DocDeserializer { doc }.deserialize_any(visitor),
            Value::Array(items) => visitor.visit_seq(SeqAccessor {
                iter: items.iter(),
            }),
            Value::Binary(bin) if bin.subtype == BinarySubtype::Generic => {
                visitor.visit_bytes(&bin.bytes)
            }
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Null => visitor.visit_unit(),
            Value::Int32(n) => visitor.visit_i32(*n),
            Value::Int64(n) => visitor.visit_i64(*n),
            other => match extended_doc(other) {
                Some(doc) => DocDeserializer { doc: &doc }.deserialize_any(visitor),
                None => visitor.visit_unit(),
            },
        }
    }

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::Bool(b) => visitor.visit_bool(*b),
            _ => match self.float() {
                Some(n) => visitor.visit_bool(n != 0.0),
                None => {
                    self.gap("bool");
                    visitor.visit_bool(false)
                }
            },
        }
    }

    deserialize_signed! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
    }

    deserialize_unsigned! {
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.float() {
            Some(n) => visitor.visit_f32(n as f32),
            None => {
                self.gap("f32");
                visitor.visit_f32(0.0)
            }
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.float() {
            Some(n) => visitor.visit_f64(n),
            None => {
                self.gap("f64");
                visitor.visit_f64(0.0)
            }
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.text().and_then(|s| s.chars().next()) {
            Some(c) => visitor.visit_char(c),
            None => {
                self.gap("char");
                visitor.visit_char('\0')
            }
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::String(s) => visitor.visit_str(s),
            _ => match self.text() {
                Some(s) => visitor.visit_string(s),
                None => {
                    self.gap("string");
                    visitor.visit_str("")
                }
            },
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::Binary(bin) => visitor.visit_bytes(&bin.bytes),
            Value::String(s) => visitor.visit_bytes(s.as_bytes()),
            Value::ObjectId(id) => visitor.visit_bytes(id.as_bytes()),
            _ => {
                self.gap("bytes");
                visitor.visit_bytes(&[])
            }
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> BsonResult<V::Value> {
        self.deserialize_unit(visitor)
    }

    /// 值模型类型通过 newtype 名称取得各自的载荷
    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> BsonResult<V::Value> {
        match name {
            OBJECT_ID_SERDE_NAME => match self.input {
                Value::ObjectId(id) => {
                    visitor.visit_newtype_struct(BytesDeserializer::<BsonError>::new(id.as_bytes()))
                }
                Value::String(hex) => {
                    let hex: StrDeserializer<BsonError> = hex.as_str().into_deserializer();
                    visitor.visit_newtype_struct(hex)
                }
                Value::Binary(bin) if bin.bytes.len() == OBJECT_ID_SIZE => {
                    visitor.visit_newtype_struct(BytesDeserializer::<BsonError>::new(&bin.bytes))
                }
                _ => {
                    self.gap("ObjectId");
                    let zero = [0u8; OBJECT_ID_SIZE];
                    visitor.visit_newtype_struct(BytesDeserializer::<BsonError>::new(&zero))
                }
            },
            DATETIME_SERDE_NAME | TIMESTAMP_SERDE_NAME => {
                let raw = self.integer().unwrap_or_else(|| {
                    self.gap(name);
                    0
                });
                let raw: I64Deserializer<BsonError> = raw.into_deserializer();
                visitor.visit_newtype_struct(raw)
            }
            REGEX_SERDE_NAME => {
                let (pattern, options) = match self.input {
                    Value::Regex(re) => (re.pattern.clone(), re.options.clone()),
                    Value::String(s) => (s.clone(), String::new()),
                    _ => {
                        self.gap("Regex");
                        (String::new(), String::new())
                    }
                };
                let parts: SeqDeserializer<std::vec::IntoIter<String>, BsonError> =
                    SeqDeserializer::new(vec![pattern, options].into_iter());
                visitor.visit_newtype_struct(parts)
            }
            BINARY_SERDE_NAME => {
                let mut raw = Vec::new();
                match self.input {
                    Value::Binary(bin) => {
                        raw.push(u8::from(bin.subtype));
                        raw.extend_from_slice(&bin.bytes);
                    }
                    Value::String(s) => {
                        raw.push(u8::from(BinarySubtype::Generic));
                        raw.extend_from_slice(s.as_bytes());
                    }
                    _ => self.gap("Binary"),
                }
                visitor.visit_newtype_struct(BytesDeserializer::<BsonError>::new(&raw))
            }
            ORDER_KEY_SERDE_NAME => {
                let key = match self.input {
                    Value::MinKey => "MinKey",
                    Value::MaxKey => "MaxKey",
                    Value::String(s) if OrderKey::from_name(s).is_ok() => s.as_str(),
                    _ => {
                        self.gap("OrderKey");
                        OrderKey::default().name()
                    }
                };
                let key: StrDeserializer<BsonError> = key.into_deserializer();
                visitor.visit_newtype_struct(key)
            }
            _ => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::Array(items) => visitor.visit_seq(SeqAccessor {
                iter: items.iter(),
            }),
            Value::Binary(bin) => {
                let bytes: SeqDeserializer<_, BsonError> =
                    SeqDeserializer::new(bin.bytes.iter().copied());
                bytes.deserialize_any(visitor)
            }
            _ => {
                self.gap("sequence");
                visitor.visit_seq(SeqAccessor { iter: [].iter() })
            }
        }
    }

    /// 元组按位置取值, 元素不足时以 Null 补齐
    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> BsonResult<V::Value> {
        let items: &[Value] = match self.input {
            Value::Array(items) => items.as_slice(),
            _ => {
                self.gap("tuple");
                &[]
            }
        };
        visitor.visit_seq(TupleAccessor {
            items,
            pos: 0,
            len,
        })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> BsonResult<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        match self.input {
            Value::Document(doc) => DocDeserializer { doc }.deserialize_map(visitor),
            _ => {
                self.gap("document");
                visitor.visit_map(MapAccessor {
                    iter: [].iter(),
                    value: None,
                })
            }
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> BsonResult<V::Value> {
        static EMPTY: Doc = Doc::new();
        let doc = match self.input {
            Value::Document(doc) => doc,
            _ => {
                self.gap("document");
                &EMPTY
            }
        };
        DocDeserializer { doc }.deserialize_struct(name, fields, visitor)
    }

    /// 无法识别的输入落到第一个变体, 变体内容按缺失字段处理
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> BsonResult<V::Value> {
        match self.input {
            Value::String(s) if variants.contains(&s.as_str()) => {
                let variant: StrDeserializer<BsonError> = s.as_str().into_deserializer();
                visitor.visit_enum(variant)
            }
            Value::Document(doc) if doc.len() == 1 && variants.contains(&doc[0].name.as_str()) => {
                let element = &doc[0];
                visitor.visit_enum(EnumAccessor {
                    variant: &element.name,
                    value: &element.value,
                })
            }
            _ => {
                self.gap(name);
                let first = variants.first().ok_or_else(|| {
                    BsonError::Deserialization(format!("enum {} has no variants", name))
                })?;
                visitor.visit_enum(EnumAccessor {
                    variant: first,
                    value: &NULL_VALUE,
                })
            }
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        visitor.visit_unit()
    }
}

/// 直接基于 Doc 的反序列化器, 只支持映射和结构体
struct DocDeserializer<'a> {
    doc: &'a Doc,
}

impl<'de, 'a> de::Deserializer<'de> for DocDeserializer<'a> {
    type Error = BsonError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        self.deserialize_map(visitor)
    }

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> BsonResult<V::Value> {
        visitor.visit_map(MapAccessor {
            iter: self.doc.iter(),
            value: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> BsonResult<V::Value> {
        let mut index = HashMap::with_capacity(self.doc.len());
        for element in self.doc.iter() {
            index.insert(element.name.as_str(), &element.value);
        }
        visitor.visit_map(StructAccessor {
            fields: fields.iter(),
            index,
            value: None,
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct enum identifier ignored_any
    }
}

struct SeqAccessor<'a> {
    iter: std::slice::Iter<'a, Value>,
}

impl<'de, 'a> SeqAccess<'de> for SeqAccessor<'a> {
    type Error = BsonError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> BsonResult<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => seed.deserialize(Deserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct TupleAccessor<'a> {
    items: &'a [Value],
    pos: usize,
    len: usize,
}

impl<'de, 'a> SeqAccess<'de> for TupleAccessor<'a> {
    type Error = BsonError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> BsonResult<Option<T::Value>> {
        if self.pos >= self.len {
            return Ok(None);
        }
        let value = self.items.get(self.pos).unwrap_or(&NULL_VALUE);
        self.pos += 1;
        seed.deserialize(Deserializer::new(value)).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len - self.pos)
    }
}

struct MapAccessor<'a> {
    iter: std::slice::Iter<'a, DocElement>,
    value: Option<&'a Value>,
}

impl<'de, 'a> MapAccess<'de> for MapAccessor<'a> {
    type Error = BsonError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> BsonResult<Option<K::Value>> {
        match self.iter.next() {
            Some(element) => {
                self.value = Some(&element.value);
                let key: StrDeserializer<BsonError> = element.name.as_str().into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> BsonResult<V::Value> {
        let value = self
            .value
            .take()
            .ok_or_else(|| BsonError::Deserialization("No value".to_string()))?;
        seed.deserialize(Deserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// 依次提供结构体声明的每个字段, 缺失的字段取 Null
struct StructAccessor<'a> {
    fields: std::slice::Iter<'static, &'static str>,
    index: HashMap<&'a str, &'a Value>,
    value: Option<&'a Value>,
}

impl<'de, 'a> MapAccess<'de> for StructAccessor<'a> {
    type Error = BsonError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> BsonResult<Option<K::Value>> {
        match self.fields.next() {
            Some(field) => {
                self.value = Some(self.index.get(field).copied().unwrap_or(&NULL_VALUE));
                let key: StrDeserializer<BsonError> = (*field).into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> BsonResult<V::Value> {
        let value = self
            .value
            .take()
            .ok_or_else(|| BsonError::Deserialization("No value".to_string()))?;
        seed.deserialize(Deserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

struct EnumAccessor<'a> {
    variant: &'a str,
    value: &'a Value,
}

impl<'de, 'a> de::EnumAccess<'de> for EnumAccessor<'a> {
    type Error = BsonError;
    type Variant = VariantAccessor<'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> BsonResult<(V::Value, Self::Variant)> {
        let variant: StrDeserializer<BsonError> = self.variant.into_deserializer();
        let variant = seed.deserialize(variant)?;
        Ok((variant, VariantAccessor { value: self.value }))
    }
}

struct VariantAccessor<'a> {
    value: &'a Value,
}

impl<'de, 'a> de::VariantAccess<'de> for VariantAccessor<'a> {
    type Error = BsonError;

    fn unit_variant(self) -> BsonResult<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> BsonResult<T::Value> {
        seed.deserialize(Deserializer::new(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> BsonResult<V::Value> {
        de::Deserializer::deserialize_tuple(Deserializer::new(self.value), len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> BsonResult<V::Value> {
        de::Deserializer::deserialize_struct(Deserializer::new(self.value), "", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::ser::to_document;
    use crate::value::{Binary, DateTime, OrderKey, Regex, Timestamp};
    use crate::Builder;
    use sdb_common::ObjectId;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Default, Serialize, Deserialize)]
    struct Inner {
        label: String,
        weight: f64,
    }

    #[derive(Debug, PartialEq, Default, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: i32,
        total: u64,
        ratio: f32,
        active: bool,
        tags: Vec<String>,
        inner: Inner,
        note: Option<String>,
    }

    #[test]
    fn test_roundtrip_struct() {
        let original = Record {
            name: "test".to_string(),
            count: 42,
            total: 1 << 40,
            ratio: 0.25,
            active: true,
            tags: vec!["x".into(), "y".into()],
            inner: Inner {
                label: "in".into(),
                weight: 1.5,
            },
            note: Some("n".into()),
        };
        let document = to_document(&original).unwrap();
        let restored: Record = from_document(&document).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_missing_fields_get_zero_values() {
        let restored: Record = from_doc(&doc! { "name": "only" }).unwrap();
        assert_eq!(
            restored,
            Record {
                name: "only".into(),
                ..Record::default()
            }
        );
    }

    #[test]
    fn test_lenient_coercion() {
        let restored: Record = from_doc(&doc! {
            "name": 5,
            "count": 7.9,
            "total": -3,
            "ratio": true,
            "active": 2,
            "tags": "not a list",
            "inner": "not a doc",
            "note": Value::Null,
        })
        .unwrap();
        assert_eq!(restored.name, "");
        assert_eq!(restored.count, 7);
        assert_eq!(restored.total, 0);
        assert_eq!(restored.ratio, 1.0);
        assert!(restored.active);
        assert!(restored.tags.is_empty());
        assert_eq!(restored.inner, Inner::default());
        assert_eq!(restored.note, None);
    }

    #[test]
    fn test_numeric_truncation() {
        #[derive(Deserialize)]
        struct Narrow {
            small: i8,
            wide: i64,
            from_i64: i32,
        }
        let n: Narrow = from_doc(&doc! {
            "small": 300,
            "wide": Value::Int32(-9),
            "from_i64": Value::Int64((1 << 32) + 5),
        })
        .unwrap();
        assert_eq!(n.small, 300i32 as i8);
        assert_eq!(n.wide, -9);
        assert_eq!(n.from_i64, 5);
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        #[derive(Deserialize)]
        struct One {
            a: i32,
        }
        let mut d = Doc::new();
        d.push("a", 1);
        d.push("a", 2);
        let one: One = from_doc(&d).unwrap();
        assert_eq!(one.a, 2);
    }

    #[test]
    fn test_value_model_fields() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Special {
            id: ObjectId,
            at: DateTime,
            ts: Timestamp,
            re: Regex,
            bin: Binary,
            lo: OrderKey,
            any: Value,
        }
        let original = Special {
            id: ObjectId::from_bytes([3; 12]),
            at: DateTime::from_millis(-1),
            ts: Timestamp::new(9, 8),
            re: Regex::new("p", "x"),
            bin: Binary::new(BinarySubtype::Uuid, vec![0xAB; 16]),
            lo: OrderKey::MaxKey,
            any: Value::Timestamp(Timestamp::new(1, 2)),
        };
        let document = to_document(&original).unwrap();
        let mut iter = document.iter();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.element_type(), ElementType::ObjectId);
        let restored: Special = from_document(&document).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_value_target_keeps_types() {
        let mut builder = Builder::new();
        builder
            .append_binary("b", &Binary::new(BinarySubtype::Md5, vec![1, 2]))
            .unwrap();
        builder.append_min_key("lo").unwrap();
        builder.append_i64("n", 5).unwrap();
        builder.finish().unwrap();
        let document = builder.into_document().unwrap();
        let map: BTreeMap<String, Value> = from_document(&document).unwrap();
        assert_eq!(map["b"], Value::Binary(Binary::new(BinarySubtype::Md5, vec![1, 2])));
        assert_eq!(map["lo"], Value::MinKey);
        assert_eq!(map["n"], Value::Int64(5));
    }

    #[test]
    fn test_enum_and_tuple() {
        #[derive(Debug, PartialEq, Deserialize)]
        enum Mode {
            Off,
            Level(i32),
        }
        #[derive(Deserialize)]
        struct Holder {
            a: Mode,
            b: Mode,
            pair: (i32, String, bool),
        }
        let h: Holder = from_doc(&doc! {
            "a": "Off",
            "b": doc! { "Level": 3 },
            "pair": vec![Value::from(1)],
        })
        .unwrap();
        assert_eq!(h.a, Mode::Off);
        assert_eq!(h.b, Mode::Level(3));
        assert_eq!(h.pair, (1, String::new(), false));
    }

    #[test]
    fn test_missing_or_unknown_enum_uses_first_variant() {
        #[derive(Debug, PartialEq, Deserialize)]
        enum Mode {
            Off,
            Level(i32),
            Window { lo: i32, hi: i32 },
        }
        #[derive(Debug, PartialEq, Deserialize)]
        enum Shape {
            Point { x: i32, y: i32 },
            Empty,
        }
        #[derive(Debug, Deserialize)]
        struct Holder {
            n: i32,
            mode: Mode,
            other: Mode,
            typo: Mode,
            shape: Shape,
            key: OrderKey,
            bad_key: OrderKey,
        }
        let h: Holder = from_doc(&doc! {
            "n": 5,
            "other": 1,
            "typo": "Turbo",
            "shape": doc! { "Circle": 2 },
            "bad_key": "Middle",
        })
        .unwrap();
        assert_eq!(h.n, 5);
        assert_eq!(h.mode, Mode::Off);
        assert_eq!(h.other, Mode::Off);
        assert_eq!(h.typo, Mode::Off);
        assert_eq!(h.shape, Shape::Point { x: 0, y: 0 });
        assert_eq!(h.key, OrderKey::MinKey);
        assert_eq!(h.bad_key, OrderKey::MinKey);

        let w: Mode = from_value(&Value::Document(doc! { "Window": doc! { "hi": 9 } })).unwrap();
        assert_eq!(w, Mode::Window { lo: 0, hi: 9 });
    }

    #[test]
    fn test_malformed_document_fails() {
        let raw = [12u8, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
        let document = Document::from_slice(&raw).unwrap();
        assert!(from_document::<BTreeMap<String, i32>>(&document).is_ok());
        let bad_type = [12u8, 0, 0, 0, 0x42, b'a', 0, 1, 0, 0, 0, 0];
        let document = Document::from_slice(&bad_type).unwrap();
        assert_eq!(
            from_document::<BTreeMap<String, i32>>(&document).unwrap_err(),
            BsonError::UnknownElementType(0x42)
        );
    }
}
