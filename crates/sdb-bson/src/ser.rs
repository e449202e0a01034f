//! Serde 序列化: Rust 值 -> Value
//!
//! 结构体按声明顺序生成文档, 整数按动态分派的规则收窄。
//! 值模型类型通过 newtype 名称识别, 还原为对应的 BSON 类型。

use crate::byte_order::Endian;
use crate::doc::Doc;
use crate::dispatch::{narrow_i64, narrow_u64};
use crate::document::Document;
use crate::spec::*;
use crate::value::{Binary, DateTime, OrderKey, Regex, Timestamp, Value};
use crate::{BsonError, BsonResult};
use sdb_common::ObjectId;
use serde::ser::{self, Serialize};

pub struct Serializer {
    output: Value,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: Value::Null,
        }
    }

    pub fn into_value(self) -> Value {
        self.output
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> BsonResult<Value> {
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_value())
}

/// 将结构体或映射编码为文档
///
/// # Brief
/// 先序列化为 Value, 再逐字段经动态分派写入构建器
///
/// # Arguments
/// * `value` - 结构体或字符串键的映射
///
/// # Returns
/// 顶层不是结构体/映射时返回 UnsupportedValue
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> BsonResult<Document<'static>> {
    to_document_with_order(value, Endian::default())
}

pub fn to_document_with_order<T: Serialize + ?Sized>(
    value: &T,
    order: Endian,
) -> BsonResult<Document<'static>> {
    match to_value(value)? {
        Value::Document(doc) => doc.to_document_with_order(order),
        other => Err(BsonError::UnsupportedValue(format!(
            "top-level {} (expected a struct or map)",
            other.type_name()
        ))),
    }
}

/// 带 newtype 标记的值模型类型还原为 BSON 类型
fn extension_value(name: &'static str, inner: Value) -> BsonResult<Value> {
    let mismatch = |inner: &Value| {
        BsonError::Serialization(format!("unexpected {} payload for {}", inner.type_name(), name))
    };
    match name {
        OBJECT_ID_SERDE_NAME => match inner {
            Value::Binary(bin) => ObjectId::from_slice(&bin.bytes)
                .map(Value::ObjectId)
                .map_err(|_| BsonError::InvalidObjectId(bin.bytes.len())),
            other => Err(mismatch(&other)),
        },
        DATETIME_SERDE_NAME => match inner {
            Value::Int32(ms) => Ok(Value::DateTime(DateTime::from_millis(ms as i64))),
            Value::Int64(ms) => Ok(Value::DateTime(DateTime::from_millis(ms))),
            other => Err(mismatch(&other)),
        },
        TIMESTAMP_SERDE_NAME => match inner {
            Value::Int32(packed) => Ok(Value::Timestamp(Timestamp::from_packed(packed as i64))),
            Value::Int64(packed) => Ok(Value::Timestamp(Timestamp::from_packed(packed))),
            other => Err(mismatch(&other)),
        },
        REGEX_SERDE_NAME => match inner {
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(pattern), Value::String(options)] => {
                    Ok(Value::Regex(Regex::new(pattern.as_str(), options.as_str())))
                }
                _ => Err(BsonError::Serialization("regex expects (pattern, options)".to_string())),
            },
            other => Err(mismatch(&other)),
        },
        BINARY_SERDE_NAME => match inner {
            Value::Binary(bin) => match bin.bytes.split_first() {
                Some((subtype, bytes)) => {
                    Ok(Value::Binary(Binary::new(BinarySubtype::from(*subtype), bytes)))
                }
                None => Err(BsonError::MissingBinary),
            },
            other => Err(mismatch(&other)),
        },
        ORDER_KEY_SERDE_NAME => match inner {
            Value::String(key) => OrderKey::from_name(&key).map(Value::from),
            other => Err(BsonError::InvalidOrderKey(other.type_name().to_string())),
        },
        _ => Ok(inner),
    }
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = BsonError;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = MapSerializer<'a>;
    type SerializeStructVariant = MapSerializer<'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Bool(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Int32(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.output = narrow_i64(v);
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<Self::Ok, Self::Error> {
        let v = i64::try_from(v)
            .map_err(|_| BsonError::UnsupportedValue(format!("i128 value {} out of int64 range", v)))?;
        self.serialize_i64(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        self.output = narrow_u64(v)?;
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<Self::Ok, Self::Error> {
        let v = u64::try_from(v)
            .map_err(|_| BsonError::UnsupportedValue(format!("u128 value {} out of int64 range", v)))?;
        self.serialize_u64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Double(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(&v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.output = Value::String(v.to_string());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Binary(Binary::generic(v));
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Null;
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.output = Value::Null;
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        let inner = to_value(value)?;
        self.output = extension_value(name, inner)?;
        Ok(())
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        let mut doc = Doc::with_capacity(1);
        doc.push(variant, to_value(value)?);
        self.output = Value::Document(doc);
        Ok(())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            elements: Vec::with_capacity(len.unwrap_or(0)),
            variant: None,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        let mut seq = self.serialize_seq(Some(len))?;
        seq.variant = Some(variant);
        Ok(seq)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            doc: Doc::with_capacity(len.unwrap_or(0)),
            current_key: None,
            variant: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        let mut map = self.serialize_map(Some(len))?;
        map.variant = Some(variant);
        Ok(map)
    }
}

/// 枚举变体包一层 `{variant: value}`
fn wrap_variant(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(variant) => {
            let mut doc = Doc::with_capacity(1);
            doc.push(variant, value);
            Value::Document(doc)
        }
        None => value,
    }
}

pub struct SeqSerializer<'a> {
    serializer: &'a mut Serializer,
    elements: Vec<Value>,
    variant: Option<&'static str>,
}

impl<'a> ser::SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.elements.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.serializer.output = wrap_variant(self.variant, Value::Array(self.elements));
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'a> {
    serializer: &'a mut Serializer,
    doc: Doc,
    current_key: Option<String>,
    variant: Option<&'static str>,
}

impl<'a> ser::SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        self.current_key = match to_value(key)? {
            Value::String(s) => Some(s),
            other => {
                return Err(BsonError::UnsupportedValue(format!(
                    "map key of type {} (keys must be strings)",
                    other.type_name()
                )))
            }
        };
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| BsonError::Serialization("No key for value".to_string()))?;
        self.doc.push(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.serializer.output = wrap_variant(self.variant, Value::Document(self.doc));
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.doc.push(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

impl<'a> ser::SerializeStructVariant for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use serde::Serialize;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize)]
    struct Address {
        city: String,
        zip: u32,
    }

    #[derive(Serialize)]
    struct Person {
        name: String,
        age: u8,
        big: u64,
        score: f32,
        tags: Vec<String>,
        address: Address,
        nickname: Option<String>,
        #[serde(skip)]
        _secret: i32,
    }

    #[test]
    fn test_struct_fields_in_declaration_order() {
        let person = Person {
            name: "Ann".into(),
            age: 30,
            big: 1 << 33,
            score: 0.5,
            tags: vec!["a".into()],
            address: Address {
                city: "Paris".into(),
                zip: 75001,
            },
            nickname: None,
            _secret: 7,
        };
        let value = to_value(&person).unwrap();
        assert_eq!(
            value,
            Value::Document(doc! {
                "name": "Ann",
                "age": 30,
                "big": Value::Int64(1 << 33),
                "score": 0.5,
                "tags": vec!["a"],
                "address": doc! { "city": "Paris", "zip": 75001 },
                "nickname": Value::Null,
            })
        );
        assert!(to_document(&person).unwrap().is_valid());
    }

    #[test]
    fn test_u64_overflow_rejected() {
        #[derive(Serialize)]
        struct Big {
            n: u64,
        }
        assert_eq!(
            to_document(&Big { n: u64::MAX }).unwrap_err(),
            BsonError::UnsignedOverflow(u64::MAX)
        );
    }

    #[test]
    fn test_top_level_must_be_document() {
        assert!(matches!(to_document(&5), Err(BsonError::UnsupportedValue(_))));
        assert!(matches!(to_document(&vec![1, 2]), Err(BsonError::UnsupportedValue(_))));
        let mut map = BTreeMap::new();
        map.insert("k", 1);
        assert!(to_document(&map).is_ok());
    }

    #[test]
    fn test_non_string_map_key_rejected() {
        let mut map = HashMap::new();
        map.insert(1, "x");
        assert!(matches!(to_value(&map), Err(BsonError::UnsupportedValue(_))));
        assert!(matches!(to_value(&u128::MAX), Err(BsonError::UnsupportedValue(_))));
    }

    #[test]
    fn test_value_model_fields() {
        #[derive(Serialize)]
        struct Record {
            id: ObjectId,
            at: DateTime,
            ts: Timestamp,
            re: Regex,
            bin: Binary,
            lo: OrderKey,
        }
        let id = ObjectId::from_bytes([9; 12]);
        let value = to_value(&Record {
            id,
            at: DateTime::from_millis(1000),
            ts: Timestamp::new(5, 6),
            re: Regex::new("^a", "i"),
            bin: Binary::new(BinarySubtype::Md5, vec![1, 2]),
            lo: OrderKey::MinKey,
        })
        .unwrap();
        assert_eq!(
            value,
            Value::Document(doc! {
                "id": id,
                "at": DateTime::from_millis(1000),
                "ts": Timestamp::new(5, 6),
                "re": Regex::new("^a", "i"),
                "bin": Binary::new(BinarySubtype::Md5, vec![1, 2]),
                "lo": OrderKey::MinKey,
            })
        );
    }

    #[test]
    fn test_enums() {
        #[derive(Serialize)]
        enum Shape {
            Dot,
            Circle(f64),
            Rect { w: i32, h: i32 },
        }
        assert_eq!(to_value(&Shape::Dot).unwrap(), Value::from("Dot"));
        assert_eq!(to_value(&Shape::Circle(1.0)).unwrap(), Value::Document(doc! { "Circle": 1.0 }));
        assert_eq!(
            to_value(&Shape::Rect { w: 1, h: 2 }).unwrap(),
            Value::Document(doc! { "Rect": doc! { "w": 1, "h": 2 } })
        );
    }

    #[test]
    fn test_value_serializes_to_itself() {
        let value = Value::Document(doc! {
            "min": Value::MinKey,
            "n": Value::Int64(5),
            "list": vec![Value::Null, Value::Bool(true)],
        });
        assert_eq!(to_value(&value).unwrap(), Value::Document(doc! {
            "min": Value::MinKey,
            "n": 5,
            "list": vec![Value::Null, Value::Bool(true)],
        }));
    }
}
