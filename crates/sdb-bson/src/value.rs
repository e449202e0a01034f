//! BSON 值模型
//!
//! `Value` 是解码后的动态值; `DateTime`、`Timestamp`、`Regex`、`Binary`、
//! `OrderKey` 是其中需要独立类型的成员, 可以直接作为结构体字段参与 serde 映射。

use crate::doc::Doc;
use crate::spec::*;
use chrono::{TimeZone, Utc};
use sdb_common::ObjectId;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// UTC 毫秒时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DateTime(i64);

impl DateTime {
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub const fn timestamp_millis(self) -> i64 {
        self.0
    }

    /// 超出 chrono 表示范围时返回 None
    pub fn to_chrono(self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(dt: chrono::DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_chrono() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// 复制集内部时间戳, 线上格式为 increment 在前、second 在后
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub second: u32,
    pub increment: u32,
}

impl Timestamp {
    pub const fn new(second: u32, increment: u32) -> Self {
        Self { second, increment }
    }

    pub(crate) fn to_packed(self) -> i64 {
        (((self.second as u64) << 32) | self.increment as u64) as i64
    }

    pub(crate) fn from_packed(packed: i64) -> Self {
        let packed = packed as u64;
        Self {
            second: (packed >> 32) as u32,
            increment: packed as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: BinarySubtype, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }

    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(BinarySubtype::Generic, bytes)
    }
}

impl PartialOrd for Binary {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(
            self.bytes
                .len()
                .cmp(&other.bytes.len())
                .then_with(|| self.subtype.cmp(&other.subtype))
                .then_with(|| self.bytes.cmp(&other.bytes)),
        )
    }
}

/// 排序哨兵
///
/// 只参与比较, 不能当作普通整数使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderKey {
    #[default]
    MinKey,
    MaxKey,
}

impl OrderKey {
    pub fn name(self) -> &'static str {
        match self {
            OrderKey::MinKey => "MinKey",
            OrderKey::MaxKey => "MaxKey",
        }
    }

    pub fn from_name(name: &str) -> crate::BsonResult<Self> {
        match name {
            "MinKey" => Ok(OrderKey::MinKey),
            "MaxKey" => Ok(OrderKey::MaxKey),
            other => Err(crate::BsonError::InvalidOrderKey(other.to_string())),
        }
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Value::from(*self).type_rank().cmp(&Value::from(*other).type_rank()))
    }
}

/// 解码后的 BSON 值
///
/// 数组只保留元素顺序, 下标名称在解码时丢弃。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Doc),
    Array(Vec<Value>),
    Binary(Binary),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    Null,
    Regex(Regex),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    MinKey,
    MaxKey,
}

impl Value {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Bool(_) => ElementType::Bool,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::Regex(_) => ElementType::Regex,
            Value::Int32(_) => ElementType::Int32,
            Value::Timestamp(_) => ElementType::Timestamp,
            Value::Int64(_) => ElementType::Int64,
            Value::MinKey => ElementType::MinKey,
            Value::MaxKey => ElementType::MaxKey,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.element_type().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Doc> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// 跨类型比较时使用的类型次序
    fn type_rank(&self) -> u8 {
        match self {
            Value::MinKey => 0,
            Value::Null => 1,
            Value::Double(_) | Value::Int32(_) | Value::Int64(_) => 2,
            Value::String(_) => 3,
            Value::Document(_) => 4,
            Value::Array(_) => 5,
            Value::Binary(_) => 6,
            Value::ObjectId(_) => 7,
            Value::Bool(_) => 8,
            Value::DateTime(_) => 9,
            Value::Timestamp(_) => 10,
            Value::Regex(_) => 11,
            Value::MaxKey => 12,
        }
    }
}

/// 按 BSON 排序规则比较
///
/// MinKey 小于任何值, MaxKey 大于任何值; 数值类型之间按数值比较。
/// 数值相等但宽度不同(如 `Int32(7)` 与 `Int64(7)`)时两者不相等, 返回 `None`。
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return Some(rank);
        }
        match (self, other) {
            (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
                match self.as_i64()?.cmp(&other.as_i64()?) {
                    Ordering::Equal if self != other => None,
                    ord => Some(ord),
                }
            }
            (a, b) if a.type_rank() == 2 => match a.as_f64()?.partial_cmp(&b.as_f64()?)? {
                Ordering::Equal if a != b => None,
                ord => Some(ord),
            },
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Document(a), Value::Document(b)) => a.partial_cmp(b),
            (Value::Array(a), Value::Array(b)) => a.partial_cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.partial_cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            (Value::Regex(a), Value::Regex(b)) => a.partial_cmp(b),
            (Value::Null, Value::Null)
            | (Value::MinKey, Value::MinKey)
            | (Value::MaxKey, Value::MaxKey) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::json::write_value(f, self)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Doc> for Value {
    fn from(v: Doc) -> Self {
        Value::Document(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<chrono::DateTime<Utc>> for Value {
    fn from(v: chrono::DateTime<Utc>) -> Self {
        Value::DateTime(v.into())
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Regex> for Value {
    fn from(v: Regex) -> Self {
        Value::Regex(v)
    }
}

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<OrderKey> for Value {
    fn from(v: OrderKey) -> Self {
        match v {
            OrderKey::MinKey => Value::MinKey,
            OrderKey::MaxKey => Value::MaxKey,
        }
    }
}

// ========== serde ==========
//
// 特殊类型以 newtype 名称标记, 文档序列化器据此还原线上类型;
// 其他格式看到的是时间戳整数、元组或字节串。

struct RawBytes<'a>(&'a [u8]);

/// 取出 newtype 内层的值
struct Inner<T>(PhantomData<T>);

impl<T> Inner<T> {
    fn new() -> Self {
        Inner(PhantomData)
    }
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for Inner<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a BSON extension value")
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<T, D::Error> {
        T::deserialize(deserializer)
    }
}

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DATETIME_SERDE_NAME, &self.0)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_newtype_struct(DATETIME_SERDE_NAME, Inner::<i64>::new())
            .map(DateTime)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(TIMESTAMP_SERDE_NAME, &self.to_packed())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_newtype_struct(TIMESTAMP_SERDE_NAME, Inner::<i64>::new())
            .map(Timestamp::from_packed)
    }
}

impl Serialize for Regex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(REGEX_SERDE_NAME, &(&self.pattern, &self.options))
    }
}

impl<'de> Deserialize<'de> for Regex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (pattern, options) = deserializer
            .deserialize_newtype_struct(REGEX_SERDE_NAME, Inner::<(String, String)>::new())?;
        Ok(Regex { pattern, options })
    }
}

/// 子类型字节放在数据之前
impl Serialize for Binary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut raw = Vec::with_capacity(self.bytes.len() + 1);
        raw.push(u8::from(self.subtype));
        raw.extend_from_slice(&self.bytes);
        serializer.serialize_newtype_struct(BINARY_SERDE_NAME, &RawBytes(&raw))
    }
}

impl<'de> Deserialize<'de> for Binary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(BINARY_SERDE_NAME, BinaryVisitor)
    }
}

struct BinaryVisitor;

impl<'de> Visitor<'de> for BinaryVisitor {
    type Value = Binary;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a subtype byte followed by binary data")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Binary, E> {
        match v.split_first() {
            Some((subtype, bytes)) => Ok(Binary::new(BinarySubtype::from(*subtype), bytes)),
            None => Ok(Binary::default()),
        }
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Binary, A::Error> {
        let mut raw = Vec::new();
        while let Some(b) = seq.next_element::<u8>()? {
            raw.push(b);
        }
        self.visit_bytes(&raw)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<Binary, D::Error> {
        deserializer.deserialize_byte_buf(self)
    }
}

impl Serialize for OrderKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(ORDER_KEY_SERDE_NAME, self.name())
    }
}

impl<'de> Deserialize<'de> for OrderKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = deserializer
            .deserialize_newtype_struct(ORDER_KEY_SERDE_NAME, Inner::<String>::new())?;
        OrderKey::from_name(&name).map_err(de::Error::custom)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Document(doc) => {
                let mut map = serializer.serialize_map(Some(doc.len()))?;
                for element in doc.iter() {
                    map.serialize_entry(&element.name, &element.value)?;
                }
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Binary(v) => v.serialize(serializer),
            Value::ObjectId(v) => v.serialize(serializer),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::DateTime(v) => v.serialize(serializer),
            Value::Null => serializer.serialize_unit(),
            Value::Regex(v) => v.serialize(serializer),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Timestamp(v) => v.serialize(serializer),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::MinKey => OrderKey::MinKey.serialize(serializer),
            Value::MaxKey => OrderKey::MaxKey.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any BSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i32<E>(self, v: i32) -> Result<Value, E> {
        Ok(Value::Int32(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int64(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        crate::dispatch::narrow_u64(v).map_err(E::custom)
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Binary(Binary::generic(v)))
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    /// `{"$oid": ...}` 等扩展 JSON 形式还原为对应类型
    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut doc = Doc::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, value)) = map.next_entry::<String, Value>()? {
            doc.push(name, value);
        }
        Ok(crate::json::parse_extended(&doc).unwrap_or(Value::Document(doc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_order_sentinels() {
        let values = vec![
            Value::Null,
            Value::Int32(-5),
            Value::Double(f64::MAX),
            Value::String("zzz".into()),
            Value::Bool(true),
            Value::DateTime(DateTime::from_millis(i64::MAX)),
        ];
        for v in &values {
            assert!(Value::MinKey < *v, "MinKey must sort before {:?}", v);
            assert!(Value::MaxKey > *v, "MaxKey must sort after {:?}", v);
        }
        assert!(OrderKey::MinKey < OrderKey::MaxKey);
    }

    #[test]
    fn test_numeric_ordering_across_widths() {
        assert!(Value::Int32(3) < Value::Int64(4));
        assert!(Value::Int64(i64::MAX) > Value::Int32(i32::MAX));
        assert!(Value::Double(2.5) < Value::Int32(3));
        assert_eq!(Value::Int32(7).partial_cmp(&Value::Int64(7)), None);
        assert!(Value::Double(f64::NAN).partial_cmp(&Value::Int32(1)).is_none());
    }

    #[test]
    fn test_equal_ordering_matches_eq() {
        let values = vec![
            Value::Int32(7),
            Value::Int64(7),
            Value::Double(7.0),
            Value::Int32(-1),
            Value::Int64(1 << 40),
            Value::Double(7.5),
            Value::Double(0.0),
            Value::Double(-0.0),
            Value::Int32(0),
            Value::Null,
            Value::MinKey,
            Value::MaxKey,
            Value::from("a"),
            Value::Document(doc! { "n": 1 }),
            Value::Document(doc! { "n": Value::Int64(1) }),
            Value::Array(vec![Value::Int32(3)]),
            Value::Array(vec![Value::Double(3.0)]),
        ];
        for a in &values {
            for b in &values {
                assert_eq!(
                    a.partial_cmp(b) == Some(Ordering::Equal),
                    a == b,
                    "{:?} vs {:?}",
                    a,
                    b
                );
            }
        }
        assert!(Value::Int32(3) < Value::Int64(7));
        assert!(Value::Double(7.5) > Value::Int64(7));
    }

    #[test]
    fn test_type_rank_ordering() {
        assert!(Value::Null < Value::Int32(0));
        assert!(Value::Int64(i64::MAX) < Value::String(String::new()));
        assert!(Value::Document(doc! {}) < Value::Array(vec![]));
        assert!(Value::Bool(true) < Value::DateTime(DateTime::from_millis(0)));
    }

    #[test]
    fn test_timestamp_packing() {
        let ts = Timestamp::new(u32::MAX, 7);
        assert_eq!(Timestamp::from_packed(ts.to_packed()), ts);
        assert!(Timestamp::new(1, 9) < Timestamp::new(2, 0));
    }

    #[test]
    fn test_datetime_chrono() {
        let dt = DateTime::from_millis(1_500_000_000_123);
        let chrono = dt.to_chrono().unwrap();
        assert_eq!(DateTime::from(chrono), dt);
        assert!(DateTime::from_millis(i64::MAX).to_chrono().is_none());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int32(5).as_i64(), Some(5));
        assert_eq!(Value::Int64(5).as_i32(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(Some(1.5)).as_f64(), Some(1.5));
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::from(OrderKey::MaxKey), Value::MaxKey);
        assert_eq!(Value::MinKey.element_type(), ElementType::MinKey);
    }

    #[test]
    fn test_order_key_names() {
        assert_eq!(OrderKey::from_name("MinKey").unwrap(), OrderKey::MinKey);
        assert!(matches!(
            OrderKey::from_name("Middle"),
            Err(crate::BsonError::InvalidOrderKey(_))
        ));
    }
}
