//! 动态分派
//!
//! `Append` 把 Rust 值路由到对应的构建器方法:
//! - 32 位以下整数写为 Int32
//! - 32/64 位整数能放进 int32 时写为 Int32, 否则写为 Int64
//! - 超出 i64 的 u64 报错, BSON 没有无符号 64 位类型
//! - 列表打开数组作用域, 映射和文档打开子文档作用域, 逐个递归分派
//! - `None` 写为 Null
//!
//! 分派过程中出错时子作用域不会被结束, 父构建器随之不可继续使用。

use crate::array_builder::ArrayBuilder;
use crate::builder::Builder;
use crate::doc::{Doc, Map};
use crate::document::{Array, Document};
use crate::value::{Binary, DateTime, OrderKey, Regex, Timestamp, Value};
use crate::{BsonError, BsonResult};
use indexmap::IndexMap;
use sdb_common::ObjectId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// 可以写入文档的值
pub trait Append {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()>;
}

/// 有符号整数按取值范围选择 Int32 或 Int64
pub(crate) fn narrow_i64(v: i64) -> Value {
    match i32::try_from(v) {
        Ok(v) => Value::Int32(v),
        Err(_) => Value::Int64(v),
    }
}

/// 超出 i64 的无符号整数无法表示
pub(crate) fn narrow_u64(v: u64) -> BsonResult<Value> {
    i64::try_from(v)
        .map(narrow_i64)
        .map_err(|_| BsonError::UnsignedOverflow(v))
}

fn append_number(builder: &mut Builder<'_>, name: &str, value: Value) -> BsonResult<()> {
    match value {
        Value::Int32(v) => builder.append_i32(name, v),
        Value::Int64(v) => builder.append_i64(name, v),
        other => other.append_to(builder, name),
    }
}

/// 打开数组作用域, 按位置递归分派
fn append_seq<'v, T, I>(builder: &mut Builder<'_>, name: &str, items: I) -> BsonResult<()>
where
    T: Append + ?Sized + 'v,
    I: IntoIterator<Item = &'v T>,
{
    let mut child = builder.start_array(name)?;
    for item in items {
        child.append(item)?;
    }
    child.finish()?;
    let scope = child.into_scope();
    builder.end_array(scope)
}

/// 打开子文档作用域, 按字段递归分派
fn append_entries<'v, K, V, I>(builder: &mut Builder<'_>, name: &str, entries: I) -> BsonResult<()>
where
    K: AsRef<str> + ?Sized + 'v,
    V: Append + ?Sized + 'v,
    I: IntoIterator<Item = (&'v K, &'v V)>,
{
    let mut child = builder.start_document(name)?;
    for (key, value) in entries {
        value.append_to(&mut child, key.as_ref())?;
    }
    child.finish()?;
    let scope = child.into_scope();
    builder.end_document(scope)
}

impl<'a> Builder<'a> {
    /// 动态分派追加任意可写入的值
    pub fn append<T: Append + ?Sized>(&mut self, name: &str, value: &T) -> BsonResult<()> {
        value.append_to(self, name)
    }

    /// 经 serde 追加结构体等任意可序列化值
    pub fn append_serialize<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> BsonResult<()> {
        crate::ser::to_value(value)?.append_to(self, name)
    }
}

impl<'a> ArrayBuilder<'a> {
    pub fn append<T: Append + ?Sized>(&mut self, value: &T) -> BsonResult<()> {
        self.with_next(|b, name| value.append_to(b, name))
    }

    pub fn append_serialize<T: Serialize + ?Sized>(&mut self, value: &T) -> BsonResult<()> {
        let value = crate::ser::to_value(value)?;
        self.append(&value)
    }
}

macro_rules! append_small_int {
    ($($t:ty),*) => {$(
        impl Append for $t {
            fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
                builder.append_i32(name, i32::from(*self))
            }
        }
    )*};
}

append_small_int!(i8, i16, u8, u16);

impl Append for i32 {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_i32(name, *self)
    }
}

impl Append for i64 {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_number(builder, name, narrow_i64(*self))
    }
}

impl Append for isize {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_number(builder, name, narrow_i64(*self as i64))
    }
}

impl Append for u32 {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_number(builder, name, narrow_i64(i64::from(*self)))
    }
}

impl Append for u64 {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_number(builder, name, narrow_u64(*self)?)
    }
}

impl Append for usize {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_number(builder, name, narrow_u64(*self as u64)?)
    }
}

impl Append for f32 {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_double(name, f64::from(*self))
    }
}

impl Append for f64 {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_double(name, *self)
    }
}

impl Append for bool {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_bool(name, *self)
    }
}

impl Append for str {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_string(name, self)
    }
}

impl Append for String {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_string(name, self)
    }
}

impl Append for () {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_null(name)
    }
}

impl<T: Append + ?Sized> Append for &T {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        (**self).append_to(builder, name)
    }
}

impl<T: Append + ?Sized> Append for Box<T> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        (**self).append_to(builder, name)
    }
}

impl<T: Append> Append for Option<T> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        match self {
            Some(value) => value.append_to(builder, name),
            None => builder.append_null(name),
        }
    }
}

impl<T: Append> Append for [T] {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_seq(builder, name, self)
    }
}

impl<T: Append, const N: usize> Append for [T; N] {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_seq(builder, name, self)
    }
}

impl<T: Append> Append for Vec<T> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_seq(builder, name, self)
    }
}

impl<T: Append> Append for VecDeque<T> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_seq(builder, name, self)
    }
}

impl<K: AsRef<str>, V: Append, S> Append for HashMap<K, V, S> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_entries(builder, name, self)
    }
}

impl<K: AsRef<str>, V: Append> Append for BTreeMap<K, V> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_entries(builder, name, self)
    }
}

impl<K: AsRef<str>, V: Append, S> Append for IndexMap<K, V, S> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_entries(builder, name, self)
    }
}

impl Append for Doc {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_entries(builder, name, self.iter().map(|e| (e.name.as_str(), &e.value)))
    }
}

impl Append for Map {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        append_entries(builder, name, self.iter())
    }
}

impl Append for Document<'_> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_document(name, self)
    }
}

impl Append for Array<'_> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_array(name, self)
    }
}

impl Append for ObjectId {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_object_id(name, self)
    }
}

impl Append for DateTime {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_datetime(name, *self)
    }
}

impl Append for chrono::DateTime<chrono::Utc> {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_datetime(name, DateTime::from(*self))
    }
}

impl Append for Regex {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_regex(name, &self.pattern, &self.options)
    }
}

impl Append for Timestamp {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_timestamp(name, *self)
    }
}

impl Append for Binary {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        builder.append_binary(name, self)
    }
}

impl Append for OrderKey {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        match self {
            OrderKey::MinKey => builder.append_min_key(name),
            OrderKey::MaxKey => builder.append_max_key(name),
        }
    }
}

impl Append for Value {
    fn append_to(&self, builder: &mut Builder<'_>, name: &str) -> BsonResult<()> {
        match self {
            Value::Double(v) => builder.append_double(name, *v),
            Value::String(v) => builder.append_string(name, v),
            Value::Document(doc) => doc.append_to(builder, name),
            Value::Array(items) => append_seq(builder, name, items),
            Value::Binary(v) => builder.append_binary(name, v),
            Value::ObjectId(v) => builder.append_object_id(name, v),
            Value::Bool(v) => builder.append_bool(name, *v),
            Value::DateTime(v) => builder.append_datetime(name, *v),
            Value::Null => builder.append_null(name),
            Value::Regex(v) => builder.append_regex(name, &v.pattern, &v.options),
            Value::Int32(v) => builder.append_i32(name, *v),
            Value::Timestamp(v) => builder.append_timestamp(name, *v),
            Value::Int64(v) => builder.append_i64(name, *v),
            Value::MinKey => builder.append_min_key(name),
            Value::MaxKey => builder.append_max_key(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_order::Endian;
    use crate::spec::{BinarySubtype, ElementType};
    use std::collections::BTreeMap;

    fn single<T: Append + ?Sized>(value: &T) -> BsonResult<Document<'static>> {
        let mut b = Builder::with_order(Endian::Little);
        b.append("v", value)?;
        b.finish()?;
        b.into_document()
    }

    fn element_type<T: Append + ?Sized>(value: &T) -> ElementType {
        let doc = single(value).unwrap();
        let element = doc.iter().next().unwrap().unwrap();
        element.element_type()
    }

    fn decoded<T: Append + ?Sized>(value: &T) -> Value {
        single(value).unwrap().to_doc().unwrap()[0].value.clone()
    }

    #[test]
    fn test_int32_boundary() {
        assert_eq!(element_type(&2_147_483_647i64), ElementType::Int32);
        assert_eq!(element_type(&2_147_483_648i64), ElementType::Int64);
        assert_eq!(element_type(&-2_147_483_648i64), ElementType::Int32);
        assert_eq!(element_type(&-2_147_483_649i64), ElementType::Int64);
        assert_eq!(decoded(&2_147_483_648i64), Value::Int64(2_147_483_648));
    }

    #[test]
    fn test_small_and_unsigned_ints() {
        assert_eq!(decoded(&200u8), Value::Int32(200));
        assert_eq!(decoded(&-3i8), Value::Int32(-3));
        assert_eq!(decoded(&u16::MAX), Value::Int32(65535));
        assert_eq!(decoded(&u32::MAX), Value::Int64(4_294_967_295));
        assert_eq!(decoded(&7usize), Value::Int32(7));
        assert_eq!(decoded(&(i64::MAX as u64)), Value::Int64(i64::MAX));
    }

    #[test]
    fn test_unsigned_overflow() {
        let err = single(&9_223_372_036_854_775_808u64).unwrap_err();
        assert_eq!(err, BsonError::UnsignedOverflow(9_223_372_036_854_775_808));
        assert!(single(&u64::MAX).is_err());
    }

    #[test]
    fn test_float_widening() {
        assert_eq!(decoded(&1.5f32), Value::Double(1.5));
    }

    #[test]
    fn test_optional_and_boxed() {
        assert_eq!(decoded(&None::<i32>), Value::Null);
        assert_eq!(decoded(&Some("x")), Value::from("x"));
        assert_eq!(decoded(&Box::new(true)), Value::Bool(true));
        assert_eq!(decoded(&()), Value::Null);
    }

    #[test]
    fn test_sequences() {
        let expected = Value::Array(vec![Value::Int32(1), Value::Int64(1 << 40)]);
        assert_eq!(decoded(&vec![1i64, 1 << 40]), expected);
        assert_eq!(decoded(&[1i64, 1 << 40]), expected);
        assert_eq!(decoded(&[1i64, 1 << 40][..]), expected);
        assert_eq!(decoded(&Vec::<i32>::new()), Value::Array(vec![]));
        assert_eq!(
            decoded(&vec![vec!["a"], vec![]]),
            Value::Array(vec![Value::Array(vec![Value::from("a")]), Value::Array(vec![])])
        );
    }

    #[test]
    fn test_maps() {
        let mut map = BTreeMap::new();
        map.insert("b", 2u8);
        map.insert("a", 1u8);
        assert_eq!(
            decoded(&map),
            Value::Document(crate::doc! { "a": 1, "b": 2 })
        );

        let mut hash = HashMap::new();
        hash.insert("only".to_string(), vec![Some(1.0)]);
        assert_eq!(decoded(&hash).to_string(), r#"{"only":[1]}"#);
    }

    #[test]
    fn test_value_model_types() {
        let id = ObjectId::from_bytes([1; 12]);
        assert_eq!(decoded(&id), Value::ObjectId(id));
        assert_eq!(decoded(&DateTime::from_millis(5)), Value::DateTime(DateTime::from_millis(5)));
        assert_eq!(decoded(&Timestamp::new(1, 2)), Value::Timestamp(Timestamp::new(1, 2)));
        assert_eq!(decoded(&Regex::new("a", "i")), Value::Regex(Regex::new("a", "i")));
        let bin = Binary::new(BinarySubtype::UserDefined(0x80), vec![]);
        assert_eq!(decoded(&bin), Value::Binary(bin.clone()));
        assert_eq!(element_type(&OrderKey::MinKey), ElementType::MinKey);
        assert_eq!(element_type(&OrderKey::MaxKey), ElementType::MaxKey);
    }

    #[test]
    fn test_chrono_datetime() {
        let now = chrono::Utc::now();
        assert_eq!(
            decoded(&now),
            Value::DateTime(DateTime::from_millis(now.timestamp_millis()))
        );
    }

    #[test]
    fn test_nested_value_round_trip() {
        let value = Value::Document(crate::doc! {
            "list": vec![Value::MinKey, Value::Null, Value::from(doc_inner())],
            "max": Value::MaxKey,
        });
        assert_eq!(decoded(&value), value);
    }

    fn doc_inner() -> Doc {
        crate::doc! { "deep": vec![1, 2] }
    }

    #[test]
    fn test_prebuilt_document() {
        let inner = crate::doc! { "x": 1 }.to_document_with_order(Endian::Little).unwrap();
        assert_eq!(decoded(&inner), Value::Document(crate::doc! { "x": 1 }));
    }

    #[test]
    fn test_array_builder_dispatch() {
        let mut a = ArrayBuilder::with_order(Endian::Little);
        a.append(&3_000_000_000u32).unwrap();
        a.append(&"s").unwrap();
        a.append(&None::<bool>).unwrap();
        assert!(a.append(&u64::MAX).is_err());
        assert_eq!(a.count(), 3);
        a.finish().unwrap();
        assert_eq!(
            a.into_array().unwrap().to_vec().unwrap(),
            vec![Value::Int64(3_000_000_000), Value::from("s"), Value::Null]
        );
    }

    #[test]
    fn test_failed_nested_dispatch_poisons_parent() {
        let mut b = Builder::new();
        assert!(b.append("v", &vec![1u64, u64::MAX]).is_err());
        assert_eq!(b.append_i32("next", 1), Err(BsonError::ChildOpen));
    }
}
