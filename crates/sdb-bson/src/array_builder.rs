//! 数组构建器
//!
//! 数组在线上就是以 "0", "1", ... 为字段名的文档。

use crate::builder::{Builder, Scope};
use crate::byte_order::Endian;
use crate::document::Array;
use crate::spec::{BinarySubtype, ElementType};
use crate::value::{Binary, DateTime, Timestamp};
use crate::BsonResult;
use sdb_common::{CodecConfig, ObjectId};
use std::borrow::Cow;

const INDEX_NAMES: [&str; 32] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
    "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29", "30", "31",
];

/// 数组下标对应的字段名, 小下标直接取静态表
pub(crate) fn index_name(index: usize) -> Cow<'static, str> {
    match INDEX_NAMES.get(index) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(index.to_string()),
    }
}

#[derive(Debug)]
pub struct ArrayBuilder<'a> {
    inner: Builder<'a>,
    index: usize,
}

impl ArrayBuilder<'static> {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_order(order: Endian) -> Self {
        let config = CodecConfig::default();
        Self::wrap(Builder::root(
            ElementType::Array,
            order,
            config.initial_capacity,
            config.max_document_size,
        ))
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        Self::wrap(Builder::root(
            ElementType::Array,
            config.byte_order.into(),
            config.initial_capacity,
            config.max_document_size,
        ))
    }
}

impl Default for ArrayBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ArrayBuilder<'a> {
    pub(crate) fn wrap(inner: Builder<'a>) -> Self {
        Self { inner, index: 0 }
    }

    /// 已追加的元素个数
    pub fn count(&self) -> usize {
        self.index
    }

    pub fn order(&self) -> Endian {
        self.inner.order()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    pub fn array(&self) -> BsonResult<Array<'_>> {
        self.inner.document().map(Array::from_document)
    }

    pub fn into_array(self) -> BsonResult<Array<'static>> {
        self.inner.into_document().map(Array::from_document)
    }

    pub fn into_scope(self) -> Scope {
        self.inner.into_scope()
    }

    pub fn finish(&mut self) -> BsonResult<()> {
        self.inner.finish()
    }

    /// 以下一个下标为名执行追加, 成功后下标加一
    pub(crate) fn with_next<T>(
        &mut self,
        f: impl FnOnce(&mut Builder<'a>, &str) -> BsonResult<T>,
    ) -> BsonResult<T> {
        let name = index_name(self.index);
        let result = f(&mut self.inner, &name)?;
        self.index += 1;
        Ok(result)
    }

    pub fn append_double(&mut self, value: f64) -> BsonResult<()> {
        self.with_next(|b, name| b.append_double(name, value))
    }

    pub fn append_string(&mut self, value: &str) -> BsonResult<()> {
        self.with_next(|b, name| b.append_string(name, value))
    }

    pub fn append_document(&mut self, doc: &crate::Document<'_>) -> BsonResult<()> {
        self.with_next(|b, name| b.append_document(name, doc))
    }

    pub fn append_array(&mut self, array: &Array<'_>) -> BsonResult<()> {
        self.with_next(|b, name| b.append_array(name, array))
    }

    pub fn start_document(&mut self) -> BsonResult<Builder<'_>> {
        let name = index_name(self.index);
        let child = self.inner.start_child(&name, ElementType::Document)?;
        self.index += 1;
        Ok(child)
    }

    pub fn end_document(&mut self, scope: Scope) -> BsonResult<()> {
        self.inner.end_document(scope)
    }

    pub fn start_array(&mut self) -> BsonResult<ArrayBuilder<'_>> {
        let name = index_name(self.index);
        let child = self.inner.start_child(&name, ElementType::Array)?;
        self.index += 1;
        Ok(ArrayBuilder::wrap(child))
    }

    pub fn end_array(&mut self, scope: Scope) -> BsonResult<()> {
        self.inner.end_array(scope)
    }

    pub fn append_binary(&mut self, value: &Binary) -> BsonResult<()> {
        self.with_next(|b, name| b.append_binary(name, value))
    }

    pub fn append_binary_raw(&mut self, subtype: BinarySubtype, data: Option<&[u8]>) -> BsonResult<()> {
        self.with_next(|b, name| b.append_binary_raw(name, subtype, data))
    }

    pub fn append_object_id(&mut self, value: &ObjectId) -> BsonResult<()> {
        self.with_next(|b, name| b.append_object_id(name, value))
    }

    pub fn append_bool(&mut self, value: bool) -> BsonResult<()> {
        self.with_next(|b, name| b.append_bool(name, value))
    }

    pub fn append_datetime(&mut self, value: DateTime) -> BsonResult<()> {
        self.with_next(|b, name| b.append_datetime(name, value))
    }

    pub fn append_null(&mut self) -> BsonResult<()> {
        self.with_next(|b, name| b.append_null(name))
    }

    pub fn append_regex(&mut self, pattern: &str, options: &str) -> BsonResult<()> {
        self.with_next(|b, name| b.append_regex(name, pattern, options))
    }

    pub fn append_i32(&mut self, value: i32) -> BsonResult<()> {
        self.with_next(|b, name| b.append_i32(name, value))
    }

    pub fn append_timestamp(&mut self, value: Timestamp) -> BsonResult<()> {
        self.with_next(|b, name| b.append_timestamp(name, value))
    }

    pub fn append_i64(&mut self, value: i64) -> BsonResult<()> {
        self.with_next(|b, name| b.append_i64(name, value))
    }

    pub fn append_min_key(&mut self) -> BsonResult<()> {
        self.with_next(|b, name| b.append_min_key(name))
    }

    pub fn append_max_key(&mut self) -> BsonResult<()> {
        self.with_next(|b, name| b.append_max_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BsonError;

    #[test]
    fn test_index_names() {
        assert_eq!(index_name(0), "0");
        assert_eq!(index_name(31), "31");
        assert!(matches!(index_name(31), Cow::Borrowed(_)));
        assert_eq!(index_name(32), "32");
        assert!(matches!(index_name(1000), Cow::Owned(_)));
    }

    #[test]
    fn test_array_layout() {
        let mut a = ArrayBuilder::with_order(Endian::Little);
        a.append_i32(7).unwrap();
        a.append_bool(false).unwrap();
        a.finish().unwrap();
        assert_eq!(
            a.as_bytes(),
            &[16, 0, 0, 0, 0x10, b'0', 0, 7, 0, 0, 0, 0x08, b'1', 0, 0, 0]
        );
        assert_eq!(a.count(), 2);
    }

    #[test]
    fn test_many_elements_use_generated_names() {
        let mut a = ArrayBuilder::new();
        for i in 0..40 {
            a.append_i32(i).unwrap();
        }
        a.finish().unwrap();
        let array = a.into_array().unwrap();
        let names: Vec<String> = array
            .as_document()
            .iter()
            .map(|e| e.unwrap().name().to_string())
            .collect();
        assert_eq!(names.len(), 40);
        assert_eq!(names[39], "39");
        assert_eq!(array.to_vec().unwrap()[35], crate::Value::Int32(35));
    }

    #[test]
    fn test_failed_append_keeps_index() {
        let mut a = ArrayBuilder::new();
        assert_eq!(a.append_binary_raw(BinarySubtype::Generic, None), Err(BsonError::MissingBinary));
        assert_eq!(a.count(), 0);
        a.append_null().unwrap();
        assert_eq!(a.count(), 1);
    }

    #[test]
    fn test_nested_children_in_array() {
        let mut a = ArrayBuilder::new();
        let mut doc = a.start_document().unwrap();
        doc.append_string("k", "v").unwrap();
        doc.finish().unwrap();
        let scope = doc.into_scope();
        a.end_document(scope).unwrap();

        let mut inner = a.start_array().unwrap();
        inner.append_i64(1 << 40).unwrap();
        inner.finish().unwrap();
        let scope = inner.into_scope();
        a.end_array(scope).unwrap();

        a.finish().unwrap();
        let array = a.into_array().unwrap();
        assert_eq!(array.to_string(), r#"[{"k":"v"}, [1099511627776]]"#);
    }
}
