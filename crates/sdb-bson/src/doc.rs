//! 文档的两种内存表示
//!
//! - `Doc`: 有序的名称/值列表, 保留重复名称
//! - `Map`: 按名称去重的有序映射, 重复名称以最后一次写入为准

use crate::builder::Builder;
use crate::byte_order::Endian;
use crate::document::Document;
use crate::value::Value;
use crate::BsonResult;
use indexmap::IndexMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct DocElement {
    pub name: String,
    pub value: Value,
}

impl DocElement {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 有序元素列表
#[derive(Debug, Clone, Default, PartialEq, PartialOrd)]
pub struct Doc(Vec<DocElement>);

impl Doc {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// 追加元素, 不检查重名
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.push(DocElement::new(name, value));
    }

    /// 第一个同名元素的值
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// 转换为 Map, 重复名称保留最后一个值
    pub fn into_map(self) -> Map {
        let mut map = Map::with_capacity(self.0.len());
        for element in self.0 {
            map.insert(element.name, element.value);
        }
        map
    }

    /// 编码为文档, 每个元素经过动态分派
    pub fn to_document(&self) -> BsonResult<Document<'static>> {
        self.to_document_with_order(Endian::default())
    }

    pub fn to_document_with_order(&self, order: Endian) -> BsonResult<Document<'static>> {
        let mut builder = Builder::with_order(order);
        for element in &self.0 {
            builder.append(&element.name, &element.value)?;
        }
        builder.finish()?;
        builder.into_document()
    }
}

impl Deref for Doc {
    type Target = Vec<DocElement>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Doc {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for Doc {
    type Item = DocElement;
    type IntoIter = std::vec::IntoIter<DocElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Doc {
    type Item = &'a DocElement;
    type IntoIter = std::slice::Iter<'a, DocElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Doc {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| DocElement::new(k, v)).collect())
    }
}

impl From<Vec<DocElement>> for Doc {
    fn from(elements: Vec<DocElement>) -> Self {
        Self(elements)
    }
}

impl fmt::Display for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::json::write_elements(f, self.iter().map(|e| (e.name.as_str(), &e.value)))
    }
}

/// 按名称去重的映射, 保持首次插入的顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map(IndexMap<String, Value>);

impl Map {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    pub fn into_doc(self) -> Doc {
        self.0.into_iter().collect()
    }

    pub fn to_document(&self) -> BsonResult<Document<'static>> {
        let mut builder = Builder::new();
        for (name, value) in &self.0 {
            builder.append(name, value)?;
        }
        builder.finish()?;
        builder.into_document()
    }
}

impl Deref for Map {
    type Target = IndexMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Document(map.into_doc())
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::json::write_elements(f, self.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// 构造 `Doc` 字面量
///
/// ```rust,ignore
/// let d = doc! { "name": "sdb", "port": 11810, "tags": vec!["a", "b"] };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Doc::new()
    };
    ($($name:literal : $value:expr),+ $(,)?) => {{
        let mut doc = $crate::Doc::new();
        $(doc.push($name, $crate::Value::from($value));)+
        doc
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_keeps_duplicates_map_last_wins() {
        let doc = doc! { "a": 1, "b": "x", "a": 2 };
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get("a"), Some(&Value::Int32(1)));

        let map = doc.clone().into_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&Value::Int32(2)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_doc_to_document_and_back() {
        let doc = doc! {
            "outer": "hello",
            "obj": doc! { "inner": "world" },
            "array": vec![Value::from("hello world"), Value::from(123.456)],
        };
        let document = doc.to_document().unwrap();
        assert_eq!(document.to_doc().unwrap(), doc);
        assert_eq!(
            doc.to_string(),
            r#"{"outer":"hello", "obj":{"inner":"world"}, "array":["hello world", 123.456]}"#
        );
    }

    #[test]
    fn test_map_to_document_dedups() {
        let map: Map = vec![("x", 1), ("y", 2), ("x", 3)].into_iter().collect();
        let document = map.to_document().unwrap();
        let back = document.to_map().unwrap();
        assert_eq!(back, map);
        assert_eq!(back.get("x"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_doc_to_document_big_endian() {
        let doc = doc! { "n": 1 };
        let document = doc.to_document_with_order(Endian::Big).unwrap();
        assert_eq!(document.order(), Endian::Big);
        assert_eq!(&document.as_bytes()[..4], &[0, 0, 0, 12]);
        assert_eq!(document.to_doc().unwrap(), doc);
    }
}
