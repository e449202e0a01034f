//! 文档构建器
//!
//! 顶层构建器独占一块可增长的缓冲区; 子文档/子数组构建器借用同一块缓冲区,
//! 只记录自己的起始偏移量。子构建器 finish 后通过 [`Builder::into_scope`]
//! 交出作用域令牌, 父构建器凭令牌结束子作用域, 之后才能继续追加。

use crate::array_builder::ArrayBuilder;
use crate::byte_order::{ByteOrder, Endian};
use crate::document::{Array, Document};
use crate::spec::*;
use crate::value::{Binary, DateTime, Timestamp};
use crate::{BsonError, BsonResult};
use bytes::{BufMut, BytesMut};
use sdb_common::{CodecConfig, ObjectId};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
enum Arena<'a> {
    Owned(BytesMut),
    Borrowed(&'a mut BytesMut),
}

impl Arena<'_> {
    fn buf(&mut self) -> &mut BytesMut {
        match self {
            Arena::Owned(buf) => buf,
            Arena::Borrowed(buf) => &mut **buf,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Arena::Owned(buf) => &buf[..],
            Arena::Borrowed(buf) => &buf[..],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenChild {
    id: u64,
    offset: usize,
    kind: ElementType,
}

/// 子作用域令牌
///
/// 由子构建器交出, 只能被打开它的父构建器接受一次。
#[derive(Debug)]
#[must_use = "a scope must be handed back to its parent builder"]
pub struct Scope {
    id: u64,
    offset: usize,
    kind: ElementType,
    finished: bool,
}

/// 文档构建器
#[derive(Debug)]
pub struct Builder<'a> {
    arena: Arena<'a>,
    order: Endian,
    offset: usize,
    kind: ElementType,
    scope_id: u64,
    finished: bool,
    child: Option<OpenChild>,
    max_size: usize,
}

impl Builder<'static> {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_order(order: Endian) -> Self {
        let config = CodecConfig::default();
        Self::root(ElementType::Document, order, config.initial_capacity, config.max_document_size)
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        Self::root(
            ElementType::Document,
            config.byte_order.into(),
            config.initial_capacity,
            config.max_document_size,
        )
    }

    pub(crate) fn root(kind: ElementType, order: Endian, capacity: usize, max_size: usize) -> Self {
        let arena = Arena::Owned(BytesMut::with_capacity(capacity.max(MIN_DOCUMENT_SIZE)));
        Self::open(arena, kind, order, 0, max_size)
    }
}

impl Default for Builder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

/// 长度前缀是 int32, 更大的上限一律收紧到这里
const MAX_LENGTH_PREFIX: usize = i32::MAX as usize;

impl<'a> Builder<'a> {
    fn open(mut arena: Arena<'a>, kind: ElementType, order: Endian, scope_id: u64, max_size: usize) -> Self {
        let buf = arena.buf();
        let offset = buf.len();
        order.put_i32(buf, 0);
        Self {
            arena,
            order,
            offset,
            kind,
            scope_id,
            finished: false,
            child: None,
            max_size: max_size.min(MAX_LENGTH_PREFIX),
        }
    }

    pub fn order(&self) -> Endian {
        self.order
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn in_child(&self) -> bool {
        self.child.is_some()
    }

    /// 本文档已写入的字节数, 从自己的长度前缀开始计算
    pub fn len(&self) -> usize {
        self.arena.bytes().len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 4 && !self.finished
    }

    /// 本文档当前的原始字节, 未 finish 时长度前缀尚未回填
    pub fn as_bytes(&self) -> &[u8] {
        &self.arena.bytes()[self.offset..]
    }

    /// 已完成文档的只读视图
    pub fn document(&self) -> BsonResult<Document<'_>> {
        if !self.finished {
            return Err(BsonError::NotFinished);
        }
        Ok(Document::from_raw_unchecked(self.as_bytes(), self.order))
    }

    /// 取出顶层构建器的缓冲区作为独立文档
    ///
    /// # Returns
    /// 未 finish 返回 NotFinished, 子构建器返回 NotTopLevel
    pub fn into_document(self) -> BsonResult<Document<'static>> {
        if !self.finished {
            return Err(BsonError::NotFinished);
        }
        match self.arena {
            Arena::Owned(mut buf) => {
                let bytes = buf.split_off(self.offset).freeze();
                Ok(Document::from_shared_unchecked(bytes, self.order))
            }
            Arena::Borrowed(_) => Err(BsonError::NotTopLevel),
        }
    }

    /// 交出作用域令牌, 之后由父构建器调用 end_document/end_array
    pub fn into_scope(self) -> Scope {
        Scope {
            id: self.scope_id,
            offset: self.offset,
            kind: self.kind,
            finished: self.finished,
        }
    }

    fn check_before_append(&self) -> BsonResult<()> {
        if self.finished {
            Err(BsonError::Finished)
        } else if self.child.is_some() {
            Err(BsonError::ChildOpen)
        } else {
            Ok(())
        }
    }

    fn check_cstring(value: &str) -> BsonResult<()> {
        if value.as_bytes().contains(&0) {
            Err(BsonError::InvalidCString(value.to_string()))
        } else {
            Ok(())
        }
    }

    fn put_cstring(buf: &mut BytesMut, value: &str) {
        buf.put_slice(value.as_bytes());
        buf.put_u8(0);
    }

    /// 校验后写入类型标记和名称, 返回缓冲区以便继续写值
    fn begin_element(&mut self, kind: ElementType, name: &str) -> BsonResult<&mut BytesMut> {
        self.check_before_append()?;
        Self::check_cstring(name)?;
        let buf = self.arena.buf();
        buf.put_u8(kind.as_u8());
        Self::put_cstring(buf, name);
        Ok(buf)
    }

    pub fn append_double(&mut self, name: &str, value: f64) -> BsonResult<()> {
        let order = self.order;
        let buf = self.begin_element(ElementType::Double, name)?;
        order.put_f64(buf, value);
        Ok(())
    }

    /// 字符串长度前缀包含结尾的 0x00
    pub fn append_string(&mut self, name: &str, value: &str) -> BsonResult<()> {
        let len = i32::try_from(value.len() + 1).map_err(|_| BsonError::DocumentTooLarge {
            size: value.len() + 1,
            max: i32::MAX as usize,
        })?;
        let order = self.order;
        let buf = self.begin_element(ElementType::String, name)?;
        order.put_i32(buf, len);
        Self::put_cstring(buf, value);
        Ok(())
    }

    /// 原样追加一个已完成的文档
    pub fn append_document(&mut self, name: &str, doc: &Document<'_>) -> BsonResult<()> {
        self.append_raw(ElementType::Document, name, doc)
    }

    pub fn append_array(&mut self, name: &str, array: &Array<'_>) -> BsonResult<()> {
        self.append_raw(ElementType::Array, name, array.as_document())
    }

    fn append_raw(&mut self, kind: ElementType, name: &str, doc: &Document<'_>) -> BsonResult<()> {
        if doc.order() != self.order {
            return Err(BsonError::ByteOrderMismatch {
                parent: self.order,
                child: doc.order(),
            });
        }
        let buf = self.begin_element(kind, name)?;
        buf.put_slice(doc.as_bytes());
        Ok(())
    }

    /// 打开子文档作用域
    ///
    /// # Brief
    /// 写入类型标记和名称后返回借用同一缓冲区的子构建器;
    /// 子构建器 finish 并交出令牌之前, 本构建器拒绝任何追加操作
    ///
    /// # Arguments
    /// * `name` - 子文档的字段名
    pub fn start_document(&mut self, name: &str) -> BsonResult<Builder<'_>> {
        self.start_child(name, ElementType::Document)
    }

    pub fn end_document(&mut self, scope: Scope) -> BsonResult<()> {
        self.end_child(scope, ElementType::Document)
    }

    pub fn start_array(&mut self, name: &str) -> BsonResult<ArrayBuilder<'_>> {
        self.start_child(name, ElementType::Array).map(ArrayBuilder::wrap)
    }

    pub fn end_array(&mut self, scope: Scope) -> BsonResult<()> {
        self.end_child(scope, ElementType::Array)
    }

    pub(crate) fn start_child(&mut self, name: &str, kind: ElementType) -> BsonResult<Builder<'_>> {
        let order = self.order;
        let max_size = self.max_size;
        let offset = self.begin_element(kind, name)?.len();
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        self.child = Some(OpenChild { id, offset, kind });
        Ok(Builder::open(Arena::Borrowed(self.arena.buf()), kind, order, id, max_size))
    }

    fn end_child(&mut self, scope: Scope, kind: ElementType) -> BsonResult<()> {
        let child = self.child.ok_or(BsonError::NoChildOpen)?;
        if scope.id != child.id || scope.offset != child.offset || scope.kind != kind || child.kind != kind {
            return Err(BsonError::ScopeMismatch {
                expected: child.kind,
                offset: child.offset,
            });
        }
        if !scope.finished {
            return Err(BsonError::ChildNotFinished);
        }

        let bytes = &self.arena.bytes()[child.offset..];
        if bytes.last() != Some(&EOD) {
            return Err(BsonError::MissingTerminator);
        }
        let declared = self.order.read_i32(bytes)?;
        if declared as i64 != bytes.len() as i64 {
            return Err(BsonError::LengthMismatch {
                declared: declared as i64,
                actual: bytes.len(),
            });
        }
        self.child = None;
        Ok(())
    }

    pub fn append_binary(&mut self, name: &str, value: &Binary) -> BsonResult<()> {
        self.append_binary_raw(name, value.subtype, Some(&value.bytes))
    }

    /// 追加二进制数据, 空数据合法, 缺失的数据(None)被拒绝
    pub fn append_binary_raw(
        &mut self,
        name: &str,
        subtype: BinarySubtype,
        data: Option<&[u8]>,
    ) -> BsonResult<()> {
        let data = data.ok_or(BsonError::MissingBinary)?;
        let len = i32::try_from(data.len()).map_err(|_| BsonError::DocumentTooLarge {
            size: data.len(),
            max: i32::MAX as usize,
        })?;
        let order = self.order;
        let buf = self.begin_element(ElementType::Binary, name)?;
        order.put_i32(buf, len);
        buf.put_u8(subtype.into());
        buf.put_slice(data);
        Ok(())
    }

    pub fn append_object_id(&mut self, name: &str, value: &ObjectId) -> BsonResult<()> {
        self.append_object_id_bytes(name, value.as_bytes())
    }

    /// 长度不是 12 时在写入任何字节之前报错
    pub fn append_object_id_bytes(&mut self, name: &str, bytes: &[u8]) -> BsonResult<()> {
        if bytes.len() != OBJECT_ID_SIZE {
            return Err(BsonError::InvalidObjectId(bytes.len()));
        }
        let buf = self.begin_element(ElementType::ObjectId, name)?;
        buf.put_slice(bytes);
        Ok(())
    }

    pub fn append_bool(&mut self, name: &str, value: bool) -> BsonResult<()> {
        let buf = self.begin_element(ElementType::Bool, name)?;
        buf.put_u8(value as u8);
        Ok(())
    }

    pub fn append_datetime(&mut self, name: &str, value: DateTime) -> BsonResult<()> {
        let order = self.order;
        let buf = self.begin_element(ElementType::DateTime, name)?;
        order.put_i64(buf, value.timestamp_millis());
        Ok(())
    }

    pub fn append_null(&mut self, name: &str) -> BsonResult<()> {
        self.begin_element(ElementType::Null, name).map(|_| ())
    }

    pub fn append_regex(&mut self, name: &str, pattern: &str, options: &str) -> BsonResult<()> {
        Self::check_cstring(pattern)?;
        Self::check_cstring(options)?;
        let buf = self.begin_element(ElementType::Regex, name)?;
        Self::put_cstring(buf, pattern);
        Self::put_cstring(buf, options);
        Ok(())
    }

    pub fn append_i32(&mut self, name: &str, value: i32) -> BsonResult<()> {
        let order = self.order;
        let buf = self.begin_element(ElementType::Int32, name)?;
        order.put_i32(buf, value);
        Ok(())
    }

    /// increment 先于 second 写入
    pub fn append_timestamp(&mut self, name: &str, value: Timestamp) -> BsonResult<()> {
        let order = self.order;
        let buf = self.begin_element(ElementType::Timestamp, name)?;
        order.put_i32(buf, value.increment as i32);
        order.put_i32(buf, value.second as i32);
        Ok(())
    }

    pub fn append_i64(&mut self, name: &str, value: i64) -> BsonResult<()> {
        let order = self.order;
        let buf = self.begin_element(ElementType::Int64, name)?;
        order.put_i64(buf, value);
        Ok(())
    }

    pub fn append_min_key(&mut self, name: &str) -> BsonResult<()> {
        self.begin_element(ElementType::MinKey, name).map(|_| ())
    }

    pub fn append_max_key(&mut self, name: &str) -> BsonResult<()> {
        self.begin_element(ElementType::MaxKey, name).map(|_| ())
    }

    /// 写入 EOD 并回填本文档的长度前缀, 不可重复调用
    pub fn finish(&mut self) -> BsonResult<()> {
        self.check_before_append()?;
        let size = self.len() + 1;
        if size > self.max_size {
            return Err(BsonError::DocumentTooLarge {
                size,
                max: self.max_size,
            });
        }
        let offset = self.offset;
        let order = self.order;
        let buf = self.arena.buf();
        buf.put_u8(EOD);
        order.set_i32(buf, offset, size as i32);
        self.finished = true;
        Ok(())
    }
}
