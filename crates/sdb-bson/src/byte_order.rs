//! 字节序抽象
//!
//! 所有定长整数和浮点数的追加、回填与读取都经过这里。
//! 进程默认使用本机字节序, 另一种字节序用于解码异构端产生的文档。

use crate::{BsonError, BsonResult};
use bytes::BufMut;
use sdb_common::ByteOrderSetting;
use std::fmt::Debug;

/// 定长数值的编解码
///
/// 读取方法在字节不足时返回 `Truncated`, 不做静默截断。
pub trait ByteOrder: Copy + Debug + Send + Sync + 'static {
    fn is_little_endian(self) -> bool;

    fn put_i32<B: BufMut>(self, buf: &mut B, v: i32);

    fn put_i64<B: BufMut>(self, buf: &mut B, v: i64);

    fn put_f64<B: BufMut>(self, buf: &mut B, v: f64) {
        self.put_i64(buf, v.to_bits() as i64);
    }

    /// 回填之前预留的 4 字节, 调用方保证 `pos..pos + 4` 在范围内
    fn set_i32(self, buf: &mut [u8], pos: usize, v: i32);

    fn read_i32(self, bytes: &[u8]) -> BsonResult<i32>;

    fn read_i64(self, bytes: &[u8]) -> BsonResult<i64>;

    fn read_f64(self, bytes: &[u8]) -> BsonResult<f64> {
        Ok(f64::from_bits(self.read_i64(bytes)? as u64))
    }
}

fn take<const N: usize>(bytes: &[u8]) -> BsonResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(BsonError::Truncated { need: N, have: bytes.len() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LittleEndian;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BigEndian;

impl ByteOrder for LittleEndian {
    fn is_little_endian(self) -> bool {
        true
    }

    fn put_i32<B: BufMut>(self, buf: &mut B, v: i32) {
        buf.put_i32_le(v);
    }

    fn put_i64<B: BufMut>(self, buf: &mut B, v: i64) {
        buf.put_i64_le(v);
    }

    fn set_i32(self, buf: &mut [u8], pos: usize, v: i32) {
        buf[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn read_i32(self, bytes: &[u8]) -> BsonResult<i32> {
        take::<4>(bytes).map(i32::from_le_bytes)
    }

    fn read_i64(self, bytes: &[u8]) -> BsonResult<i64> {
        take::<8>(bytes).map(i64::from_le_bytes)
    }
}

impl ByteOrder for BigEndian {
    fn is_little_endian(self) -> bool {
        false
    }

    fn put_i32<B: BufMut>(self, buf: &mut B, v: i32) {
        buf.put_i32(v);
    }

    fn put_i64<B: BufMut>(self, buf: &mut B, v: i64) {
        buf.put_i64(v);
    }

    fn set_i32(self, buf: &mut [u8], pos: usize, v: i32) {
        buf[pos..pos + 4].copy_from_slice(&v.to_be_bytes());
    }

    fn read_i32(self, bytes: &[u8]) -> BsonResult<i32> {
        take::<4>(bytes).map(i32::from_be_bytes)
    }

    fn read_i64(self, bytes: &[u8]) -> BsonResult<i64> {
        take::<8>(bytes).map(i64::from_be_bytes)
    }
}

/// 运行时选择的字节序, 文档和构建器都携带它
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// 本机字节序
    pub const fn native() -> Self {
        if sdb_common::platform::native_is_little_endian() {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    /// 另一种字节序
    pub const fn reverse(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }

    /// 翻转 4 字节整数, 握手阶段与异构端协商字节序时使用
    pub const fn swap_i32(v: i32) -> i32 {
        v.swap_bytes()
    }
}

impl Default for Endian {
    fn default() -> Self {
        Endian::native()
    }
}

impl From<ByteOrderSetting> for Endian {
    fn from(setting: ByteOrderSetting) -> Self {
        if setting.is_little_endian() {
            Endian::Little
        } else {
            Endian::Big
        }
    }
}

impl ByteOrder for Endian {
    fn is_little_endian(self) -> bool {
        matches!(self, Endian::Little)
    }

    fn put_i32<B: BufMut>(self, buf: &mut B, v: i32) {
        match self {
            Endian::Little => LittleEndian.put_i32(buf, v),
            Endian::Big => BigEndian.put_i32(buf, v),
        }
    }

    fn put_i64<B: BufMut>(self, buf: &mut B, v: i64) {
        match self {
            Endian::Little => LittleEndian.put_i64(buf, v),
            Endian::Big => BigEndian.put_i64(buf, v),
        }
    }

    fn set_i32(self, buf: &mut [u8], pos: usize, v: i32) {
        match self {
            Endian::Little => LittleEndian.set_i32(buf, pos, v),
            Endian::Big => BigEndian.set_i32(buf, pos, v),
        }
    }

    fn read_i32(self, bytes: &[u8]) -> BsonResult<i32> {
        match self {
            Endian::Little => LittleEndian.read_i32(bytes),
            Endian::Big => BigEndian.read_i32(bytes),
        }
    }

    fn read_i64(self, bytes: &[u8]) -> BsonResult<i64> {
        match self {
            Endian::Little => LittleEndian.read_i64(bytes),
            Endian::Big => BigEndian.read_i64(bytes),
        }
    }
}
