//! 公共类型定义模块
//!
//! - ObjectId: 12 字节唯一标识符
//! - IdGenerator: 持有机器指纹、进程号和原子计数器的生成器上下文

use crate::error::{CommonError, CommonResult};
use crate::platform;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// 非自描述格式下 ObjectId 使用的 newtype 名称
///
/// 文档编解码器据此识别 ObjectId, 保持其线上类型不变。
pub const OBJECT_ID_SERDE_NAME: &str = "$__sdb_object_id";

pub const OBJECT_ID_LEN: usize = 12;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// ObjectId - 12 字节唯一标识符
///
/// 格式:
/// - 前 4 字节: Unix 时间戳(秒,大端)
/// - 3 字节: 机器指纹
/// - 2 字节: 进程号低 16 位(大端)
/// - 后 3 字节: 进程内原子递增计数器(大端)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    /// 使用进程级默认生成器创建新的 ObjectId
    pub fn new() -> Self {
        default_generator().generate()
    }

    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// 从任意长度的切片构造
    ///
    /// # Returns
    /// 长度不为 12 时返回 InvalidObjectIdLength
    pub fn from_slice(bytes: &[u8]) -> CommonResult<Self> {
        let arr: [u8; OBJECT_ID_LEN] = bytes
            .try_into()
            .map_err(|_| CommonError::InvalidObjectIdLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn machine(&self) -> [u8; 3] {
        [self.0[4], self.0[5], self.0[6]]
    }

    pub fn process_id(&self) -> u16 {
        u16::from_be_bytes([self.0[7], self.0[8]])
    }

    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.0[9], self.0[10], self.0[11]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> CommonResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::InvalidObjectId(format!("Invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; OBJECT_ID_LEN]> for ObjectId {
    fn from(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }
}

struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_newtype_struct(OBJECT_ID_SERDE_NAME, &RawBytes(&self.0))
        }
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(ObjectIdVisitor)
        } else {
            deserializer.deserialize_newtype_struct(OBJECT_ID_SERDE_NAME, ObjectIdVisitor)
        }
    }
}

struct ObjectIdVisitor;

impl<'de> Visitor<'de> for ObjectIdVisitor {
    type Value = ObjectId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("12 ObjectId bytes or a 24-digit hex string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ObjectId, E> {
        ObjectId::from_hex(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ObjectId, E> {
        ObjectId::from_slice(v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ObjectId, A::Error> {
        let mut bytes = [0u8; OBJECT_ID_LEN];
        for (i, slot) in bytes.iter_mut().enumerate() {
            *slot = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(ObjectId(bytes))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<ObjectId, D::Error> {
        deserializer.deserialize_bytes(self)
    }
}

/// ObjectId 生成器
///
/// 机器指纹和计数器种子在构造时确定一次, 之后只通过原子递增修改计数器,
/// 可在多线程间共享而无需额外加锁。计数器在单个进程生命周期内回绕时
/// 不做保护(需要同一秒内生成超过 2^24 个 id)。
pub struct IdGenerator {
    machine: [u8; 3],
    pid: u16,
    counter: AtomicU32,
}

impl IdGenerator {
    pub fn new() -> Self {
        let machine = machine_fingerprint();
        let pid = (platform::process_id() & 0xFFFF) as u16;
        let seed = counter_seed();
        debug!(machine = %hex::encode(machine), pid, "ObjectId generator initialized");
        Self::with_parts(machine, pid, seed)
    }

    /// 使用固定参数构造生成器
    ///
    /// # Arguments
    /// * `machine` - 3 字节机器指纹
    /// * `pid` - 进程号
    /// * `seed` - 计数器初始值, 下一个 id 使用 seed + 1
    pub fn with_parts(machine: [u8; 3], pid: u16, seed: u32) -> Self {
        Self {
            machine,
            pid,
            counter: AtomicU32::new(seed & COUNTER_MASK),
        }
    }

    pub fn generate(&self) -> ObjectId {
        self.generate_at(unix_seconds())
    }

    /// 以指定时间戳生成 ObjectId
    pub fn generate_at(&self, timestamp: u32) -> ObjectId {
        let count = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1) & COUNTER_MASK;
        let pid = self.pid.to_be_bytes();
        let count = count.to_be_bytes();

        let mut bytes = [0u8; OBJECT_ID_LEN];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..7].copy_from_slice(&self.machine);
        bytes[7..9].copy_from_slice(&pid);
        bytes[9..12].copy_from_slice(&count[1..4]);
        ObjectId(bytes)
    }

    pub fn machine(&self) -> [u8; 3] {
        self.machine
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("machine", &hex::encode(self.machine))
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// 进程级默认生成器, 首次使用时初始化
pub fn default_generator() -> &'static IdGenerator {
    static GENERATOR: OnceLock<IdGenerator> = OnceLock::new();
    GENERATOR.get_or_init(IdGenerator::new)
}

fn machine_fingerprint() -> [u8; 3] {
    if let Some(name) = platform::hostname() {
        let hash = xxhash_rust::xxh3::xxh3_64(name.as_bytes()).to_be_bytes();
        return [hash[0], hash[1], hash[2]];
    }
    warn!("hostname unavailable, using random machine fingerprint");
    let mut machine = [0u8; 3];
    if let Err(e) = platform::fill_random(&mut machine) {
        warn!(error = %e, "random machine fingerprint unavailable");
        machine.copy_from_slice(&unix_nanos().to_be_bytes()[1..4]);
    }
    machine
}

fn counter_seed() -> u32 {
    let mut buf = [0u8; 4];
    let seed = match platform::fill_random(&mut buf) {
        Ok(()) => u32::from_be_bytes(buf),
        Err(e) => {
            warn!(error = %e, "seeding ObjectId counter from clock");
            unix_nanos()
        }
    } & COUNTER_MASK;
    if seed == 0 {
        1
    } else {
        seed
    }
}

fn unix_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| seconds_field(d.as_secs()))
        .unwrap_or(0)
}

/// 时间戳字段只有 4 字节, 2106 年之后回绕到 0
fn seconds_field(secs: u64) -> u32 {
    (secs & u64::from(u32::MAX)) as u32
}

fn unix_nanos() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0)
}
