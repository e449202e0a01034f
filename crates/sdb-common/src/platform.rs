//! 平台探测模块
//!
//! ObjectId 生成和字节序选择依赖的少量进程级信息:
//! 主机名、进程号、本机字节序以及操作系统安全随机源。

use crate::error::{CommonError, CommonResult};
use rand::rngs::OsRng;
use rand::RngCore;

/// 当前主机名
///
/// # Returns
/// 主机名不可用或为空时返回 None
pub fn hostname() -> Option<String> {
    let name = hostname::get().ok()?;
    let name = name.to_string_lossy().trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub fn process_id() -> u32 {
    std::process::id()
}

/// 本机是否为小端字节序
pub const fn native_is_little_endian() -> bool {
    cfg!(target_endian = "little")
}

/// 从操作系统安全随机源填充缓冲区
///
/// # Brief
/// 使用 OsRng, 失败时返回错误而不是退化为伪随机
///
/// # Arguments
/// * `buf` - 目标缓冲区
pub fn fill_random(buf: &mut [u8]) -> CommonResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CommonError::Platform(format!("secure random source unavailable: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_random_changes_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill_random(&mut a).unwrap();
        fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_native_endian_matches_target() {
        assert_eq!(native_is_little_endian(), 1u16.to_le_bytes() == 1u16.to_ne_bytes());
    }

    #[test]
    fn test_hostname_is_trimmed() {
        if let Some(name) = hostname() {
            assert_eq!(name, name.trim());
            assert!(!name.is_empty());
        }
    }
}
