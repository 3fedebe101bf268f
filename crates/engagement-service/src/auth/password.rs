//! 密码处理
//!
//! 提供密码哈希和验证功能

use bcrypt::{hash, verify};

use crate::error::ApiError;

/// 使用 bcrypt 生成密码哈希
pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    hash(password, cost).map_err(|e| ApiError::Internal(format!("密码哈希失败: {e}")))
}

/// 比较明文密码与存储的哈希值
///
/// 哈希格式无法解析时视为不匹配
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}
