//! 认证模块
//!
//! JWT 签发与校验、密码哈希，以及从请求头解析当前用户的提取器

mod extractor;
mod jwt;
mod password;

pub use extractor::AuthUser;
pub use jwt::{Claims, JwtConfig, JwtManager};
pub use password::{hash_password, verify_password};
