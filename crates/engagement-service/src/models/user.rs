//! 用户与用户档案

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// 用户账号
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// 用户档案，关联 RapidPro 联系人
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub contact_uuid: String,
    pub image: Option<String>,
    /// 找回密码验证码，仅供密码重置流程使用
    pub password_reset_code: String,
    pub password_reset_expiry: Option<DateTime<Utc>>,
}

/// 新建用户
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}
