//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use super::{PageRequest, StoryUserFilter, UserBadgeFilter};
use crate::error::Result;
use crate::models::{
    BadgeType, NewBadgeType, NewUser, StorySettings, StorySettingsUpdate, StorySummary,
    StoryUserEntity, User, UserBadge, UserProfile,
};

/// 故事与故事设置仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryRepositoryTrait: Send + Sync {
    async fn get_story(&self, id: i64) -> Result<Option<StorySummary>>;

    // 故事设置
    async fn get_or_create_settings(&self, story_id: i64) -> Result<StorySettings>;
    async fn update_settings(
        &self,
        story_id: i64,
        update: &StorySettingsUpdate,
    ) -> Result<StorySettings>;
    /// 重新计算评分平均值并写回设置，返回新值
    async fn refresh_cached_rating(&self, story_id: i64) -> Result<f64>;

    // 阅读统计
    async fn count_reads_in_org(&self, user_id: i64, org_id: i64) -> Result<i64>;
    async fn count_reads_in_category(&self, user_id: i64, category_id: i64) -> Result<i64>;
}

/// 互动记录仓储接口
///
/// 同一 (story, user) 至多一条记录；各写入方法的冲突语义不同
#[async_trait]
pub trait StoryActionRepositoryTrait<E: StoryUserEntity>: Send + Sync {
    /// 按创建时间倒序，返回当前页与总数
    async fn list(&self, filter: StoryUserFilter, page: Option<PageRequest>)
    -> Result<(Vec<E>, i64)>;
    async fn get(&self, id: i64) -> Result<Option<E>>;
    async fn find(&self, story_id: i64, user_id: i64) -> Result<Option<E>>;
    /// 严格创建，已存在时返回唯一约束校验错误
    async fn create(&self, story_id: i64, user_id: i64, value: Option<i32>) -> Result<E>;
    /// 已存在时原样返回，第二个值表示是否新建
    async fn get_or_create(
        &self,
        story_id: i64,
        user_id: i64,
        value: Option<i32>,
    ) -> Result<(E, bool)>;
    /// 已存在时覆盖数值列，第二个值表示是否新建
    async fn upsert(&self, story_id: i64, user_id: i64, value: Option<i32>) -> Result<(E, bool)>;
    async fn delete(&self, id: i64) -> Result<bool>;
    /// 删除某用户对某故事的记录，返回删除条数
    async fn delete_for(&self, story_id: i64, user_id: i64) -> Result<u64>;
}

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// 用户名大小写不敏感唯一，冲突时返回 email 字段错误
    async fn create_user(&self, new_user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// 用户名大小写不敏感查找
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>>;
    async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<()>;
}

/// 徽章仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeRepositoryTrait: Send + Sync {
    // 徽章类型
    async fn list_badge_types(
        &self,
        org: Option<i64>,
        page: Option<PageRequest>,
    ) -> Result<(Vec<BadgeType>, i64)>;
    async fn get_badge_type(&self, id: i64) -> Result<Option<BadgeType>>;
    async fn create_badge_type(&self, badge_type: &NewBadgeType) -> Result<BadgeType>;
    async fn update_badge_type(
        &self,
        id: i64,
        badge_type: &NewBadgeType,
    ) -> Result<Option<BadgeType>>;
    async fn delete_badge_type(&self, id: i64) -> Result<bool>;

    /// 组织内可见且用户尚未获得的徽章类型
    async fn list_unearned_badge_types(&self, user_id: i64, org_id: i64)
    -> Result<Vec<BadgeType>>;

    // 用户徽章
    /// 不存在时插入，已持有时返回 None
    async fn award_badge(&self, user_id: i64, badge_type_id: i64) -> Result<Option<UserBadge>>;
    async fn list_user_badges(
        &self,
        filter: UserBadgeFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<UserBadge>, i64)>;
    async fn get_user_badge(&self, id: i64) -> Result<Option<UserBadge>>;
    /// 严格创建，已持有时返回唯一约束校验错误
    async fn create_user_badge(&self, user_id: i64, badge_type_id: i64) -> Result<UserBadge>;
    async fn delete_user_badge(&self, id: i64) -> Result<bool>;
}
