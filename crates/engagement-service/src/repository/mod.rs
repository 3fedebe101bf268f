//! 数据访问层
//!
//! 服务层依赖 [`traits`] 中的接口；PostgreSQL 实现用于生产，
//! `MemoryStore` 仅在测试或启用 `testing` feature 时编译。

mod badge_repo;
#[cfg(any(test, feature = "testing"))]
mod memory;
mod story_action_repo;
mod story_repo;
mod traits;
mod user_repo;

use std::sync::Arc;

use crate::error::{self, ApiError};
use crate::models::{StoryBookmark, StoryRating, StoryRead, StoryReward, StoryUserEntity};

pub use badge_repo::PgBadgeRepository;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStore;
pub use story_action_repo::PgStoryActionRepository;
pub use story_repo::PgStoryRepository;
pub use traits::*;
pub use user_repo::PgUserRepository;

/// 分页请求，页码从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// 偏移量溢出时返回 None
    pub fn checked_offset(&self) -> Option<i64> {
        (self.page - 1).max(0).checked_mul(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        self.checked_offset().unwrap_or(i64::MAX)
    }

    /// 对内存中的有序结果切片
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.page_size).unwrap_or(0);
        items.into_iter().skip(skip).take(take).collect()
    }
}

/// `page` 为 None 时返回全部结果
#[cfg(any(test, feature = "testing"))]
pub(crate) fn apply_page<T>(items: Vec<T>, page: Option<PageRequest>) -> Vec<T> {
    match page {
        Some(p) => p.slice(items),
        None => items,
    }
}

/// 互动记录过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoryUserFilter {
    pub user: Option<i64>,
    pub story: Option<i64>,
}

/// 用户徽章过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserBadgeFilter {
    pub user: Option<i64>,
    pub badge_type: Option<i64>,
    pub org: Option<i64>,
}

/// 四类互动实体的仓储集合
#[derive(Clone)]
pub struct StoryActionRepos {
    pub bookmarks: Arc<dyn StoryActionRepositoryTrait<StoryBookmark>>,
    pub ratings: Arc<dyn StoryActionRepositoryTrait<StoryRating>>,
    pub reads: Arc<dyn StoryActionRepositoryTrait<StoryRead>>,
    pub rewards: Arc<dyn StoryActionRepositoryTrait<StoryReward>>,
}

impl StoryActionRepos {
    /// 四类实体共用同一个存储实现
    pub fn from_shared<R>(repo: Arc<R>) -> Self
    where
        R: StoryActionRepositoryTrait<StoryBookmark>
            + StoryActionRepositoryTrait<StoryRating>
            + StoryActionRepositoryTrait<StoryRead>
            + StoryActionRepositoryTrait<StoryReward>
            + 'static,
    {
        Self {
            bookmarks: repo.clone(),
            ratings: repo.clone(),
            reads: repo.clone(),
            rewards: repo,
        }
    }

    pub fn postgres(pool: &sqlx::PgPool) -> Self {
        Self {
            bookmarks: Arc::new(PgStoryActionRepository::new(pool.clone())),
            ratings: Arc::new(PgStoryActionRepository::new(pool.clone())),
            reads: Arc::new(PgStoryActionRepository::new(pool.clone())),
            rewards: Arc::new(PgStoryActionRepository::new(pool.clone())),
        }
    }

    pub fn get<E: StoryActionEntity>(&self) -> &Arc<dyn StoryActionRepositoryTrait<E>> {
        E::select(self)
    }
}

/// 按实体类型从仓储集合中选出对应仓储
pub trait StoryActionEntity: StoryUserEntity {
    fn select(repos: &StoryActionRepos) -> &Arc<dyn StoryActionRepositoryTrait<Self>>;
}

impl StoryActionEntity for StoryBookmark {
    fn select(repos: &StoryActionRepos) -> &Arc<dyn StoryActionRepositoryTrait<Self>> {
        &repos.bookmarks
    }
}

impl StoryActionEntity for StoryRating {
    fn select(repos: &StoryActionRepos) -> &Arc<dyn StoryActionRepositoryTrait<Self>> {
        &repos.ratings
    }
}

impl StoryActionEntity for StoryRead {
    fn select(repos: &StoryActionRepos) -> &Arc<dyn StoryActionRepositoryTrait<Self>> {
        &repos.reads
    }
}

impl StoryActionEntity for StoryReward {
    fn select(repos: &StoryActionRepos) -> &Arc<dyn StoryActionRepositoryTrait<Self>> {
        &repos.rewards
    }
}

/// 外键约束名片段到请求字段的映射：(约束名片段, 字段名, 主键值)
pub(crate) type ForeignKeyFields<'a> = &'a [(&'a str, &'a str, i64)];

/// 将写入错误映射为字段级校验错误
///
/// 唯一约束冲突映射为 `non_field_errors`；外键冲突按约束名定位到字段
pub(crate) fn map_write_error(
    err: sqlx::Error,
    unique_fields: &str,
    foreign_keys: ForeignKeyFields<'_>,
) -> ApiError {
    if error::is_unique_violation(&err) {
        return ApiError::unique_set(unique_fields);
    }

    if error::is_foreign_key_violation(&err) {
        let constraint = err
            .as_database_error()
            .and_then(|e| e.constraint())
            .unwrap_or_default()
            .to_string();
        if let Some((_, field, pk)) = foreign_keys
            .iter()
            .find(|(fragment, _, _)| constraint.contains(fragment))
        {
            return ApiError::invalid_pk(field, *pk);
        }
    }

    ApiError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        let page = PageRequest {
            page: 3,
            page_size: 20,
        };
        assert_eq!(page.offset(), 40);

        let first = PageRequest {
            page: 1,
            page_size: 5,
        };
        assert_eq!(first.slice((1..=12).collect::<Vec<_>>()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_page_offset_overflow() {
        let huge = PageRequest {
            page: i64::MAX,
            page_size: 20,
        };
        assert_eq!(huge.checked_offset(), None);
        assert!(huge.slice(vec![1, 2, 3]).is_empty());
    }

    #[test]
    fn test_apply_page_without_request_returns_all() {
        assert_eq!(apply_page(vec![1, 2, 3], None), vec![1, 2, 3]);
        let last = PageRequest {
            page: 2,
            page_size: 2,
        };
        assert_eq!(apply_page(vec![1, 2, 3], Some(last)), vec![3]);
    }

    #[test]
    fn test_map_write_error_passes_through_other_errors() {
        let err = map_write_error(sqlx::Error::RowNotFound, "story, user", &[]);
        assert!(matches!(err, ApiError::Database(_)));
    }
}
